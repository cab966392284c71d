//! Chain extraction: from a set node down to the leaf operands.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use smallvec::SmallVec;

use super::labels::{LabelId, LabelRegistry};
use crate::error::{ChainError, ChainResult};
use crate::graph::{ChainGraph, Dim, NodeId, Op, TensorType, contraction_view};
use crate::optimization::FoldOrder;

/// One leaf tensor factor of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    pub value: NodeId,
    /// Labels in the tensor's axis order.
    pub labels: SmallVec<[LabelId; 4]>,
}

/// A linear chain of pairwise contractions feeding one set node.
///
/// Operands are stored in extraction order: the outermost contraction's rhs
/// first, the innermost lhs last. The program's own left-to-right fold is
/// therefore the reverse identity, see [`ContractionChain::natural_order`].
#[derive(Debug, Clone)]
pub struct ContractionChain {
    pub root: NodeId,
    pub destination: NodeId,
    pub operands: Vec<Operand>,
    /// Labels of the chain result, in its layout order.
    pub free: SmallVec<[LabelId; 4]>,
    /// Contraction nodes, outermost first.
    pub nodes: Vec<NodeId>,
}

impl ContractionChain {
    pub fn len(&self) -> usize {
        self.operands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }

    /// The fold order the program currently encodes.
    pub fn natural_order(&self) -> FoldOrder {
        FoldOrder::natural(self.operands.len())
    }

    pub fn free_set(&self) -> BTreeSet<LabelId> {
        self.free.iter().copied().collect()
    }
}

/// A chain together with the labels it touches.
#[derive(Debug, Clone)]
pub struct ExtractedChain {
    pub chain: ContractionChain,
    pub labels: LabelRegistry,
}

/// Extracts the contraction chain stored by the set node `root`.
///
/// Returns `Ok(None)` when the stored value is not a regroupable contraction,
/// i.e. the chain has fewer than two operands. Descends through lhs inputs
/// that are plain contractions with a single user; anything else is a leaf.
/// The graph is not modified.
pub fn extract_chain<G: ChainGraph + ?Sized>(
    graph: &G,
    root: NodeId,
) -> ChainResult<Option<ExtractedChain>> {
    if !graph.op(root)?.is_set() {
        return Err(ChainError::invalid_chain(root, "chain root is not a set node"));
    }
    let &[source, destination] = graph.operands(root)? else {
        return Err(ChainError::invalid_chain(root, "set node needs a value and a destination"));
    };

    if !is_chain_link(graph, source)? {
        return Ok(None);
    }

    let mut labels = LabelRegistry::new();
    let mut operands = Vec::new();
    let mut nodes = Vec::new();

    let free: SmallVec<[LabelId; 4]> = match contraction_view(graph, source)? {
        Some(view) => view.result_labels().map(|l| labels.intern(l)).collect(),
        None => SmallVec::new(),
    };

    let mut current = source;
    while let Some(view) = contraction_view(graph, current)? {
        nodes.push(current);
        let rhs_labels: SmallVec<[NodeId; 4]> = view.rhs_labels().collect();
        operands.push(record_operand(graph, root, view.rhs, &rhs_labels, &mut labels)?);

        if is_chain_link(graph, view.lhs)? {
            current = view.lhs;
            continue;
        }
        let lhs_labels: SmallVec<[NodeId; 4]> = view.lhs_labels().collect();
        operands.push(record_operand(graph, root, view.lhs, &lhs_labels, &mut labels)?);
        break;
    }

    for &id in &free {
        if labels.size(id).is_none() {
            return Err(ChainError::invalid_chain(
                root,
                alloc::format!("free label {} does not appear in any operand", id),
            ));
        }
    }

    tracing::trace!(
        root = %root,
        operands = operands.len(),
        labels = labels.len(),
        "extracted contraction chain"
    );

    Ok(Some(ExtractedChain {
        chain: ContractionChain {
            root,
            destination,
            operands,
            free,
            nodes,
        },
        labels,
    }))
}

/// A node continues the chain if it is a plain contraction used only once.
fn is_chain_link<G: ChainGraph + ?Sized>(graph: &G, node: NodeId) -> ChainResult<bool> {
    let Op::Contract(contraction) = graph.op(node)? else {
        return Ok(false);
    };
    Ok(contraction.is_plain() && graph.users(node)?.len() == 1)
}

fn record_operand<G: ChainGraph + ?Sized>(
    graph: &G,
    root: NodeId,
    value: NodeId,
    label_values: &[NodeId],
    labels: &mut LabelRegistry,
) -> ChainResult<Operand> {
    let ty = graph.tensor_type(value)?;
    if ty.rank() != label_values.len() {
        return Err(ChainError::invalid_chain(
            root,
            alloc::format!(
                "{} has rank {} but is indexed by {} labels",
                value,
                ty.rank(),
                label_values.len()
            ),
        ));
    }

    let mut ids = SmallVec::with_capacity(label_values.len());
    for (dim, &label) in label_values.iter().enumerate() {
        let size = resolve_dim(graph, value, ty, dim)?;
        ids.push(labels.resolve(label, size)?);
    }
    Ok(Operand { value, labels: ids })
}

/// Size of axis `dim` of `value`.
///
/// Static axes come from the type. Dynamic axes must come from a declaration
/// whose size operand for that axis is a positive index constant.
fn resolve_dim<G: ChainGraph + ?Sized>(
    graph: &G,
    value: NodeId,
    ty: &TensorType,
    dim: usize,
) -> ChainResult<u64> {
    if let Dim::Static(size) = ty.shape()[dim] {
        return Ok(size);
    }

    let unresolvable = ChainError::UnresolvableSize {
        operand: value,
        dim,
    };
    if !matches!(graph.op(value)?, Op::Declare { .. }) {
        return Err(unresolvable);
    }
    let size_value = ty
        .dynamic_dim_index(dim)
        .and_then(|k| graph.operands(value).ok()?.get(k).copied());
    match size_value.map(|v| graph.op(v)).transpose()? {
        Some(Op::Constant(size)) if *size > 0 => Ok(*size as u64),
        _ => Err(unresolvable),
    }
}
