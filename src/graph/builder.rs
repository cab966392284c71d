//! Builds left-deep contraction chains from einsum notation.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::ToString;
use alloc::vec::Vec;

use smallvec::SmallVec;

use super::arena::Graph;
use super::types::{Contraction, ContractionLayout, Dim, ElemType, Format, TensorType};
use super::NodeId;
use crate::error::{ChainError, ChainResult};
use crate::notation::{EinsumNotation, Subscript, parse_einsum};

/// How an input dimension is sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimSpec {
    /// Size is part of the tensor type.
    Static(u64),
    /// Dynamic in the type, sized by an index constant at declaration.
    Dynamic(u64),
    /// Dynamic with no traceable size; the input becomes a function argument.
    Unknown,
}

impl DimSpec {
    fn size(&self) -> Option<u64> {
        match self {
            DimSpec::Static(size) | DimSpec::Dynamic(size) => Some(*size),
            DimSpec::Unknown => None,
        }
    }
}

/// A program holding one contraction chain and the set node consuming it.
///
/// `ij,jk,kl->il` becomes `set(contract(contract(A, B), C), out)`: inputs are
/// folded left to right, each intermediate keeping only the labels still
/// needed by a later input or the output.
#[derive(Debug, Clone)]
pub struct ChainProgram {
    pub graph: Graph,
    /// The set node.
    pub root: NodeId,
    /// Input tensor values, in notation order.
    pub inputs: Vec<NodeId>,
    pub destination: NodeId,
    pub notation: EinsumNotation,
    labels: BTreeMap<char, NodeId>,
}

impl ChainProgram {
    /// Builds a chain whose inputs all have static shapes.
    pub fn build_static(notation: &str, shapes: &[&[u64]]) -> ChainResult<Self> {
        let dims: Vec<Vec<DimSpec>> = shapes
            .iter()
            .map(|shape| shape.iter().map(|&d| DimSpec::Static(d)).collect())
            .collect();
        let dims: Vec<&[DimSpec]> = dims.iter().map(Vec::as_slice).collect();
        Self::build(notation, &dims)
    }

    pub fn build(notation: &str, dims: &[&[DimSpec]]) -> ChainResult<Self> {
        let notation = parse_einsum(notation)?;

        if dims.len() != notation.num_inputs() {
            return Err(ChainError::parse(alloc::format!(
                "expected {} input shapes, got {}",
                notation.num_inputs(),
                dims.len()
            )));
        }

        let mut sizes: BTreeMap<char, u64> = BTreeMap::new();
        for (subscript, shape) in notation.inputs().iter().zip(dims) {
            if subscript.len() != shape.len() {
                return Err(ChainError::DimensionMismatch {
                    subscript: subscript.to_string(),
                    expected: subscript.len(),
                    got: shape.len(),
                });
            }
            for (c, spec) in subscript.iter().zip(shape.iter()) {
                if let Some(size) = spec.size() {
                    sizes.entry(c).or_insert(size);
                }
            }
        }

        let mut graph = Graph::new();
        let labels: BTreeMap<char, NodeId> = notation
            .labels()
            .into_iter()
            .map(|c| (c, graph.label(c.to_string())))
            .collect();

        let mut inputs = Vec::with_capacity(dims.len());
        for (position, shape) in dims.iter().enumerate() {
            inputs.push(declare_input(&mut graph, position, shape)?);
        }

        let result_type = |subscript: &Subscript| {
            TensorType::new(
                subscript
                    .iter()
                    .map(|c| sizes.get(&c).map_or(Dim::Dynamic, |&s| Dim::Static(s))),
                ElemType::F32,
            )
        };

        let mut acc = inputs[0];
        let mut acc_sub = notation.inputs()[0].clone();
        for step in 1..notation.num_inputs() {
            let rhs_sub = &notation.inputs()[step];
            let out_sub = notation.fold_output(step);

            let mut seen = BTreeSet::new();
            let all = Subscript::from_chars(
                acc_sub
                    .iter()
                    .chain(rhs_sub.iter())
                    .filter(|&c| seen.insert(c)),
            );
            let position = |c: char| all.position(c).unwrap_or(0);
            let layout = ContractionLayout::new(
                acc_sub.iter().map(position),
                rhs_sub.iter().map(position),
                out_sub.iter().map(position),
            );
            let label_values: SmallVec<[NodeId; 8]> = all.iter().map(|c| labels[&c]).collect();

            let contraction = Contraction::new(layout, result_type(&out_sub));
            acc = graph.contract(acc, inputs[step], &label_values, contraction)?;
            acc_sub = out_sub;
        }

        let destination = graph.argument(dims.len(), result_type(notation.output()));
        let root = graph.set(acc, destination, 0.0)?;

        Ok(Self {
            graph,
            root,
            inputs,
            destination,
            notation,
            labels,
        })
    }

    /// Label node of an einsum subscript character.
    pub fn label(&self, c: char) -> Option<NodeId> {
        self.labels.get(&c).copied()
    }
}

fn declare_input(graph: &mut Graph, position: usize, shape: &[DimSpec]) -> ChainResult<NodeId> {
    let ty = TensorType::new(
        shape.iter().map(|spec| match spec {
            DimSpec::Static(size) => Dim::Static(*size),
            DimSpec::Dynamic(_) | DimSpec::Unknown => Dim::Dynamic,
        }),
        ElemType::F32,
    );

    if shape.contains(&DimSpec::Unknown) {
        return Ok(graph.argument(position, ty));
    }

    let mut dynamic_sizes: SmallVec<[NodeId; 4]> = SmallVec::new();
    for spec in shape {
        if let DimSpec::Dynamic(size) = spec {
            let size = i64::try_from(*size).map_err(|_| {
                ChainError::parse(alloc::format!(
                    "dynamic size {size} of input {position} does not fit an index constant"
                ))
            })?;
            dynamic_sizes.push(graph.constant(size));
        }
    }
    graph.declare(ty, Format::Dense, &dynamic_sizes)
}
