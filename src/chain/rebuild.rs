//! Materializes a fold plan as new contraction nodes.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use smallvec::SmallVec;

use super::erase::erase_with_users;
use super::extract::ExtractedChain;
use super::labels::LabelId;
use crate::error::{ChainError, ChainResult};
use crate::graph::{ChainGraph, Contraction, ContractionLayout, NodeId, TensorType};
use crate::optimization::FoldPlan;

/// A contraction ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedContraction {
    /// Leaf operand folded in at this step.
    pub rhs: NodeId,
    /// Label values, indexed by the layout positions.
    pub labels: SmallVec<[NodeId; 8]>,
    pub contraction: Contraction,
}

/// Everything needed to rewrite a chain, computed without touching the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct RebuildPlan {
    /// Operand the fold starts from.
    pub first: NodeId,
    /// One entry per step; each takes the previous result as its lhs.
    pub steps: Vec<PlannedContraction>,
}

/// Result of a rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebuilt {
    /// The new set node.
    pub root: NodeId,
    /// New contraction nodes, innermost first.
    pub contractions: Vec<NodeId>,
    /// Number of nodes erased, the old set node included.
    pub erased: usize,
}

/// Lowers `plan` to concrete contractions.
///
/// Each step numbers the labels it touches by first appearance over the lhs
/// labels, then the rhs labels, and lays the result out in ascending label
/// id. Since the free labels are interned first, the final result keeps the
/// original layout.
pub fn plan_rebuild<G: ChainGraph + ?Sized>(
    graph: &G,
    extracted: &ExtractedChain,
    plan: &FoldPlan,
) -> ChainResult<RebuildPlan> {
    let chain = &extracted.chain;
    check_erasable(graph, extracted)?;
    let operand = |index: usize| {
        chain.operands.get(index).ok_or_else(|| {
            ChainError::invalid_chain(
                chain.root,
                alloc::format!("fold order refers to missing operand {}", index),
            )
        })
    };

    let first = plan
        .first()
        .ok_or_else(|| ChainError::invalid_chain(chain.root, "empty fold order"))
        .and_then(operand)?;
    let elem = graph.tensor_type(first.value)?.elem();

    let mut steps = Vec::with_capacity(plan.steps.len());
    for step in &plan.steps {
        let rhs = operand(step.rhs)?;

        let mut touched: SmallVec<[LabelId; 8]> = SmallVec::new();
        for &label in step.lhs_labels.iter().chain(&step.rhs_labels) {
            if !touched.contains(&label) {
                touched.push(label);
            }
        }
        let position = |label: &LabelId| touched.iter().position(|t| t == label);
        let positions = |labels: &[LabelId]| -> ChainResult<SmallVec<[usize; 4]>> {
            labels
                .iter()
                .map(|label| {
                    position(label).ok_or_else(|| {
                        ChainError::invalid_chain(
                            chain.root,
                            alloc::format!("label {} is not touched by its step", label),
                        )
                    })
                })
                .collect()
        };

        let layout = ContractionLayout::new(
            positions(&step.lhs_labels)?,
            positions(&step.rhs_labels)?,
            positions(&step.kept)?,
        );
        let labels = touched
            .iter()
            .map(|&id| extracted.labels.value(id))
            .collect::<ChainResult<SmallVec<[NodeId; 8]>>>()?;
        let result = TensorType::with_static_shape(&step.shape, elem);

        steps.push(PlannedContraction {
            rhs: rhs.value,
            labels,
            contraction: Contraction::new(layout, result),
        });
    }

    let result: BTreeSet<LabelId> = plan.result_labels(&chain.operands).iter().copied().collect();
    if result != chain.free_set() {
        return Err(ChainError::invalid_chain(
            chain.root,
            "folded result does not carry exactly the free labels",
        ));
    }

    Ok(RebuildPlan {
        first: first.value,
        steps,
    })
}

/// Fails unless the old chain is consumed only by itself and its set node,
/// and the set node has no consumers.
fn check_erasable<G: ChainGraph + ?Sized>(
    graph: &G,
    extracted: &ExtractedChain,
) -> ChainResult<()> {
    let chain = &extracted.chain;
    if !graph.users(chain.root)?.is_empty() {
        return Err(ChainError::invalid_chain(
            chain.root,
            "set node has consumers and cannot be replaced",
        ));
    }
    for &node in &chain.nodes {
        for user in graph.users(node)? {
            if *user != chain.root && !chain.nodes.contains(user) {
                return Err(ChainError::invalid_chain(
                    chain.root,
                    alloc::format!("{} is consumed outside the chain by {}", node, user),
                ));
            }
        }
    }
    Ok(())
}

/// Rewrites the chain to follow `plan`.
///
/// Returns `Ok(None)` without touching the graph when `plan` is the order the
/// chain already has. Otherwise inserts the new contractions and a new set
/// node storing into the original destination, then erases the old chain.
/// All fallible planning happens before the first mutation.
pub fn rebuild_chain<G: ChainGraph + ?Sized>(
    graph: &mut G,
    extracted: &ExtractedChain,
    plan: &FoldPlan,
) -> ChainResult<Option<Rebuilt>> {
    if plan.order.is_natural() {
        return Ok(None);
    }
    let rebuild = plan_rebuild(&*graph, extracted, plan)?;
    let chain = &extracted.chain;

    let mut acc = rebuild.first;
    let mut contractions = Vec::with_capacity(rebuild.steps.len());
    for step in rebuild.steps {
        acc = graph.insert_contraction(acc, step.rhs, &step.labels, step.contraction)?;
        contractions.push(acc);
    }
    let root = graph.insert_set(acc, chain.destination, 0.0)?;
    let erased = erase_with_users(graph, &chain.nodes)?;

    tracing::debug!(
        old_root = %chain.root,
        new_root = %root,
        order = %plan.order,
        erased,
        "rebuilt contraction chain"
    );

    Ok(Some(Rebuilt {
        root,
        contractions,
        erased,
    }))
}
