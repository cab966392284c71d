//! Fold orders and the per-step plans they induce.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::cost::{ContractionCost, CostModel};
use crate::chain::{LabelId, Operand};

/// A permutation of operand indices defining a left fold.
///
/// `[p0, p1, p2]` means `(op[p0] ⋈ op[p1]) ⋈ op[p2]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FoldOrder(SmallVec<[usize; 8]>);

impl FoldOrder {
    pub fn new(order: impl IntoIterator<Item = usize>) -> Self {
        Self(order.into_iter().collect())
    }

    /// `[0, 1, .., n-1]`, the first permutation in lexicographic order.
    pub fn identity(n: usize) -> Self {
        Self::new(0..n)
    }

    /// `[n-1, .., 0]`: the order a chain is already evaluated in, given
    /// operands in extraction order. Last in lexicographic order.
    pub fn natural(n: usize) -> Self {
        Self::new((0..n).rev())
    }

    pub fn is_natural(&self) -> bool {
        self.0.iter().rev().copied().eq(0..self.0.len())
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FoldOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, p) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, "]")
    }
}

/// One pairwise contraction of a fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldStep {
    /// Operand folded into the accumulator at this step.
    pub rhs: usize,
    /// Accumulator labels, in its layout order.
    pub lhs_labels: SmallVec<[LabelId; 4]>,
    pub rhs_labels: SmallVec<[LabelId; 4]>,
    /// Result labels, ascending.
    pub kept: SmallVec<[LabelId; 4]>,
    /// Labels summed away at this step, ascending.
    pub summed: SmallVec<[LabelId; 4]>,
    /// Result sizes, matching `kept`.
    pub shape: SmallVec<[u64; 4]>,
    pub cost: ContractionCost,
}

/// A fully simulated fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldPlan {
    pub order: FoldOrder,
    pub steps: Vec<FoldStep>,
    pub total: ContractionCost,
}

impl FoldPlan {
    /// Operand the fold starts from.
    pub fn first(&self) -> Option<usize> {
        self.order.as_slice().first().copied()
    }

    /// Labels of the folded result. Empty for an empty order.
    pub fn result_labels<'a>(&'a self, operands: &'a [Operand]) -> &'a [LabelId] {
        match (self.steps.last(), self.first()) {
            (Some(step), _) => step.kept.as_slice(),
            (None, Some(first)) => operands[first].labels.as_slice(),
            (None, None) => &[],
        }
    }
}

/// Simulates folding `operands` in `order` and prices every step.
///
/// A label survives a step if it is free or still carried by an operand not
/// yet folded; every other label touched by the step is summed there. `sizes`
/// is indexed by [`LabelId`].
///
/// # Panics
/// Panics if `order` indexes past `operands` or a label past `sizes`.
pub fn simulate_fold(
    order: &FoldOrder,
    operands: &[Operand],
    free: &BTreeSet<LabelId>,
    sizes: &[u64],
    cost_model: &CostModel,
) -> FoldPlan {
    let order_slice = order.as_slice();
    let mut steps = Vec::with_capacity(order_slice.len().saturating_sub(1));
    let mut total = ContractionCost::zero();

    let Some(&first) = order_slice.first() else {
        return FoldPlan {
            order: order.clone(),
            steps,
            total,
        };
    };

    let shape_of = |labels: &[LabelId]| -> SmallVec<[u64; 4]> {
        labels.iter().map(|l| sizes[l.index()]).collect()
    };

    let mut acc: SmallVec<[LabelId; 4]> = operands[first].labels.clone();
    for (k, &rhs) in order_slice.iter().enumerate().skip(1) {
        let rhs_labels = &operands[rhs].labels;

        let touched: BTreeSet<LabelId> = acc.iter().chain(rhs_labels).copied().collect();
        let needed: BTreeSet<LabelId> = order_slice[k + 1..]
            .iter()
            .flat_map(|&p| operands[p].labels.iter().copied())
            .chain(free.iter().copied())
            .collect();
        let (kept, summed): (SmallVec<[LabelId; 4]>, SmallVec<[LabelId; 4]>) =
            touched.iter().copied().partition(|l| needed.contains(l));

        let shape = shape_of(&kept);
        let cost = cost_model.step_cost(
            &acc,
            &shape_of(&acc),
            rhs_labels,
            &shape_of(rhs_labels),
            &kept,
            &shape,
        );
        total += cost;

        steps.push(FoldStep {
            rhs,
            lhs_labels: acc,
            rhs_labels: rhs_labels.clone(),
            kept: kept.clone(),
            summed,
            shape,
            cost,
        });
        acc = kept;
    }

    FoldPlan {
        order: order.clone(),
        steps,
        total,
    }
}
