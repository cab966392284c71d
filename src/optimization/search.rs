//! Exhaustive search over fold orders.

use alloc::collections::BTreeSet;

use smallvec::SmallVec;

use super::cost::{ContractionCost, CostModel};
use super::path::{FoldOrder, FoldPlan, simulate_fold};
use crate::chain::{LabelId, Operand};
use crate::error::{ChainError, ChainResult};

/// Outcome of a fold-order search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Cheapest plan found.
    pub plan: FoldPlan,
    /// Cost of the order the chain is currently evaluated in.
    pub natural_cost: ContractionCost,
    /// Number of orders evaluated.
    pub evaluated: usize,
}

impl SearchResult {
    pub fn order(&self) -> &FoldOrder {
        &self.plan.order
    }

    /// True if the winner is the order already in the program.
    pub fn is_natural(&self) -> bool {
        self.plan.order.is_natural()
    }
}

/// Rearranges `perm` into the next permutation in lexicographic order.
///
/// Returns false, leaving `perm` untouched, when it is already the last one.
pub fn next_permutation(perm: &mut [usize]) -> bool {
    let Some(pivot) = perm.windows(2).rposition(|w| w[0] < w[1]) else {
        return false;
    };
    let Some(successor) = perm.iter().rposition(|&x| x > perm[pivot]) else {
        return false;
    };
    perm.swap(pivot, successor);
    perm[pivot + 1..].reverse();
    true
}

/// Evaluates every fold order of `operands` and keeps the cheapest.
///
/// Orders are enumerated lexicographically from the identity. Among orders of
/// equal cost the one enumerated last wins; since the natural order comes
/// last, a chain that is already optimal is never reported as reordered.
/// Chains of at most two operands return the natural order without
/// enumerating. `max_operands` bounds the factorial blow-up: longer chains fail
/// with [`ChainError::SearchLimitExceeded`] before any work is done.
pub fn exhaustive_search(
    operands: &[Operand],
    free: &BTreeSet<LabelId>,
    sizes: &[u64],
    cost_model: &CostModel,
    max_operands: Option<usize>,
) -> ChainResult<SearchResult> {
    let n = operands.len();
    if let Some(limit) = max_operands.filter(|&limit| n > limit) {
        return Err(ChainError::SearchLimitExceeded { operands: n, limit });
    }

    if n <= 2 {
        let plan = simulate_fold(&FoldOrder::natural(n), operands, free, sizes, cost_model);
        return Ok(SearchResult {
            natural_cost: plan.total,
            plan,
            evaluated: 1,
        });
    }

    let mut perm: SmallVec<[usize; 8]> = (0..n).collect();
    let mut plan = simulate_fold(&FoldOrder::identity(n), operands, free, sizes, cost_model);
    let mut last_cost = plan.total;
    let mut evaluated = 1usize;

    while next_permutation(&mut perm) {
        let order = FoldOrder::new(perm.iter().copied());
        let candidate = simulate_fold(&order, operands, free, sizes, cost_model);
        evaluated += 1;
        last_cost = candidate.total;
        tracing::trace!(order = %order, cost = candidate.total.total, "evaluated fold order");

        if candidate.total.total <= plan.total.total {
            plan = candidate;
        }
    }

    tracing::debug!(
        operands = n,
        evaluated,
        best = %plan.order,
        cost = plan.total.total,
        natural_cost = last_cost.total,
        "fold order search finished"
    );

    Ok(SearchResult {
        plan,
        natural_cost: last_cost,
        evaluated,
    })
}
