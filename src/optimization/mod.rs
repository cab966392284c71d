//! Fold-order optimization for contraction chains.
//!
//! A chain of `n` operands can be folded pairwise in `n!` left-deep orders.
//! [`exhaustive_search`] prices each of them with a [`CostModel`] and keeps
//! the cheapest, together with the per-step plan needed to rebuild it.

mod cost;
mod path;
mod search;

pub use cost::{ContractionCost, CostModel};
pub use path::{FoldOrder, FoldPlan, FoldStep, simulate_fold};
pub use search::{SearchResult, exhaustive_search, next_permutation};
