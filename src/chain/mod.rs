//! Contraction chains: extraction from the graph, rebuilding in a new fold
//! order, and cleanup of the nodes a rebuild supersedes.

mod erase;
mod extract;
mod labels;
mod rebuild;

pub use erase::erase_with_users;
pub use extract::{ContractionChain, ExtractedChain, Operand, extract_chain};
pub use labels::{LabelId, LabelRegistry};
pub use rebuild::{PlannedContraction, RebuildPlan, Rebuilt, plan_rebuild, rebuild_chain};
