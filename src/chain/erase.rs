//! Dead-node erasure.

use alloc::vec::Vec;

use hashbrown::HashSet;

use crate::error::ChainResult;
use crate::graph::{ChainGraph, NodeId};

/// Erases `roots` together with everything that transitively consumes them.
///
/// Consumers are erased before the nodes they use. Shared consumers (diamonds)
/// are visited once and roots that are already gone are skipped. Returns the
/// number of erased nodes.
pub fn erase_with_users<G: ChainGraph + ?Sized>(
    graph: &mut G,
    roots: &[NodeId],
) -> ChainResult<usize> {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut order: Vec<NodeId> = Vec::new();

    for &root in roots {
        if !graph.contains(root) {
            continue;
        }
        // (node, users already expanded)
        let mut stack: Vec<(NodeId, bool)> = alloc::vec![(root, false)];
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                order.push(node);
                continue;
            }
            if !visited.insert(node) {
                continue;
            }
            stack.push((node, true));
            stack.extend(
                graph
                    .users(node)?
                    .iter()
                    .filter(|user| !visited.contains(*user))
                    .map(|&user| (user, false)),
            );
        }
    }

    for &node in &order {
        graph.erase(node)?;
    }
    tracing::trace!(erased = order.len(), "erased dead nodes");
    Ok(order.len())
}
