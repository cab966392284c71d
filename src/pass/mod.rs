//! The chain factorization pass.
//!
//! For every set node storing a chain of pairwise contractions, the pass
//! searches for the cheapest left-deep fold order and rewrites the chain to
//! use it. Chains that cannot be analysed or replaced are skipped and reported
//! before any node is touched.

mod config;

pub use config::{DEFAULT_MAX_OPERANDS, FactorizeConfig};

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::chain::{extract_chain, rebuild_chain};
use crate::error::{ChainError, ChainResult};
use crate::graph::{ChainGraph, NodeId};
use crate::optimization::{ContractionCost, FoldOrder, exhaustive_search};

/// What the pass did with one root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChainOutcome {
    /// The pass is disabled.
    Disabled,
    /// The stored value is not a chain of at least two operands.
    NotAChain,
    /// The chain already uses a cheapest order.
    Unchanged { operands: usize, cost: ContractionCost },
    /// The chain was rebuilt; `new_root` replaces the analysed set node.
    Reordered {
        order: FoldOrder,
        old_cost: ContractionCost,
        new_cost: ContractionCost,
        new_root: NodeId,
    },
}

impl ChainOutcome {
    pub fn is_reordered(&self) -> bool {
        matches!(self, Self::Reordered { .. })
    }
}

/// A chain skipped because of a recoverable error.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub root: NodeId,
    pub error: ChainError,
}

/// Summary of a whole-graph run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// One entry per analysed root, in program order.
    pub outcomes: Vec<(NodeId, ChainOutcome)>,
    pub diagnostics: Vec<Diagnostic>,
}

impl PassReport {
    pub fn num_reordered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_reordered())
            .count()
    }

    /// True if the run did not modify the graph.
    pub fn is_noop(&self) -> bool {
        self.num_reordered() == 0
    }

    pub fn outcome(&self, root: NodeId) -> Option<&ChainOutcome> {
        self.outcomes
            .iter()
            .find(|(r, _)| *r == root)
            .map(|(_, outcome)| outcome)
    }
}

/// Reorders contraction chains to minimize estimated cost.
#[derive(Debug, Clone, Default)]
pub struct ChainFactorizer {
    config: FactorizeConfig,
}

impl ChainFactorizer {
    pub fn new(config: FactorizeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FactorizeConfig {
        &self.config
    }

    /// Optimizes the chain stored by the set node `root`.
    ///
    /// On error the graph is unchanged.
    #[tracing::instrument(skip_all, fields(root = %root))]
    pub fn optimize<G: ChainGraph + ?Sized>(
        &self,
        graph: &mut G,
        root: NodeId,
    ) -> ChainResult<ChainOutcome> {
        if !self.config.enabled {
            return Ok(ChainOutcome::Disabled);
        }
        let Some(extracted) = extract_chain(&*graph, root)? else {
            return Ok(ChainOutcome::NotAChain);
        };
        let chain = &extracted.chain;
        let sizes = extracted
            .labels
            .sizes()
            .ok_or_else(|| ChainError::invalid_chain(root, "label without a resolved size"))?;

        let result = exhaustive_search(
            &chain.operands,
            &chain.free_set(),
            &sizes,
            &self.config.cost_model,
            self.config.max_operands,
        )?;

        match rebuild_chain(graph, &extracted, &result.plan)? {
            None => {
                tracing::debug!(cost = result.natural_cost.total, "chain already optimal");
                Ok(ChainOutcome::Unchanged {
                    operands: chain.len(),
                    cost: result.natural_cost,
                })
            }
            Some(rebuilt) => {
                tracing::debug!(
                    old_cost = result.natural_cost.total,
                    new_cost = result.plan.total.total,
                    "chain reordered"
                );
                Ok(ChainOutcome::Reordered {
                    order: result.plan.order,
                    old_cost: result.natural_cost,
                    new_cost: result.plan.total,
                    new_root: rebuilt.root,
                })
            }
        }
    }

    /// Optimizes every set node of `graph`.
    ///
    /// Roots are collected up front, so set nodes created by a rewrite are
    /// not revisited. Recoverable errors skip their chain and end up in the
    /// report; any other error aborts the run.
    pub fn run<G: ChainGraph + ?Sized>(&self, graph: &mut G) -> ChainResult<PassReport> {
        let mut report = PassReport::default();

        for root in graph.set_nodes() {
            if !graph.contains(root) {
                continue;
            }
            match self.optimize(graph, root) {
                Ok(outcome) => report.outcomes.push((root, outcome)),
                Err(error) if error.is_recoverable() => {
                    tracing::warn!(root = %root, ?error, "skipping contraction chain");
                    report.diagnostics.push(Diagnostic { root, error });
                }
                Err(error) => return Err(error),
            }
        }

        tracing::debug!(
            roots = report.outcomes.len(),
            reordered = report.num_reordered(),
            skipped = report.diagnostics.len(),
            "chain factorization finished"
        );
        Ok(report)
    }
}
