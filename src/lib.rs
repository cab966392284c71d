//! # CubeK Einsum Chain
//!
//! Contraction-chain factorization for tensor algebra graphs.
//!
//! A value such as `set(contract(contract(A, B), C), out)` is a chain of
//! pairwise contractions whose fold order does not change the result but can
//! change its cost by orders of magnitude. This crate finds the cheapest
//! left-deep order and rewrites the graph to use it.
//!
//! ## Features
//!
//! - Chain extraction with static and declaration-sized dynamic dimensions
//! - Exhaustive fold-order search with a volume (and optional layout) cost model
//! - Graph rewriting that keeps index-label identity and output layout
//! - An in-memory [`Graph`] plus an einsum-driven [`ChainProgram`] builder
//!
//! ## Example
//!
//! ```
//! use cubek_einsum_chain::{ChainFactorizer, ChainOutcome, ChainProgram};
//!
//! // (A · B) · v is far more expensive than A · (B · v).
//! let mut program = ChainProgram::build_static(
//!     "ij,jk,kl->il",
//!     &[&[100, 100], &[100, 100], &[100, 1]],
//! )
//! .unwrap();
//!
//! let outcome = ChainFactorizer::default()
//!     .optimize(&mut program.graph, program.root)
//!     .unwrap();
//! assert!(matches!(outcome, ChainOutcome::Reordered { .. }));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod chain;
pub mod error;
pub mod graph;
pub mod notation;
pub mod optimization;
pub mod pass;

pub use chain::{ContractionChain, ExtractedChain, LabelId, Operand, extract_chain};
pub use error::{ChainError, ChainResult};
pub use graph::{ChainGraph, ChainProgram, DimSpec, Graph, NodeId};
pub use notation::{EinsumNotation, Subscript, parse_einsum};
pub use optimization::{ContractionCost, CostModel, FoldOrder, exhaustive_search};
pub use pass::{ChainFactorizer, ChainOutcome, FactorizeConfig, PassReport};
