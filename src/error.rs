//! Error types for contraction-chain factorization.

use alloc::string::String;

use crate::chain::LabelId;
use crate::graph::NodeId;

/// Errors that can occur while extracting, reordering or rebuilding a chain.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum ChainError {
    /// A dynamic dimension could not be traced back to an index constant.
    #[cfg_attr(
        feature = "std",
        error("size of dimension {dim} of {operand} cannot be inferred statically")
    )]
    UnresolvableSize { operand: NodeId, dim: usize },

    /// A label reached the rebuild without a recorded label value.
    #[cfg_attr(feature = "std", error("no label value recorded for {label}"))]
    MissingLabelValue { label: LabelId },

    /// The same label was resolved to two different sizes.
    #[cfg_attr(
        feature = "std",
        error("label {label} resolved to size {expected}, found {got}")
    )]
    LabelSizeMismatch { label: NodeId, expected: u64, got: u64 },

    /// A chain input does not carry a tensor type.
    #[cfg_attr(feature = "std", error("{node} is not tensor-typed"))]
    NotATensor { node: NodeId },

    /// The chain rooted at `root` violates a structural precondition.
    #[cfg_attr(feature = "std", error("invalid chain at {root}: {message}"))]
    InvalidChain { root: NodeId, message: String },

    /// The chain is longer than the configured search limit.
    #[cfg_attr(
        feature = "std",
        error("chain has {operands} operands, search limit is {limit}")
    )]
    SearchLimitExceeded { operands: usize, limit: usize },

    /// The node does not exist or was already erased.
    #[cfg_attr(feature = "std", error("unknown node {node}"))]
    UnknownNode { node: NodeId },

    /// A node was erased while it still had consumers.
    #[cfg_attr(feature = "std", error("{node} still has {users} user(s)"))]
    NodeInUse { node: NodeId, users: usize },

    /// Invalid einsum notation syntax.
    #[cfg_attr(feature = "std", error("parse error: {message}"))]
    ParseError { message: String },

    /// Incompatible number of dimensions.
    #[cfg_attr(
        feature = "std",
        error("dimension mismatch: subscript '{subscript}' expects {expected} dims, got {got}")
    )]
    DimensionMismatch {
        subscript: String,
        expected: usize,
        got: usize,
    },
}

impl ChainError {
    pub fn invalid_chain(root: NodeId, message: impl Into<String>) -> Self {
        Self::InvalidChain {
            root,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
        }
    }

    /// Returns true if the error only aborts the current chain.
    ///
    /// Recoverable errors leave the graph untouched; the pass records them and
    /// moves on to the next root. Everything else is a defect or a misuse of
    /// the graph interface and fails the whole pass.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnresolvableSize { .. }
                | Self::LabelSizeMismatch { .. }
                | Self::NotATensor { .. }
                | Self::InvalidChain { .. }
                | Self::SearchLimitExceeded { .. }
        )
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = core::result::Result<T, ChainError>;
