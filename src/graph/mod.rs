//! Program graph consumed and rewritten by the factorization pass.
//!
//! The pass only talks to the host representation through [`ChainGraph`]:
//! queries over operations, operands, users and tensor types, construction of
//! contraction and set nodes, and erasure of dead nodes. [`Graph`] is an
//! in-memory arena implementation of that interface.

mod arena;
mod builder;
pub mod interp;
mod types;

pub use arena::Graph;
pub use builder::{ChainProgram, DimSpec};
pub use types::{
    Contraction, ContractionLayout, Dim, ElemType, Format, Mask, Op, Semiring, TensorType,
};

use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ChainError, ChainResult};

/// Identity of a node (and of the value it produces).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Host graph interface used by the factorization pass.
pub trait ChainGraph {
    /// Returns true if the node exists and has not been erased.
    fn contains(&self, node: NodeId) -> bool;

    fn op(&self, node: NodeId) -> ChainResult<&Op>;

    /// Ordered inputs of the node.
    fn operands(&self, node: NodeId) -> ChainResult<&[NodeId]>;

    /// Nodes consuming the node's value, one entry per use.
    fn users(&self, node: NodeId) -> ChainResult<&[NodeId]>;

    /// Live set nodes, in program order.
    fn set_nodes(&self) -> Vec<NodeId>;

    /// Tensor type of the node's value.
    fn tensor_type(&self, node: NodeId) -> ChainResult<&TensorType> {
        self.op(node)?
            .tensor_type()
            .ok_or(ChainError::NotATensor { node })
    }

    /// Creates a pairwise contraction of `lhs` and `rhs` over `labels`.
    fn insert_contraction(
        &mut self,
        lhs: NodeId,
        rhs: NodeId,
        labels: &[NodeId],
        contraction: Contraction,
    ) -> ChainResult<NodeId>;

    /// Creates a terminal node storing `value` into `destination`.
    fn insert_set(&mut self, value: NodeId, destination: NodeId, beta: f64)
    -> ChainResult<NodeId>;

    /// Removes a node that no longer has users.
    fn erase(&mut self, node: NodeId) -> ChainResult<()>;
}

/// Borrowed view of a contraction node.
#[derive(Debug, Clone, Copy)]
pub struct ContractionView<'a> {
    pub node: NodeId,
    pub contraction: &'a Contraction,
    pub lhs: NodeId,
    pub rhs: NodeId,
    /// Label values, indexed by the layout positions.
    pub labels: &'a [NodeId],
}

impl<'a> ContractionView<'a> {
    pub fn lhs_labels(&self) -> impl Iterator<Item = NodeId> + 'a {
        let labels = self.labels;
        self.contraction.layout.lhs.iter().map(move |&p| labels[p])
    }

    pub fn rhs_labels(&self) -> impl Iterator<Item = NodeId> + 'a {
        let labels = self.labels;
        self.contraction.layout.rhs.iter().map(move |&p| labels[p])
    }

    pub fn result_labels(&self) -> impl Iterator<Item = NodeId> + 'a {
        let labels = self.labels;
        self.contraction.layout.out.iter().map(move |&p| labels[p])
    }
}

/// Returns a view of `node` if it is a contraction.
pub fn contraction_view<G: ChainGraph + ?Sized>(
    graph: &G,
    node: NodeId,
) -> ChainResult<Option<ContractionView<'_>>> {
    let Op::Contract(contraction) = graph.op(node)? else {
        return Ok(None);
    };
    let operands = graph.operands(node)?;
    if operands.len() < 2 || contraction.layout.num_dims() > operands.len() - 2 {
        return Err(ChainError::invalid_chain(
            node,
            "contraction operands do not match its layout",
        ));
    }
    Ok(Some(ContractionView {
        node,
        contraction,
        lhs: operands[0],
        rhs: operands[1],
        labels: &operands[2..],
    }))
}
