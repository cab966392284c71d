//! Arena-backed program graph.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use smallvec::SmallVec;

use super::types::{Contraction, Format, Op, TensorType};
use super::{ChainGraph, NodeId};
use crate::error::{ChainError, ChainResult};

#[derive(Debug, Clone)]
struct Node {
    op: Op,
    operands: SmallVec<[NodeId; 4]>,
    users: SmallVec<[NodeId; 4]>,
}

/// In-memory program graph.
///
/// Nodes live in an arena indexed by [`NodeId`]; erased slots are left empty
/// so identities are never reused. Every node keeps its user list in sync with
/// the operand lists of its consumers.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    live: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live nodes in program order.
    pub fn live_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| NodeId::new(i))
    }

    /// Adds a node, registering it as a user of each operand.
    pub fn add(&mut self, op: Op, operands: &[NodeId]) -> ChainResult<NodeId> {
        for &operand in operands {
            self.node(operand)?;
        }

        let id = NodeId::new(self.nodes.len());
        for &operand in operands {
            if let Some(node) = self.nodes[operand.index()].as_mut() {
                node.users.push(id);
            }
        }
        self.nodes.push(Some(Node {
            op,
            operands: operands.iter().copied().collect(),
            users: SmallVec::new(),
        }));
        self.live += 1;
        Ok(id)
    }

    pub fn argument(&mut self, position: usize, ty: TensorType) -> NodeId {
        self.push_leaf(Op::Argument { position, ty })
    }

    pub fn constant(&mut self, value: i64) -> NodeId {
        self.push_leaf(Op::Constant(value))
    }

    pub fn label(&mut self, name: impl Into<String>) -> NodeId {
        self.push_leaf(Op::Label { name: name.into() })
    }

    /// Declares a tensor; `dynamic_sizes` holds one size value per dynamic dim.
    pub fn declare(
        &mut self,
        ty: TensorType,
        format: Format,
        dynamic_sizes: &[NodeId],
    ) -> ChainResult<NodeId> {
        if dynamic_sizes.len() != ty.num_dynamic_dims() {
            return Err(ChainError::DimensionMismatch {
                subscript: alloc::format!("{}", ty),
                expected: ty.num_dynamic_dims(),
                got: dynamic_sizes.len(),
            });
        }
        self.add(Op::Declare { ty, format }, dynamic_sizes)
    }

    /// Adds a contraction after checking its layout against the inputs.
    pub fn contract(
        &mut self,
        lhs: NodeId,
        rhs: NodeId,
        labels: &[NodeId],
        contraction: Contraction,
    ) -> ChainResult<NodeId> {
        let lhs_rank = self.tensor_type(lhs)?.rank();
        let rhs_rank = self.tensor_type(rhs)?.rank();
        let layout = &contraction.layout;

        let ranks = [
            (layout.lhs.len(), lhs_rank),
            (layout.rhs.len(), rhs_rank),
            (layout.out.len(), contraction.result.rank()),
        ];
        for (expected, got) in ranks {
            if expected != got {
                return Err(ChainError::DimensionMismatch {
                    subscript: alloc::format!("{:?}", layout),
                    expected,
                    got,
                });
            }
        }
        if layout.num_dims() > labels.len() {
            return Err(ChainError::DimensionMismatch {
                subscript: alloc::format!("{:?}", layout),
                expected: layout.num_dims(),
                got: labels.len(),
            });
        }

        let mut operands: SmallVec<[NodeId; 8]> = SmallVec::with_capacity(labels.len() + 2);
        operands.push(lhs);
        operands.push(rhs);
        operands.extend_from_slice(labels);
        self.add(Op::Contract(contraction), &operands)
    }

    pub fn set(&mut self, value: NodeId, destination: NodeId, beta: f64) -> ChainResult<NodeId> {
        self.tensor_type(value)?;
        self.tensor_type(destination)?;
        self.add(Op::Set { beta }, &[value, destination])
    }

    fn push_leaf(&mut self, op: Op) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Some(Node {
            op,
            operands: SmallVec::new(),
            users: SmallVec::new(),
        }));
        self.live += 1;
        id
    }

    fn node(&self, id: NodeId) -> ChainResult<&Node> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(ChainError::UnknownNode { node: id })
    }
}

impl ChainGraph for Graph {
    fn contains(&self, node: NodeId) -> bool {
        self.node(node).is_ok()
    }

    fn op(&self, node: NodeId) -> ChainResult<&Op> {
        Ok(&self.node(node)?.op)
    }

    fn operands(&self, node: NodeId) -> ChainResult<&[NodeId]> {
        Ok(&self.node(node)?.operands)
    }

    fn users(&self, node: NodeId) -> ChainResult<&[NodeId]> {
        Ok(&self.node(node)?.users)
    }

    fn set_nodes(&self) -> Vec<NodeId> {
        self.live_nodes()
            .filter(|&id| self.node(id).is_ok_and(|node| node.op.is_set()))
            .collect()
    }

    fn insert_contraction(
        &mut self,
        lhs: NodeId,
        rhs: NodeId,
        labels: &[NodeId],
        contraction: Contraction,
    ) -> ChainResult<NodeId> {
        self.contract(lhs, rhs, labels, contraction)
    }

    fn insert_set(
        &mut self,
        value: NodeId,
        destination: NodeId,
        beta: f64,
    ) -> ChainResult<NodeId> {
        self.set(value, destination, beta)
    }

    fn erase(&mut self, node: NodeId) -> ChainResult<()> {
        let users = self.node(node)?.users.len();
        if users > 0 {
            return Err(ChainError::NodeInUse { node, users });
        }

        let Some(erased) = self.nodes[node.index()].take() else {
            return Err(ChainError::UnknownNode { node });
        };
        for operand in erased.operands {
            if let Some(producer) = self.nodes[operand.index()].as_mut() {
                if let Some(pos) = producer.users.iter().position(|&u| u == node) {
                    producer.users.remove(pos);
                }
            }
        }
        self.live -= 1;
        Ok(())
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, slot) in self.nodes.iter().enumerate() {
            let Some(node) = slot else { continue };
            write!(f, "{} = ", NodeId::new(i))?;
            match &node.op {
                Op::Argument { position, ty } => write!(f, "argument #{} : {}", position, ty)?,
                Op::Constant(value) => write!(f, "constant {}", value)?,
                Op::Label { name } => write!(f, "label \"{}\"", name)?,
                Op::Declare { ty, format } => {
                    write!(f, "declare {}", format)?;
                    write_operands(f, &node.operands)?;
                    write!(f, " : {}", ty)?;
                }
                Op::Contract(c) => {
                    write!(f, "contract {}, {} [", node.operands[0], node.operands[1])?;
                    for (k, label) in node.operands[2..].iter().enumerate() {
                        if k > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", label)?;
                    }
                    write!(
                        f,
                        "] lhs={:?} rhs={:?} out={:?} {} mask={} alpha={} beta={} : {}",
                        c.layout.lhs.as_slice(),
                        c.layout.rhs.as_slice(),
                        c.layout.out.as_slice(),
                        c.semiring,
                        c.mask,
                        c.alpha,
                        c.beta,
                        c.result
                    )?;
                }
                Op::Set { beta } => write!(
                    f,
                    "set {} -> {} beta={}",
                    node.operands[0], node.operands[1], beta
                )?,
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn write_operands(f: &mut fmt::Formatter<'_>, operands: &[NodeId]) -> fmt::Result {
    for operand in operands {
        write!(f, " {}", operand)?;
    }
    Ok(())
}
