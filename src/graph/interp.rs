//! Reference interpreter for contraction graphs.
//!
//! Evaluates contraction nodes on dense `f64` tensors with a naive loop nest.
//! It exists to check that a rewritten chain computes the same values as the
//! original one; it is not meant to be fast.

use alloc::vec;
use alloc::vec::Vec;

use hashbrown::HashMap;

use super::types::Semiring;
use super::{ChainGraph, NodeId, Op, contraction_view};
use crate::error::{ChainError, ChainResult};

/// Dense row-major tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl DenseTensor {
    /// # Panics
    /// Panics if `data` does not hold exactly one value per element.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Self {
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "data length does not match shape {:?}",
            shape
        );
        Self { shape, data }
    }

    /// Builds a tensor by evaluating `f` at every multi-index.
    pub fn from_fn(shape: &[usize], mut f: impl FnMut(&[usize]) -> f64) -> Self {
        let len = shape.iter().product();
        let mut data = Vec::with_capacity(len);
        let mut index = vec![0; shape.len()];
        for _ in 0..len {
            data.push(f(&index));
            advance(&mut index, shape);
        }
        Self {
            shape: shape.to_vec(),
            data,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, index: &[usize]) -> f64 {
        self.data[offset(index, &self.shape)]
    }

    /// Element-wise comparison with a relative tolerance.
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.shape == other.shape
            && self.data.iter().zip(&other.data).all(|(a, b)| {
                let scale = a.abs().max(b.abs()).max(1.0);
                (a - b).abs() <= tolerance * scale
            })
    }
}

/// Evaluates the value produced by `node`.
///
/// Leaf values are looked up in `inputs`; a set node evaluates to the value
/// it stores.
pub fn evaluate<G: ChainGraph + ?Sized>(
    graph: &G,
    node: NodeId,
    inputs: &HashMap<NodeId, DenseTensor>,
) -> ChainResult<DenseTensor> {
    if let Some(tensor) = inputs.get(&node) {
        return Ok(tensor.clone());
    }

    match graph.op(node)? {
        Op::Set { .. } => evaluate(graph, graph.operands(node)?[0], inputs),
        Op::Contract(_) => evaluate_contraction(graph, node, inputs),
        _ => Err(ChainError::invalid_chain(node, "no input tensor bound")),
    }
}

fn evaluate_contraction<G: ChainGraph + ?Sized>(
    graph: &G,
    node: NodeId,
    inputs: &HashMap<NodeId, DenseTensor>,
) -> ChainResult<DenseTensor> {
    let Some(view) = contraction_view(graph, node)? else {
        return Err(ChainError::invalid_chain(node, "not a contraction"));
    };
    let lhs = evaluate(graph, view.lhs, inputs)?;
    let rhs = evaluate(graph, view.rhs, inputs)?;
    let layout = &view.contraction.layout;

    let mut sizes = vec![0usize; layout.num_dims()];
    for (map, tensor) in [(&layout.lhs, &lhs), (&layout.rhs, &rhs)] {
        for (axis, &pos) in map.iter().enumerate() {
            sizes[pos] = tensor.shape[axis];
        }
    }

    let out_shape: Vec<usize> = layout.out.iter().map(|&p| sizes[p]).collect();
    let (identity, add, mul): (f64, fn(f64, f64) -> f64, fn(f64, f64) -> f64) =
        match view.contraction.semiring {
            Semiring::PlusTimes => (0.0, |a, b| a + b, |a, b| a * b),
            Semiring::MinPlus => (f64::INFINITY, f64::min, |a, b| a + b),
            Semiring::MaxTimes => (f64::NEG_INFINITY, f64::max, |a, b| a * b),
        };
    let mut out = DenseTensor {
        data: vec![identity; out_shape.iter().product()],
        shape: out_shape,
    };

    let total: usize = sizes.iter().product();
    let mut index = vec![0usize; sizes.len()];
    let gather = |map: &[usize], index: &[usize]| -> Vec<usize> {
        map.iter().map(|&p| index[p]).collect()
    };
    for _ in 0..total {
        let a = lhs.get(&gather(&layout.lhs, &index));
        let b = rhs.get(&gather(&layout.rhs, &index));
        let at = offset(&gather(&layout.out, &index), &out.shape);
        out.data[at] = add(out.data[at], mul(a, b));
        advance(&mut index, &sizes);
    }

    let alpha = view.contraction.alpha;
    if alpha != 1.0 {
        out.data.iter_mut().for_each(|v| *v *= alpha);
    }
    Ok(out)
}

fn offset(index: &[usize], shape: &[usize]) -> usize {
    index
        .iter()
        .zip(shape)
        .fold(0, |acc, (&i, &dim)| acc * dim + i)
}

/// Row-major odometer increment.
fn advance(index: &mut [usize], shape: &[usize]) {
    for axis in (0..index.len()).rev() {
        index[axis] += 1;
        if index[axis] < shape[axis] {
            return;
        }
        index[axis] = 0;
    }
}
