//! Tensor types and operation payloads of the program graph.

use alloc::string::String;
use core::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A single tensor dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dim {
    /// Size known from the type itself.
    Static(u64),
    /// Size supplied at declaration time by an index constant.
    Dynamic,
}

impl Dim {
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Dim::Dynamic)
    }

    /// Returns the size if it is part of the type.
    #[inline]
    pub fn static_size(&self) -> Option<u64> {
        match self {
            Dim::Static(size) => Some(*size),
            Dim::Dynamic => None,
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Static(size) => write!(f, "{}", size),
            Dim::Dynamic => write!(f, "?"),
        }
    }
}

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ElemType {
    F16,
    BF16,
    #[default]
    F32,
    F64,
}

impl fmt::Display for ElemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElemType::F16 => "f16",
            ElemType::BF16 => "bf16",
            ElemType::F32 => "f32",
            ElemType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Ranked tensor type: one [`Dim`] per axis plus an element type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorType {
    shape: SmallVec<[Dim; 4]>,
    elem: ElemType,
}

impl TensorType {
    pub fn new(shape: impl IntoIterator<Item = Dim>, elem: ElemType) -> Self {
        Self {
            shape: shape.into_iter().collect(),
            elem,
        }
    }

    /// Creates a fully static tensor type.
    pub fn with_static_shape(shape: &[u64], elem: ElemType) -> Self {
        Self::new(shape.iter().map(|&d| Dim::Static(d)), elem)
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn shape(&self) -> &[Dim] {
        &self.shape
    }

    #[inline]
    pub fn elem(&self) -> ElemType {
        self.elem
    }

    #[inline]
    pub fn is_dynamic_dim(&self, dim: usize) -> bool {
        self.shape.get(dim).is_some_and(Dim::is_dynamic)
    }

    /// Number of dynamic dimensions in the type.
    pub fn num_dynamic_dims(&self) -> usize {
        self.shape.iter().filter(|d| d.is_dynamic()).count()
    }

    /// Position of `dim` among the dynamic dimensions.
    ///
    /// Declarations take one size operand per dynamic dimension, in axis
    /// order; this is the operand index that sizes `dim`.
    pub fn dynamic_dim_index(&self, dim: usize) -> Option<usize> {
        if !self.is_dynamic_dim(dim) {
            return None;
        }
        Some(self.shape[..dim].iter().filter(|d| d.is_dynamic()).count())
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor<")?;
        for dim in &self.shape {
            write!(f, "{}x", dim)?;
        }
        write!(f, "{}>", self.elem)
    }
}

/// Storage format of a contraction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Format {
    #[default]
    Dense,
    Csr,
    Coo,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Dense => "dense",
            Format::Csr => "csr",
            Format::Coo => "coo",
        };
        f.write_str(name)
    }
}

/// Combine/reduce operator pair of a contraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Semiring {
    /// Ordinary sum of products.
    #[default]
    PlusTimes,
    /// Tropical semiring: minimum of sums.
    MinPlus,
    /// Maximum of products.
    MaxTimes,
}

impl fmt::Display for Semiring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Semiring::PlusTimes => "plusxy_times",
            Semiring::MinPlus => "minxy_plus",
            Semiring::MaxTimes => "maxxy_times",
        };
        f.write_str(name)
    }
}

/// Output masking applied by a contraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mask {
    #[default]
    None,
    Push,
    Pull,
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mask::None => "none",
            Mask::Push => "push",
            Mask::Pull => "pull",
        };
        f.write_str(name)
    }
}

/// Positions of each tensor's axes in a contraction's label list.
///
/// A contraction carries a single dense numbering of every label it touches;
/// `lhs[a]` is the label position of axis `a` of the left input, and likewise
/// for the right input and the result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContractionLayout {
    pub lhs: SmallVec<[usize; 4]>,
    pub rhs: SmallVec<[usize; 4]>,
    pub out: SmallVec<[usize; 4]>,
}

impl ContractionLayout {
    pub fn new(
        lhs: impl IntoIterator<Item = usize>,
        rhs: impl IntoIterator<Item = usize>,
        out: impl IntoIterator<Item = usize>,
    ) -> Self {
        Self {
            lhs: lhs.into_iter().collect(),
            rhs: rhs.into_iter().collect(),
            out: out.into_iter().collect(),
        }
    }

    /// Highest label position referenced plus one.
    pub fn num_dims(&self) -> usize {
        self.lhs
            .iter()
            .chain(&self.rhs)
            .chain(&self.out)
            .map(|&p| p + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Attributes of a pairwise contraction node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contraction {
    pub layout: ContractionLayout,
    pub result: TensorType,
    /// Formats of lhs, rhs and result.
    pub formats: [Format; 3],
    pub semiring: Semiring,
    pub mask: Mask,
    /// Scale applied to the combined value.
    pub alpha: f64,
    /// Factor applied to the previous result contents; 0 overwrites.
    pub beta: f64,
}

impl Contraction {
    /// Creates a dense plus-times contraction with overwrite semantics.
    pub fn new(layout: ContractionLayout, result: TensorType) -> Self {
        Self {
            layout,
            result,
            formats: [Format::Dense; 3],
            semiring: Semiring::PlusTimes,
            mask: Mask::None,
            alpha: 1.0,
            beta: 0.0,
        }
    }

    pub fn with_semiring(mut self, semiring: Semiring) -> Self {
        self.semiring = semiring;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Returns true for an unscaled, unmasked sum of products.
    ///
    /// Only plain contractions are associative with each other, so only they
    /// may be regrouped.
    pub fn is_plain(&self) -> bool {
        self.semiring == Semiring::PlusTimes && self.mask == Mask::None && self.alpha == 1.0
    }
}

/// Operation performed by a graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Function argument; has no defining operation.
    Argument { position: usize, ty: TensorType },
    /// Index constant.
    Constant(i64),
    /// Index label (an einsum subscript).
    Label { name: String },
    /// Tensor declaration; operands are the sizes of its dynamic dimensions.
    Declare { ty: TensorType, format: Format },
    /// Pairwise contraction; operands are `[lhs, rhs, labels...]`.
    Contract(Contraction),
    /// Store a value into a destination; operands are `[value, destination]`.
    Set { beta: f64 },
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::Argument { .. } => "argument",
            Op::Constant(_) => "constant",
            Op::Label { .. } => "label",
            Op::Declare { .. } => "declare",
            Op::Contract(_) => "contract",
            Op::Set { .. } => "set",
        }
    }

    #[inline]
    pub fn as_contraction(&self) -> Option<&Contraction> {
        match self {
            Op::Contract(contraction) => Some(contraction),
            _ => None,
        }
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        matches!(self, Op::Set { .. })
    }

    /// Tensor type of the value this operation produces, if any.
    pub fn tensor_type(&self) -> Option<&TensorType> {
        match self {
            Op::Argument { ty, .. } | Op::Declare { ty, .. } => Some(ty),
            Op::Contract(contraction) => Some(&contraction.result),
            _ => None,
        }
    }
}
