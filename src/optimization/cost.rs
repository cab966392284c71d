//! Cost model for pairwise contractions.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::chain::LabelId;

/// Cost of one pairwise contraction, or of a whole fold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractionCost {
    /// Iteration-space volume: product of the sizes of all labels spanned.
    pub volume: u64,
    /// Penalty for operands or results not laid out in canonical label order.
    pub transpose: u64,
    /// Combined cost used for comparison.
    pub total: u64,
}

impl ContractionCost {
    pub fn new(volume: u64, transpose: u64) -> Self {
        Self {
            volume,
            transpose,
            total: volume.saturating_add(transpose),
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

impl core::ops::Add for ContractionCost {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            volume: self.volume.saturating_add(rhs.volume),
            transpose: self.transpose.saturating_add(rhs.transpose),
            total: self.total.saturating_add(rhs.total),
        }
    }
}

impl core::ops::AddAssign for ContractionCost {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Orders by `total`, then by the components, consistently with `Eq`.
impl Ord for ContractionCost {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        (self.total, self.volume, self.transpose).cmp(&(other.total, other.volume, other.transpose))
    }
}

impl PartialOrd for ContractionCost {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for ContractionCost {}

/// Cost model for a single pairwise contraction.
///
/// The base cost is the volume of the iteration space. A non-zero
/// `transpose_weight` additionally charges `weight × elements` for every
/// tensor of the step whose labels are not in ascending [`LabelId`] order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostModel {
    pub transpose_weight: u64,
}

impl CostModel {
    /// Pure iteration-space volume.
    pub fn volume_only() -> Self {
        Self { transpose_weight: 0 }
    }

    /// Volume plus a layout penalty.
    pub fn layout_aware(transpose_weight: u64) -> Self {
        Self { transpose_weight }
    }

    /// Cost of contracting `lhs` with `rhs` into `out`.
    ///
    /// Each `*_perm` lists the tensor's labels in layout order and each
    /// `*_shape` the matching sizes.
    pub fn step_cost(
        &self,
        lhs_perm: &[LabelId],
        lhs_shape: &[u64],
        rhs_perm: &[LabelId],
        rhs_shape: &[u64],
        out_perm: &[LabelId],
        out_shape: &[u64],
    ) -> ContractionCost {
        let mut extents: HashMap<LabelId, u64> = HashMap::new();
        let tensors = [(lhs_perm, lhs_shape), (rhs_perm, rhs_shape), (out_perm, out_shape)];
        for (perm, shape) in tensors {
            for (&label, &size) in perm.iter().zip(shape) {
                extents.entry(label).or_insert(size);
            }
        }
        let volume = extents
            .values()
            .fold(1u64, |acc, &size| acc.saturating_mul(size));

        let transpose = if self.transpose_weight == 0 {
            0
        } else {
            tensors
                .iter()
                .filter(|(perm, _)| !perm.is_sorted())
                .map(|(_, shape)| {
                    let elements = shape.iter().fold(1u64, |acc, &d| acc.saturating_mul(d));
                    self.transpose_weight.saturating_mul(elements)
                })
                .fold(0u64, u64::saturating_add)
        };

        ContractionCost::new(volume, transpose)
    }
}
