//! Subscript representation for einsum notation.

use core::fmt;

use smallvec::SmallVec;

/// The index labels of a single tensor, in axis order.
///
/// For example, in `ij,jk->ik`, the subscripts are `ij`, `jk`, and `ik`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Subscript {
    labels: SmallVec<[char; 4]>,
}

impl Subscript {
    /// Creates an empty subscript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a subscript from a sequence of label characters.
    pub fn from_chars(chars: impl IntoIterator<Item = char>) -> Self {
        Self {
            labels: chars.into_iter().collect(),
        }
    }

    pub fn push(&mut self, c: char) {
        self.labels.push(c);
    }

    /// Number of axes.
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.labels.iter().copied()
    }

    pub fn contains(&self, c: char) -> bool {
        self.labels.contains(&c)
    }

    /// Axis of the first occurrence of `c`.
    pub fn position(&self, c: char) -> Option<usize> {
        self.labels.iter().position(|&x| x == c)
    }

    pub fn count(&self, c: char) -> usize {
        self.labels.iter().filter(|&&x| x == c).count()
    }
}

impl fmt::Display for Subscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.labels {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Subscript {
    type Item = &'a char;
    type IntoIter = core::slice::Iter<'a, char>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.iter()
    }
}
