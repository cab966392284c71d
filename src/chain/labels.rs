//! Index-label identities.

use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, ChainResult};
use crate::graph::NodeId;

/// Stable identity of an index label within one chain.
///
/// Ids are dense and assigned in order of first sight, so they double as the
/// canonical label numbering used by the search and the cost model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LabelId(u32);

impl LabelId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for LabelId {
    fn from(index: usize) -> Self {
        Self(index as u32)
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct LabelEntry {
    value: NodeId,
    size: Option<u64>,
}

/// Registry mapping label nodes to [`LabelId`]s with memoized sizes.
#[derive(Debug, Clone, Default)]
pub struct LabelRegistry {
    entries: Vec<LabelEntry>,
    ids: HashMap<NodeId, LabelId>,
}

impl LabelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `value`, assigning the next one on first sight.
    pub fn intern(&mut self, value: NodeId) -> LabelId {
        if let Some(&id) = self.ids.get(&value) {
            return id;
        }
        let id = LabelId::from(self.entries.len());
        self.entries.push(LabelEntry { value, size: None });
        self.ids.insert(value, id);
        id
    }

    /// Interns `value` and records its size.
    ///
    /// The first size sticks; a later, different size is rejected.
    pub fn resolve(&mut self, value: NodeId, size: u64) -> ChainResult<LabelId> {
        let id = self.intern(value);
        let entry = &mut self.entries[id.index()];
        match entry.size {
            None => entry.size = Some(size),
            Some(expected) if expected != size => {
                return Err(ChainError::LabelSizeMismatch {
                    label: value,
                    expected,
                    got: size,
                });
            }
            Some(_) => {}
        }
        Ok(id)
    }

    pub fn id_of(&self, value: NodeId) -> Option<LabelId> {
        self.ids.get(&value).copied()
    }

    pub fn size(&self, id: LabelId) -> Option<u64> {
        self.entries.get(id.index()).and_then(|e| e.size)
    }

    /// Label value node recorded for `id`.
    pub fn value(&self, id: LabelId) -> ChainResult<NodeId> {
        self.entries
            .get(id.index())
            .map(|e| e.value)
            .ok_or(ChainError::MissingLabelValue { label: id })
    }

    /// Sizes of all labels indexed by id, if every size is resolved.
    pub fn sizes(&self) -> Option<Vec<u64>> {
        self.entries.iter().map(|e| e.size).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
