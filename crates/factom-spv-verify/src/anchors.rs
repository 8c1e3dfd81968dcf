//! Trusted anchor state published by the anchor oracle.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::Hash32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnchorError {
    #[error("anchor height {height} is not above the last anchored height {last}")]
    NonIncreasingHeight { last: u32, height: u32 },
}

/// Window root anchored by the oracle, covering directory blocks up to `height`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub height: u32,
    pub merkle_root: Hash32,
}

/// Append-only sequence of trusted anchor records, ordered by height
#[derive(Debug, Clone, Default)]
pub struct AnchorState {
    records: Vec<AnchorRecord>,
    /// merkle root -> highest anchored height carrying it
    index: HashMap<Hash32, u32>,
}

impl AnchorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the state from records in height order, as persisted by the ledger store
    pub fn from_records(
        records: impl IntoIterator<Item = AnchorRecord>,
    ) -> Result<Self, AnchorError> {
        let mut state = Self::new();
        for record in records {
            state.append(record)?;
        }
        Ok(state)
    }

    /// Check that `record` may be appended without modifying the state
    pub fn check_append(&self, record: &AnchorRecord) -> Result<(), AnchorError> {
        match self.records.last() {
            Some(last) if record.height <= last.height => Err(AnchorError::NonIncreasingHeight {
                last: last.height,
                height: record.height,
            }),
            _ => Ok(()),
        }
    }

    /// Append a record. Heights must be strictly increasing.
    pub fn append(&mut self, record: AnchorRecord) -> Result<(), AnchorError> {
        self.check_append(&record)?;
        self.index.insert(record.merkle_root, record.height);
        self.records.push(record);
        Ok(())
    }

    /// Height of the highest record anchoring `root`
    pub fn anchored_height(&self, root: &Hash32) -> Option<u32> {
        self.index.get(root).copied()
    }

    /// Whether `root` is trusted for a directory block at `block_height`
    pub fn is_anchored(&self, root: &Hash32, block_height: u32) -> bool {
        self.anchored_height(root)
            .map_or(false, |height| height >= block_height)
    }

    pub fn latest(&self) -> Option<&AnchorRecord> {
        self.records.last()
    }

    pub fn records(&self) -> &[AnchorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(height: u32, byte: u8) -> AnchorRecord {
        AnchorRecord {
            height,
            merkle_root: Hash32([byte; 32]),
        }
    }

    #[test]
    fn test_append_only_increasing() {
        let mut state = AnchorState::new();
        state.append(record(1000, 1)).unwrap();
        state.append(record(2000, 2)).unwrap();
        assert_eq!(
            state.append(record(2000, 3)).unwrap_err(),
            AnchorError::NonIncreasingHeight {
                last: 2000,
                height: 2000
            }
        );
        assert_eq!(state.len(), 2);
        assert_eq!(state.latest(), Some(&record(2000, 2)));
    }

    #[test]
    fn test_is_anchored_respects_height() {
        let state = AnchorState::from_records(vec![record(1000, 1), record(2000, 2)]).unwrap();
        assert!(state.is_anchored(&Hash32([1; 32]), 999));
        assert!(state.is_anchored(&Hash32([1; 32]), 1000));
        assert!(!state.is_anchored(&Hash32([1; 32]), 1001));
        assert!(state.is_anchored(&Hash32([2; 32]), 1500));
        assert!(!state.is_anchored(&Hash32([3; 32]), 0));
    }
}
