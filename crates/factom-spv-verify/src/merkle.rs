//! Merkle paths and Factom-style Merkle trees.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::hash::{Hash32, NodeHasher};
use crate::proof::ProofError;

/// Which child the running value is at a given tree level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Position bit 0: the running value is the left child, `H(current, sibling)`
    Left,
    /// Position bit 1: the running value is the right child, `H(sibling, current)`
    Right,
}

impl Position {
    pub fn from_bit(bit: u8) -> Option<Self> {
        match bit {
            0 => Some(Self::Left),
            1 => Some(Self::Right),
            _ => None,
        }
    }

    pub fn bit(self) -> u8 {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}

/// Authentication path from a leaf to a tree root.
///
/// Nodes and position bits are kept as two parallel sequences, which is how they are supplied
/// by callers; [`MerklePath::validate`] checks that they line up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePath {
    /// Sibling hashes, leaf level first
    pub nodes: Vec<Hash32>,
    /// Position bits, one per sibling
    pub positions: Vec<u8>,
}

impl MerklePath {
    pub fn new(nodes: Vec<Hash32>, positions: Vec<u8>) -> Self {
        Self { nodes, positions }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check that every node has exactly one position bit and that every bit is 0 or 1
    pub fn validate(&self, level: &'static str) -> Result<(), ProofError> {
        if self.nodes.len() != self.positions.len() {
            return Err(ProofError::PathLengthMismatch {
                level,
                nodes: self.nodes.len(),
                positions: self.positions.len(),
            });
        }
        if let Some(index) = self.positions.iter().position(|bit| *bit > 1) {
            return Err(ProofError::InvalidPositionBit {
                level,
                index,
                bit: self.positions[index],
            });
        }
        Ok(())
    }

    /// Fold `leaf` up through the path and return the resulting root.
    ///
    /// Returns `None` if the path is malformed.
    pub fn fold(&self, leaf: Hash32, hasher: &dyn NodeHasher) -> Option<Hash32> {
        if self.nodes.len() != self.positions.len() {
            return None;
        }
        let mut current = leaf;
        for (sibling, bit) in self.nodes.iter().zip(&self.positions) {
            current = match Position::from_bit(*bit)? {
                Position::Left => hasher.combine(&current, sibling),
                Position::Right => hasher.combine(sibling, &current),
            };
            trace!("fold step: {}", current);
        }
        Some(current)
    }
}

/// Merkle tree over a list of leaves, built the Factom way: a level with an odd number of
/// nodes pairs its last node with itself.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// All levels, leaves first and the single root last
    levels: Vec<Vec<Hash32>>,
}

impl MerkleTree {
    /// Build the tree. Returns `None` for an empty leaf set.
    pub fn new(leaves: Vec<Hash32>, hasher: &dyn NodeHasher) -> Option<Self> {
        if leaves.is_empty() {
            return None;
        }
        let mut levels = vec![leaves];
        let mut current = &levels[0];
        while current.len() > 1 {
            let next: Vec<Hash32> = current
                .chunks(2)
                .map(|chunk| match chunk {
                    [left, right] => hasher.combine(left, right),
                    [left] => hasher.combine(left, left),
                    _ => unreachable!("Chunk size is at most 2"),
                })
                .collect();
            levels.push(next);
            current = &levels[levels.len() - 1];
        }
        Some(Self { levels })
    }

    pub fn root(&self) -> Hash32 {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or_default()
    }

    pub fn leaves(&self) -> &[Hash32] {
        &self.levels[0]
    }

    /// Generate the authentication path for the leaf at `index`
    pub fn generate_path(&self, index: usize) -> Option<MerklePath> {
        if index >= self.leaves().len() {
            return None;
        }

        let mut path = MerklePath::default();
        let mut current_index = index;

        // Every level but the root contributes one sibling
        for level in &self.levels[..self.levels.len() - 1] {
            let is_right_child = current_index % 2 != 0;
            let sibling_index = if is_right_child {
                current_index - 1
            } else {
                // Odd level length: the last node is paired with itself
                (current_index + 1).min(level.len() - 1)
            };
            path.nodes.push(level[sibling_index]);
            path.positions.push(if is_right_child { 1 } else { 0 });
            current_index /= 2;
        }

        Some(path)
    }

    /// Index of the first leaf equal to `leaf`
    pub fn position_of(&self, leaf: &Hash32) -> Option<usize> {
        self.leaves().iter().position(|candidate| candidate == leaf)
    }

    /// Authentication path for the first occurrence of `leaf`
    pub fn path_to(&self, leaf: &Hash32) -> Option<MerklePath> {
        self.generate_path(self.position_of(leaf)?)
    }
}

/// Leaf closing every minute of a factoid block body: the digest of the single byte `0x00`
pub fn minute_marker(hasher: &dyn NodeHasher) -> Hash32 {
    hasher.digest(&[0u8])
}

/// Leaves of a factoid block body.
///
/// `minutes` holds the transaction ids of each minute in block order. Every minute, empty
/// ones included, is followed by a [`minute_marker`].
pub fn factoid_block_body_leaves<M: AsRef<[Hash32]>>(
    minutes: &[M],
    hasher: &dyn NodeHasher,
) -> Vec<Hash32> {
    let marker = minute_marker(hasher);
    let mut leaves = Vec::new();
    for transactions in minutes {
        leaves.extend_from_slice(transactions.as_ref());
        leaves.push(marker);
    }
    leaves
}

/// One step of an anchor Merkle branch as published alongside an anchoring transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorBranchEntry {
    pub left: Hash32,
    pub right: Hash32,
    pub top: Hash32,
}

/// Convert an anchor Merkle branch into a [`MerklePath`] starting at `start`, normally the
/// directory block key Merkle root.
///
/// Each entry must contain the running value as one of its children; the other child becomes
/// the sibling and the entry's `top` the next running value.
pub fn path_from_anchor_branch(
    start: Hash32,
    branch: &[AnchorBranchEntry],
) -> Result<MerklePath, ProofError> {
    let mut path = MerklePath::default();
    let mut current = start;
    for (index, entry) in branch.iter().enumerate() {
        let (sibling, position) = if entry.left == current {
            (entry.right, Position::Left)
        } else if entry.right == current {
            (entry.left, Position::Right)
        } else {
            return Err(ProofError::DisconnectedBranch { index });
        };
        path.nodes.push(sibling);
        path.positions.push(position.bit());
        current = entry.top;
    }
    Ok(path)
}
