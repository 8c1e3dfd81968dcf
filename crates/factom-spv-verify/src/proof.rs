//! Types representing a three-level inclusion proof (transaction → factoid block →
//! directory block → anchored window root) and their wire form.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::Hash32;
use crate::merkle::MerklePath;

/// Number of header anchors in a bundle: the factoid block and the directory block
pub const HEADER_ANCHOR_COUNT: usize = 2;

/// Structural problems with a proof bundle. These are validation errors, distinct from a
/// well-formed proof that simply fails to verify.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    #[error("{level} path has {nodes} nodes but {positions} position bits")]
    PathLengthMismatch {
        level: &'static str,
        nodes: usize,
        positions: usize,
    },
    #[error("{level} path position bit #{index} is {bit}, expected 0 or 1")]
    InvalidPositionBit {
        level: &'static str,
        index: usize,
        bit: u8,
    },
    #[error("expected {expected} header anchors, got {actual}")]
    HeaderAnchorCount { expected: usize, actual: usize },
    #[error("expected {expected} header hashes and merkle roots, got {actual}")]
    FlatHeaderCount { expected: usize, actual: usize },
    #[error("anchor branch entry #{index} does not contain the running hash")]
    DisconnectedBranch { index: usize },
}

/// Header hash and body Merkle root of one block in the proof chain.
///
/// The block's key Merkle root, the value that appears in the next tree up, is
/// `H(header_hash || merkle_root)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderAnchor {
    pub header_hash: Hash32,
    pub merkle_root: Hash32,
}

/// A proof that a transaction hash is part of the anchored Factom chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBundle {
    /// Height of the directory block that includes the transaction
    pub block_height: u32,
    /// Path from the transaction hash to the factoid block body root
    pub transaction_path: MerklePath,
    /// Path from the factoid block key Merkle root to the directory block body root
    pub block_path: MerklePath,
    /// Path from the directory block key Merkle root to the anchored window root
    pub directory_path: MerklePath,
    /// Factoid block header, then directory block header
    pub header_anchors: Vec<HeaderAnchor>,
    /// Window root the directory path folds to; must be a trusted anchor
    pub anchor_root: Hash32,
}

impl ProofBundle {
    /// Check the structure of every level
    pub fn validate(&self) -> Result<(), ProofError> {
        self.transaction_path.validate("transaction")?;
        self.block_path.validate("factoid block")?;
        self.directory_path.validate("directory block")?;
        if self.header_anchors.len() != HEADER_ANCHOR_COUNT {
            return Err(ProofError::HeaderAnchorCount {
                expected: HEADER_ANCHOR_COUNT,
                actual: self.header_anchors.len(),
            });
        }
        Ok(())
    }

    pub fn factoid_block(&self) -> Option<&HeaderAnchor> {
        self.header_anchors.first()
    }

    pub fn directory_block(&self) -> Option<&HeaderAnchor> {
        self.header_anchors.get(1)
    }
}

/// Proof parameters in the flat form produced by the proof generation tooling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofParams {
    pub tx_block_height: u32,
    pub tx_path: Vec<Hash32>,
    pub tx_path_positions: Vec<u8>,
    pub fblock_path: Vec<Hash32>,
    pub fblock_path_positions: Vec<u8>,
    pub dblock_path: Vec<Hash32>,
    pub dblock_path_positions: Vec<u8>,
    /// `[fblock header hash, fblock body root, dblock header hash, dblock body root, anchor root]`
    pub header_hashes_and_merkle_roots: Vec<Hash32>,
}

impl TryFrom<ProofParams> for ProofBundle {
    type Error = ProofError;

    fn try_from(params: ProofParams) -> Result<Self, Self::Error> {
        let [fb_header, fb_root, db_header, db_root, anchor_root]: [Hash32; 5] = params
            .header_hashes_and_merkle_roots
            .as_slice()
            .try_into()
            .map_err(|_| ProofError::FlatHeaderCount {
                expected: 2 * HEADER_ANCHOR_COUNT + 1,
                actual: params.header_hashes_and_merkle_roots.len(),
            })?;

        let bundle = ProofBundle {
            block_height: params.tx_block_height,
            transaction_path: MerklePath::new(params.tx_path, params.tx_path_positions),
            block_path: MerklePath::new(params.fblock_path, params.fblock_path_positions),
            directory_path: MerklePath::new(params.dblock_path, params.dblock_path_positions),
            header_anchors: vec![
                HeaderAnchor {
                    header_hash: fb_header,
                    merkle_root: fb_root,
                },
                HeaderAnchor {
                    header_hash: db_header,
                    merkle_root: db_root,
                },
            ],
            anchor_root,
        };
        bundle.validate()?;
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ProofParams {
        ProofParams {
            tx_block_height: 10,
            tx_path: vec![Hash32([1; 32])],
            tx_path_positions: vec![1],
            fblock_path: vec![Hash32([2; 32]), Hash32([3; 32])],
            fblock_path_positions: vec![0, 1],
            dblock_path: vec![],
            dblock_path_positions: vec![],
            header_hashes_and_merkle_roots: (0..5u8).map(|i| Hash32([i; 32])).collect(),
        }
    }

    #[test]
    fn test_from_flat_params() {
        let bundle = ProofBundle::try_from(params()).unwrap();
        assert_eq!(bundle.block_height, 10);
        assert_eq!(bundle.factoid_block().unwrap().merkle_root, Hash32([1; 32]));
        assert_eq!(bundle.directory_block().unwrap().header_hash, Hash32([2; 32]));
        assert_eq!(bundle.anchor_root, Hash32([4; 32]));
        assert!(bundle.directory_path.is_empty());
    }

    #[test]
    fn test_rejects_malformed_params() {
        let mut p = params();
        p.header_hashes_and_merkle_roots.pop();
        assert_eq!(
            ProofBundle::try_from(p).unwrap_err(),
            ProofError::FlatHeaderCount {
                expected: 5,
                actual: 4
            }
        );

        let mut p = params();
        p.fblock_path_positions.push(0);
        assert!(matches!(
            ProofBundle::try_from(p),
            Err(ProofError::PathLengthMismatch {
                level: "factoid block",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_header_anchor_count() {
        let mut bundle = ProofBundle::try_from(params()).unwrap();
        bundle.header_anchors.pop();
        assert_eq!(
            bundle.validate().unwrap_err(),
            ProofError::HeaderAnchorCount {
                expected: 2,
                actual: 1
            }
        );
    }
}
