//! Factom SPV verification library
//!
//! This crate provides the building blocks for proving that a factoid transaction is part of
//! the Factom chain: the canonical transaction encoding, Merkle path folding, proof bundles
//! spanning the factoid block and directory block levels, and the trusted anchor state that
//! the top of every proof must land in.

pub mod anchors;
pub mod hash;
pub mod merkle;
pub mod proof;
pub mod transaction;
pub mod verify;

pub use anchors::{AnchorError, AnchorRecord, AnchorState};
pub use hash::{Hash32, NodeHasher, ParseHashError, Sha256Hasher};
pub use merkle::{
    factoid_block_body_leaves, minute_marker, path_from_anchor_branch, AnchorBranchEntry,
    MerklePath, MerkleTree, Position,
};
pub use proof::{HeaderAnchor, ProofBundle, ProofError, ProofParams};
pub use transaction::{FactoidTransaction, TransactionError, TransactionParams};
pub use verify::{check_inclusion, verify_inclusion, InclusionFailure};
