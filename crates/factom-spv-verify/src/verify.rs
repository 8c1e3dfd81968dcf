//! Verification of transaction inclusion proofs against the trusted anchor state.
//!
//! The proof is checked level by level: the transaction hash folds to the factoid block body
//! root, the factoid block key Merkle root folds to the directory block body root, and the
//! directory block key Merkle root folds to a window root that the anchor oracle has
//! published. Any break in the chain rejects the proof.

use thiserror::Error;
use tracing::debug;

use crate::anchors::AnchorState;
use crate::hash::{Hash32, NodeHasher};
use crate::proof::ProofBundle;

/// Step at which a proof failed to verify
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InclusionFailure {
    #[error("malformed proof bundle")]
    Malformed,
    #[error("transaction path folds to {computed}, factoid block body root is {expected}")]
    TransactionRootMismatch { computed: Hash32, expected: Hash32 },
    #[error("factoid block path folds to {computed}, directory block body root is {expected}")]
    BlockRootMismatch { computed: Hash32, expected: Hash32 },
    #[error("directory block path folds to {computed}, anchor root is {expected}")]
    AnchorRootMismatch { computed: Hash32, expected: Hash32 },
    #[error("root {root} is not anchored at or above height {block_height}")]
    Unanchored { root: Hash32, block_height: u32 },
}

/// Verify that `leaf_hash` is included in the anchored chain.
///
/// Pure and deterministic: returns `false` on any mismatch and never panics on malformed input.
pub fn verify_inclusion(
    leaf_hash: &Hash32,
    bundle: &ProofBundle,
    anchors: &AnchorState,
    hasher: &dyn NodeHasher,
) -> bool {
    check_inclusion(leaf_hash, bundle, anchors, hasher).is_ok()
}

/// Like [`verify_inclusion`], but reports the failing step.
///
/// Returns the anchored root on success.
pub fn check_inclusion(
    leaf_hash: &Hash32,
    bundle: &ProofBundle,
    anchors: &AnchorState,
    hasher: &dyn NodeHasher,
) -> Result<Hash32, InclusionFailure> {
    if bundle.validate().is_err() {
        return Err(InclusionFailure::Malformed);
    }
    let (factoid_block, directory_block) =
        match (bundle.factoid_block(), bundle.directory_block()) {
            (Some(fb), Some(db)) => (fb, db),
            _ => return Err(InclusionFailure::Malformed),
        };

    // Transaction -> factoid block body
    let body_root = bundle
        .transaction_path
        .fold(*leaf_hash, hasher)
        .ok_or(InclusionFailure::Malformed)?;
    if body_root != factoid_block.merkle_root {
        return Err(InclusionFailure::TransactionRootMismatch {
            computed: body_root,
            expected: factoid_block.merkle_root,
        });
    }
    let factoid_key_mr = hasher.combine(&factoid_block.header_hash, &body_root);
    debug!("Factoid block key merkle root: {}", factoid_key_mr);

    // Factoid block -> directory block body
    let body_root = bundle
        .block_path
        .fold(factoid_key_mr, hasher)
        .ok_or(InclusionFailure::Malformed)?;
    if body_root != directory_block.merkle_root {
        return Err(InclusionFailure::BlockRootMismatch {
            computed: body_root,
            expected: directory_block.merkle_root,
        });
    }
    let directory_key_mr = hasher.combine(&directory_block.header_hash, &body_root);
    debug!("Directory block key merkle root: {}", directory_key_mr);

    // Directory block -> anchored window root
    let root = bundle
        .directory_path
        .fold(directory_key_mr, hasher)
        .ok_or(InclusionFailure::Malformed)?;
    if root != bundle.anchor_root {
        return Err(InclusionFailure::AnchorRootMismatch {
            computed: root,
            expected: bundle.anchor_root,
        });
    }
    if !anchors.is_anchored(&root, bundle.block_height) {
        return Err(InclusionFailure::Unanchored {
            root,
            block_height: bundle.block_height,
        });
    }

    Ok(root)
}
