//! Error types

use factom_spv_verify::{AnchorError, Hash32, InclusionFailure, ProofError, TransactionError};
use thiserror::Error;

use crate::request::RequestStatus;
use crate::store::StoreError;
use crate::types::{Address, RequestId, Timestamp};

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Requested amount must be positive")]
    InvalidAmount,

    #[error("Escrowed value {escrowed} does not cover {requested} factoshis")]
    InsufficientEscrow { escrowed: u128, requested: u64 },

    #[error("Deadline {deadline} is not after the current time {now}")]
    DeadlineInPast { deadline: Timestamp, now: Timestamp },

    #[error("Request {id} expired at {deadline}")]
    DeadlineExpired { id: RequestId, deadline: Timestamp },

    #[error("Request {id} is {actual:?}, expected {expected}")]
    WrongStatus {
        id: RequestId,
        actual: RequestStatus,
        expected: &'static str,
    },

    #[error("Caller {caller} is not the booker of request {id}")]
    NotBooker { id: RequestId, caller: Address },

    #[error("Request {0} is already booked")]
    AlreadyBooked(RequestId),

    #[error("Malformed transaction params: {0}")]
    MalformedParams(#[from] TransactionError),

    #[error("Transaction pays {paid} factoshis to the output commitment, {requested} requested")]
    OutputMismatch { paid: u64, requested: u64 },

    #[error("Malformed proof: {0}")]
    MalformedProof(#[from] ProofError),

    #[error("Proof verification failed for request {id}: {reason}")]
    ProofVerificationFailed { id: RequestId, reason: InclusionFailure },

    #[error("Transaction {tx_hash} already fulfilled request {claimed_by}")]
    TransactionAlreadyClaimed {
        tx_hash: Hash32,
        claimed_by: RequestId,
    },

    #[error("Request {0} is already fulfilled")]
    AlreadyFulfilled(RequestId),

    #[error("Request {0} not found")]
    NotFound(RequestId),

    #[error("Request {id} cannot be refunded before its deadline {deadline}")]
    RefundNotEligible { id: RequestId, deadline: Timestamp },

    #[error("Anchor error: {0}")]
    Anchor(#[from] AnchorError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Bridge server is unavailable")]
    ServerUnavailable,
}

impl BridgeError {
    /// Whether the same call may succeed later without any change to the request.
    /// Only a failed proof is retriable: a corrected proof can be submitted until the deadline.
    pub fn is_retriable(&self) -> bool {
        matches!(self, BridgeError::ProofVerificationFailed { .. })
    }
}
