//! Bridge requests and their lifecycle states.

use factom_spv_verify::Hash32;
use serde::{Deserialize, Serialize};

use crate::types::{Address, RequestId, Timestamp};

/// Lifecycle of a request.
///
/// `Issued -> Booked -> ParamsSubmitted -> Fulfilled`, with `Refunded` reachable from every
/// non-terminal state once the deadline has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Issued,
    Booked,
    ParamsSubmitted,
    Fulfilled,
    Refunded,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Fulfilled | RequestStatus::Refunded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Issued => "issued",
            RequestStatus::Booked => "booked",
            RequestStatus::ParamsSubmitted => "params_submitted",
            RequestStatus::Fulfilled => "fulfilled",
            RequestStatus::Refunded => "refunded",
        }
    }
}

/// Escrowed offer to buy `requested_amount` factoshis paid to `output_commitment`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    /// Account that escrowed the funds and receives a refund
    pub issuer: Address,
    /// RCD hash of the Factom address that must receive the payment
    pub output_commitment: Hash32,
    /// Factoshis the fulfilling transaction must pay to `output_commitment`
    pub requested_amount: u64,
    pub deadline: Timestamp,
    /// Wei held in escrow for this request
    pub escrowed_value: u128,
    pub issued_at: Timestamp,
    pub status: RequestStatus,
}

impl Request {
    /// Whether the deadline has passed at `now`. The deadline itself is still in time.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.deadline
    }
}
