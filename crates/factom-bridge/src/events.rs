//! Notifications emitted on every ledger transition.

use factom_spv_verify::{AnchorRecord, Hash32};
use serde::{Deserialize, Serialize};

use crate::payout::{FulfillmentRecord, RefundRecord};
use crate::types::{Address, RequestId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeEvent {
    RequestIssued {
        id: RequestId,
        issuer: Address,
        requested_amount: u64,
        deadline: Timestamp,
    },
    RequestBooked {
        id: RequestId,
        booker: Address,
    },
    TransactionParamsSubmitted {
        id: RequestId,
        tx_hash: Hash32,
    },
    RequestFulfilled(FulfillmentRecord),
    RequestRefunded(RefundRecord),
    AnchorRecorded(AnchorRecord),
}

impl BridgeEvent {
    /// Request the event refers to, if any
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            BridgeEvent::RequestIssued { id, .. }
            | BridgeEvent::RequestBooked { id, .. }
            | BridgeEvent::TransactionParamsSubmitted { id, .. } => Some(*id),
            BridgeEvent::RequestFulfilled(record) => Some(record.request_id),
            BridgeEvent::RequestRefunded(record) => Some(record.request_id),
            BridgeEvent::AnchorRecorded(_) => None,
        }
    }
}
