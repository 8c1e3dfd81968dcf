//! Fund movements out of escrow and the collaborator that executes them.

use std::sync::Mutex;

use factom_spv_verify::Hash32;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{Address, RequestId};

/// Escrow released to the booker against a verified Factom payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentRecord {
    pub request_id: RequestId,
    /// Wei released
    pub amount: u128,
    pub recipient: Address,
    pub output_commitment: Hash32,
    pub tx_hash: Hash32,
}

/// Escrow returned to the issuer after the deadline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub request_id: RequestId,
    /// Wei returned
    pub amount: u128,
    pub recipient: Address,
}

/// Executes fund movements. Called exactly once per terminal transition, after the
/// transition has been committed.
#[cfg_attr(test, mockall::automock)]
pub trait PayoutSink: Send + Sync {
    fn release(&self, record: &FulfillmentRecord);
    fn refund(&self, record: &RefundRecord);
}

/// Sink that only reports movements in the log
#[derive(Debug, Default)]
pub struct LogPayoutSink;

impl PayoutSink for LogPayoutSink {
    fn release(&self, record: &FulfillmentRecord) {
        info!(
            "Release {} wei to {} for request {} (tx {})",
            record.amount, record.recipient, record.request_id, record.tx_hash
        );
    }

    fn refund(&self, record: &RefundRecord) {
        info!(
            "Refund {} wei to {} for request {}",
            record.amount, record.recipient, record.request_id
        );
    }
}

/// A movement seen by [`RecordingPayoutSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payout {
    Release(FulfillmentRecord),
    Refund(RefundRecord),
}

/// Sink that keeps every movement in memory
#[derive(Debug, Default)]
pub struct RecordingPayoutSink {
    payouts: Mutex<Vec<Payout>>,
}

impl RecordingPayoutSink {
    pub fn payouts(&self) -> Vec<Payout> {
        match self.payouts.lock() {
            Ok(payouts) => payouts.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push(&self, payout: Payout) {
        match self.payouts.lock() {
            Ok(mut payouts) => payouts.push(payout),
            Err(poisoned) => poisoned.into_inner().push(payout),
        }
    }
}

impl PayoutSink for RecordingPayoutSink {
    fn release(&self, record: &FulfillmentRecord) {
        self.push(Payout::Release(record.clone()));
    }

    fn refund(&self, record: &RefundRecord) {
        self.push(Payout::Refund(record.clone()));
    }
}
