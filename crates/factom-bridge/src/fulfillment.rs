//! Release of escrow against a verified inclusion proof.

use factom_spv_verify::{check_inclusion, ProofBundle};
use tracing::{info, warn};

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::payout::FulfillmentRecord;
use crate::request::RequestStatus;
use crate::store::{LedgerUpdate, StoreError};
use crate::types::RequestId;

impl Bridge {
    /// Prove that the submitted transaction is part of the anchored Factom chain and release
    /// the escrow to the booker.
    ///
    /// A proof that fails to verify leaves the request untouched and may be retried with a
    /// corrected bundle until the deadline.
    pub async fn fulfill_request(
        &mut self,
        id: RequestId,
        bundle: &ProofBundle,
    ) -> Result<FulfillmentRecord, BridgeError> {
        let mut request = self.load_request(id).await?;
        match request.status {
            RequestStatus::ParamsSubmitted => {}
            RequestStatus::Fulfilled => return Err(BridgeError::AlreadyFulfilled(id)),
            actual => {
                return Err(BridgeError::WrongStatus {
                    id,
                    actual,
                    expected: "params_submitted",
                })
            }
        }
        if request.is_expired(self.now()) {
            return Err(BridgeError::DeadlineExpired {
                id,
                deadline: request.deadline,
            });
        }
        bundle.validate()?;

        let booking = self.load_booking(id).await?;
        let tx_hash = booking.submitted_tx_hash.ok_or_else(|| {
            StoreError::Corrupted(format!("request {id} has no submitted transaction"))
        })?;
        if let Some(claimed_by) = self.store.claimed_by(&tx_hash).await? {
            return Err(BridgeError::TransactionAlreadyClaimed {
                tx_hash,
                claimed_by,
            });
        }

        if let Err(reason) = check_inclusion(&tx_hash, bundle, &self.anchors, self.hasher.as_ref())
        {
            warn!("Rejected proof for request {}: {}", id, reason);
            return Err(BridgeError::ProofVerificationFailed { id, reason });
        }

        request.status = RequestStatus::Fulfilled;
        let record = FulfillmentRecord {
            request_id: id,
            amount: request.escrowed_value,
            recipient: booking.booker,
            output_commitment: request.output_commitment,
            tx_hash,
        };
        self.store
            .commit(LedgerUpdate::request(request).with_claimed_tx(tx_hash))
            .await?;
        self.payouts.release(&record);

        info!(
            "Request {} fulfilled by {} at height {}",
            id, tx_hash, bundle.block_height
        );
        self.emit(BridgeEvent::RequestFulfilled(record.clone()));
        Ok(record)
    }
}
