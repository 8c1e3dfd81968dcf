//! Request issuance and lookup.

use factom_spv_verify::Hash32;
use tracing::info;

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::request::{Request, RequestStatus};
use crate::store::LedgerUpdate;
use crate::types::{Address, RequestId, Timestamp};

impl Bridge {
    /// Escrow `escrowed_value` wei against a payment of `requested_amount` factoshis to
    /// `output_commitment` before `deadline`.
    pub async fn issue_request(
        &mut self,
        issuer: Address,
        output_commitment: Hash32,
        requested_amount: u64,
        deadline: Timestamp,
        escrowed_value: u128,
    ) -> Result<RequestId, BridgeError> {
        if requested_amount == 0 {
            return Err(BridgeError::InvalidAmount);
        }
        let now = self.now();
        if deadline <= now {
            return Err(BridgeError::DeadlineInPast { deadline, now });
        }
        if escrowed_value == 0 || !self.config.pricing.covers(escrowed_value, requested_amount) {
            return Err(BridgeError::InsufficientEscrow {
                escrowed: escrowed_value,
                requested: requested_amount,
            });
        }

        let id = self.store.next_request_id().await?;
        let request = Request {
            id,
            issuer,
            output_commitment,
            requested_amount,
            deadline,
            escrowed_value,
            issued_at: now,
            status: RequestStatus::Issued,
        };
        self.store.commit(LedgerUpdate::request(request)).await?;

        info!(
            "Request {} issued by {}: {} factoshis to {}, deadline {}",
            id, issuer, requested_amount, output_commitment, deadline
        );
        self.emit(BridgeEvent::RequestIssued {
            id,
            issuer,
            requested_amount,
            deadline,
        });
        Ok(id)
    }

    pub async fn get_request(&self, id: RequestId) -> Result<Request, BridgeError> {
        self.load_request(id).await
    }
}
