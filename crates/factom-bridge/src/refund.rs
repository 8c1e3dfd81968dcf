//! Return of escrow to the issuer once a request can no longer be fulfilled.

use tracing::info;

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::payout::RefundRecord;
use crate::request::RequestStatus;
use crate::store::LedgerUpdate;
use crate::types::{Address, RequestId};

impl Bridge {
    /// Refund an expired request to its issuer. Anyone may trigger it.
    pub async fn refund_request(
        &mut self,
        id: RequestId,
        caller: Address,
    ) -> Result<RefundRecord, BridgeError> {
        let mut request = self.load_request(id).await?;
        if request.status.is_terminal() {
            return Err(BridgeError::WrongStatus {
                id,
                actual: request.status,
                expected: "not fulfilled or refunded",
            });
        }
        if !request.is_expired(self.now()) {
            return Err(BridgeError::RefundNotEligible {
                id,
                deadline: request.deadline,
            });
        }

        request.status = RequestStatus::Refunded;
        let record = RefundRecord {
            request_id: id,
            amount: request.escrowed_value,
            recipient: request.issuer,
        };
        self.store.commit(LedgerUpdate::request(request)).await?;
        self.payouts.refund(&record);

        info!(
            "Request {} refunded to {} (triggered by {})",
            id, record.recipient, caller
        );
        self.emit(BridgeEvent::RequestRefunded(record.clone()));
        Ok(record)
    }
}
