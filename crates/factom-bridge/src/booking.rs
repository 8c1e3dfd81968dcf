//! Booking of issued requests and submission of the paying Factom transaction.

use factom_spv_verify::{FactoidTransaction, Hash32, TransactionParams};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::request::RequestStatus;
use crate::store::LedgerUpdate;
use crate::types::{Address, RequestId, Timestamp};

/// Exclusive claim of a request by the party that will pay on Factom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub request_id: RequestId,
    pub booker: Address,
    pub booking_timestamp: Timestamp,
    /// Canonical hash of the submitted transaction, set once
    pub submitted_tx_hash: Option<Hash32>,
}

impl Bridge {
    /// Book an issued request for `caller`. The first booking wins.
    pub async fn book_request(
        &mut self,
        id: RequestId,
        caller: Address,
    ) -> Result<Booking, BridgeError> {
        let mut request = self.load_request(id).await?;
        match request.status {
            RequestStatus::Issued => {}
            RequestStatus::Booked | RequestStatus::ParamsSubmitted => {
                return Err(BridgeError::AlreadyBooked(id))
            }
            RequestStatus::Fulfilled | RequestStatus::Refunded => {
                return Err(BridgeError::WrongStatus {
                    id,
                    actual: request.status,
                    expected: "issued",
                })
            }
        }
        let now = self.now();
        if request.is_expired(now) {
            return Err(BridgeError::DeadlineExpired {
                id,
                deadline: request.deadline,
            });
        }

        request.status = RequestStatus::Booked;
        let booking = Booking {
            request_id: id,
            booker: caller,
            booking_timestamp: now,
            submitted_tx_hash: None,
        };
        self.store
            .commit(LedgerUpdate::request(request).with_booking(booking.clone()))
            .await?;

        info!("Request {} booked by {}", id, caller);
        self.emit(BridgeEvent::RequestBooked { id, booker: caller });
        Ok(booking)
    }

    /// Record the Factom transaction the booker paid with and return its canonical hash,
    /// the leaf the fulfillment proof must start from.
    pub async fn submit_booked_request_transaction_params(
        &mut self,
        id: RequestId,
        caller: Address,
        params: &TransactionParams,
    ) -> Result<Hash32, BridgeError> {
        let mut request = self.load_request(id).await?;
        if request.status != RequestStatus::Booked {
            return Err(BridgeError::WrongStatus {
                id,
                actual: request.status,
                expected: "booked",
            });
        }
        let mut booking = self.load_booking(id).await?;
        if booking.booker != caller {
            return Err(BridgeError::NotBooker { id, caller });
        }
        if request.is_expired(self.now()) {
            return Err(BridgeError::DeadlineExpired {
                id,
                deadline: request.deadline,
            });
        }

        let transaction = FactoidTransaction::try_from(params)?;
        transaction.check_rcds(self.hasher.as_ref())?;
        let paid = transaction.amount_paid_to(&request.output_commitment);
        if paid < request.requested_amount {
            return Err(BridgeError::OutputMismatch {
                paid,
                requested: request.requested_amount,
            });
        }
        let tx_hash = transaction.hash(self.hasher.as_ref());
        if let Some(claimed_by) = self.store.claimed_by(&tx_hash).await? {
            return Err(BridgeError::TransactionAlreadyClaimed {
                tx_hash,
                claimed_by,
            });
        }

        request.status = RequestStatus::ParamsSubmitted;
        booking.submitted_tx_hash = Some(tx_hash);
        self.store
            .commit(LedgerUpdate::request(request).with_booking(booking))
            .await?;

        info!("Request {} transaction submitted: {}", id, tx_hash);
        self.emit(BridgeEvent::TransactionParamsSubmitted { id, tx_hash });
        Ok(tx_hash)
    }

    pub async fn get_booking(&self, id: RequestId) -> Result<Booking, BridgeError> {
        self.load_request(id).await?;
        self.store
            .get_booking(id)
            .await?
            .ok_or(BridgeError::NotFound(id))
    }
}
