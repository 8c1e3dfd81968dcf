//! Bridge server and client: the server task owns the ledger and applies requests one at a
//! time, in the order they arrive on the API channel.

use factom_spv_verify::{AnchorRecord, Hash32, ProofBundle, TransactionParams};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{error, info, warn};

use crate::booking::Booking;
use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::payout::{FulfillmentRecord, RefundRecord};
use crate::request::Request;
use crate::types::{Address, RequestId, Timestamp};

/// Request sent to the bridge server via the API channel
pub struct ApiRequest {
    /// The body of the API request containing the specific operation
    pub body: ApiRequestBody,
    /// Channel to send the response back to the caller
    pub tx_response: oneshot::Sender<ApiResponse>,
}

pub type ApiResponse = Result<ApiResponseBody, BridgeError>;

/// Operations the bridge server applies
pub enum ApiRequestBody {
    IssueRequest {
        issuer: Address,
        output_commitment: Hash32,
        requested_amount: u64,
        deadline: Timestamp,
        escrowed_value: u128,
    },
    BookRequest(RequestId, Address),
    SubmitTransactionParams(RequestId, Address, Box<TransactionParams>),
    FulfillRequest(RequestId, Box<ProofBundle>),
    RefundRequest(RequestId, Address),
    GetRequest(RequestId),
    GetBooking(RequestId),
    RecordAnchor(AnchorRecord),
    GetAnchors(),
    Subscribe(),
}

/// Response body for API requests containing the result data
pub enum ApiResponseBody {
    IssueRequest(RequestId),
    BookRequest(Booking),
    SubmitTransactionParams(Hash32),
    FulfillRequest(FulfillmentRecord),
    RefundRequest(RefundRecord),
    GetRequest(Request),
    GetBooking(Booking),
    RecordAnchor(),
    GetAnchors(Vec<AnchorRecord>),
    Subscribe(broadcast::Receiver<BridgeEvent>),
}

/// The bridge server: sole writer of the ledger
pub struct BridgeServer {
    bridge: Bridge,
    rx_requests: mpsc::Receiver<ApiRequest>,
    rx_shutdown: broadcast::Receiver<()>,
}

/// Client for communicating with the bridge server via async channels
#[derive(Clone)]
pub struct BridgeClient {
    tx_requests: mpsc::Sender<ApiRequest>,
}

impl BridgeServer {
    pub fn new(
        bridge: Bridge,
        rx_requests: mpsc::Receiver<ApiRequest>,
        rx_shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            bridge,
            rx_requests,
            rx_shutdown,
        }
    }

    async fn handle(&mut self, body: ApiRequestBody) -> ApiResponse {
        let bridge = &mut self.bridge;
        match body {
            ApiRequestBody::IssueRequest {
                issuer,
                output_commitment,
                requested_amount,
                deadline,
                escrowed_value,
            } => bridge
                .issue_request(
                    issuer,
                    output_commitment,
                    requested_amount,
                    deadline,
                    escrowed_value,
                )
                .await
                .map(ApiResponseBody::IssueRequest),
            ApiRequestBody::BookRequest(id, caller) => bridge
                .book_request(id, caller)
                .await
                .map(ApiResponseBody::BookRequest),
            ApiRequestBody::SubmitTransactionParams(id, caller, params) => bridge
                .submit_booked_request_transaction_params(id, caller, &params)
                .await
                .map(ApiResponseBody::SubmitTransactionParams),
            ApiRequestBody::FulfillRequest(id, bundle) => bridge
                .fulfill_request(id, &bundle)
                .await
                .map(ApiResponseBody::FulfillRequest),
            ApiRequestBody::RefundRequest(id, caller) => bridge
                .refund_request(id, caller)
                .await
                .map(ApiResponseBody::RefundRequest),
            ApiRequestBody::GetRequest(id) => {
                bridge.get_request(id).await.map(ApiResponseBody::GetRequest)
            }
            ApiRequestBody::GetBooking(id) => {
                bridge.get_booking(id).await.map(ApiResponseBody::GetBooking)
            }
            ApiRequestBody::RecordAnchor(record) => bridge
                .record_anchor(record)
                .await
                .map(|_| ApiResponseBody::RecordAnchor()),
            ApiRequestBody::GetAnchors() => Ok(ApiResponseBody::GetAnchors(
                bridge.anchors().records().to_vec(),
            )),
            ApiRequestBody::Subscribe() => Ok(ApiResponseBody::Subscribe(bridge.subscribe())),
        }
    }

    async fn run_inner(&mut self) -> Result<(), anyhow::Error> {
        info!("Bridge server started");

        loop {
            tokio::select! {
                Some(req) = self.rx_requests.recv() => {
                    let res = self.handle(req.body).await;
                    if req.tx_response.send(res).is_err() {
                        // The operation has been applied; only the reply is lost
                        warn!("Caller dropped before receiving the response");
                    }
                },
                _ = self.rx_shutdown.recv() => {
                    return Ok(())
                }
            }
        }
    }

    pub async fn run(&mut self) -> Result<(), ()> {
        match self.run_inner().await {
            Err(err) => {
                error!("Bridge server exited: {}", err);
                Err(())
            }
            Ok(()) => {
                info!("Bridge server terminated");
                Ok(())
            }
        }
    }
}

impl BridgeClient {
    pub fn new(tx_requests: mpsc::Sender<ApiRequest>) -> Self {
        Self { tx_requests }
    }

    /// Helper method to send a request and handle the response
    async fn send_request<T>(
        &self,
        body: ApiRequestBody,
        extract_response: impl FnOnce(ApiResponseBody) -> Option<T>,
    ) -> Result<T, BridgeError> {
        let (tx_response, rx_response) = oneshot::channel();
        self.tx_requests
            .send(ApiRequest { body, tx_response })
            .await
            .map_err(|_| BridgeError::ServerUnavailable)?;

        let response_body = rx_response
            .await
            .map_err(|_| BridgeError::ServerUnavailable)??;

        extract_response(response_body).ok_or(BridgeError::ServerUnavailable)
    }

    pub async fn issue_request(
        &self,
        issuer: Address,
        output_commitment: Hash32,
        requested_amount: u64,
        deadline: Timestamp,
        escrowed_value: u128,
    ) -> Result<RequestId, BridgeError> {
        self.send_request(
            ApiRequestBody::IssueRequest {
                issuer,
                output_commitment,
                requested_amount,
                deadline,
                escrowed_value,
            },
            |response| match response {
                ApiResponseBody::IssueRequest(id) => Some(id),
                _ => None,
            },
        )
        .await
    }

    pub async fn book_request(
        &self,
        id: RequestId,
        caller: Address,
    ) -> Result<Booking, BridgeError> {
        self.send_request(
            ApiRequestBody::BookRequest(id, caller),
            |response| match response {
                ApiResponseBody::BookRequest(booking) => Some(booking),
                _ => None,
            },
        )
        .await
    }

    pub async fn submit_booked_request_transaction_params(
        &self,
        id: RequestId,
        caller: Address,
        params: TransactionParams,
    ) -> Result<Hash32, BridgeError> {
        self.send_request(
            ApiRequestBody::SubmitTransactionParams(id, caller, Box::new(params)),
            |response| match response {
                ApiResponseBody::SubmitTransactionParams(tx_hash) => Some(tx_hash),
                _ => None,
            },
        )
        .await
    }

    pub async fn fulfill_request(
        &self,
        id: RequestId,
        bundle: ProofBundle,
    ) -> Result<FulfillmentRecord, BridgeError> {
        self.send_request(
            ApiRequestBody::FulfillRequest(id, Box::new(bundle)),
            |response| match response {
                ApiResponseBody::FulfillRequest(record) => Some(record),
                _ => None,
            },
        )
        .await
    }

    pub async fn refund_request(
        &self,
        id: RequestId,
        caller: Address,
    ) -> Result<RefundRecord, BridgeError> {
        self.send_request(
            ApiRequestBody::RefundRequest(id, caller),
            |response| match response {
                ApiResponseBody::RefundRequest(record) => Some(record),
                _ => None,
            },
        )
        .await
    }

    pub async fn get_request(&self, id: RequestId) -> Result<Request, BridgeError> {
        self.send_request(ApiRequestBody::GetRequest(id), |response| match response {
            ApiResponseBody::GetRequest(request) => Some(request),
            _ => None,
        })
        .await
    }

    pub async fn get_booking(&self, id: RequestId) -> Result<Booking, BridgeError> {
        self.send_request(ApiRequestBody::GetBooking(id), |response| match response {
            ApiResponseBody::GetBooking(booking) => Some(booking),
            _ => None,
        })
        .await
    }

    /// Booking of a request, `None` if it was never booked or does not exist
    pub async fn find_booking(&self, id: RequestId) -> Result<Option<Booking>, BridgeError> {
        match self.get_booking(id).await {
            Ok(booking) => Ok(Some(booking)),
            Err(BridgeError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn record_anchor(&self, record: AnchorRecord) -> Result<(), BridgeError> {
        self.send_request(
            ApiRequestBody::RecordAnchor(record),
            |response| match response {
                ApiResponseBody::RecordAnchor() => Some(()),
                _ => None,
            },
        )
        .await
    }

    pub async fn get_anchors(&self) -> Result<Vec<AnchorRecord>, BridgeError> {
        self.send_request(ApiRequestBody::GetAnchors(), |response| match response {
            ApiResponseBody::GetAnchors(records) => Some(records),
            _ => None,
        })
        .await
    }

    pub async fn subscribe(&self) -> Result<broadcast::Receiver<BridgeEvent>, BridgeError> {
        self.send_request(ApiRequestBody::Subscribe(), |response| match response {
            ApiResponseBody::Subscribe(rx_events) => Some(rx_events),
            _ => None,
        })
        .await
    }
}

/// Create bridge server and client
pub fn create_app(
    bridge: Bridge,
    rx_shutdown: broadcast::Receiver<()>,
) -> (BridgeServer, BridgeClient) {
    let (tx_requests, rx_requests) = mpsc::channel(bridge.config().api_requests_capacity.max(1));
    let server = BridgeServer::new(bridge, rx_requests, rx_shutdown);
    let client = BridgeClient::new(tx_requests);
    (server, client)
}

#[cfg(test)]
mod tests {
    use crate::request::RequestStatus;
    use crate::testing::{
        bridge_at, output_commitment, vector_anchor, vector_proof, vector_tx_params, BOOKER,
        DEADLINE, ISSUER, OTHER, REQUESTED_AMOUNT,
    };

    use super::*;

    #[tokio::test]
    async fn test_concurrent_bookings_first_wins() {
        let (bridge, _) = bridge_at(1_000).await;
        let (tx_shutdown, rx_shutdown) = broadcast::channel(1);
        let (mut server, client) = create_app(bridge, rx_shutdown);
        let server_handle = tokio::spawn(async move { server.run().await });

        let id = client
            .issue_request(ISSUER, output_commitment(), REQUESTED_AMOUNT, DEADLINE, 1)
            .await
            .unwrap();

        let bookers: Vec<Address> = (1..=8u8).map(|i| Address([i; 20])).collect();
        let handles: Vec<_> = bookers
            .iter()
            .map(|booker| {
                let client = client.clone();
                let booker = *booker;
                tokio::spawn(async move { client.book_request(id, booker).await })
            })
            .collect();

        let mut winners = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(booking) => winners.push(booking.booker),
                Err(err) => assert!(matches!(err, BridgeError::AlreadyBooked(_))),
            }
        }
        assert_eq!(winners.len(), 1);
        assert_eq!(client.get_booking(id).await.unwrap().booker, winners[0]);

        tx_shutdown.send(()).unwrap();
        assert_eq!(server_handle.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn test_find_booking() {
        let (bridge, _) = bridge_at(1_000).await;
        let (tx_shutdown, rx_shutdown) = broadcast::channel(1);
        let (mut server, client) = create_app(bridge, rx_shutdown);
        let server_handle = tokio::spawn(async move { server.run().await });

        assert_eq!(client.find_booking(RequestId(5)).await.unwrap(), None);
        let id = client
            .issue_request(ISSUER, output_commitment(), REQUESTED_AMOUNT, DEADLINE, 1)
            .await
            .unwrap();
        assert_eq!(client.find_booking(id).await.unwrap(), None);
        let booking = client.book_request(id, BOOKER).await.unwrap();
        assert_eq!(client.find_booking(id).await.unwrap(), Some(booking));

        // Only a missing booking maps to None
        tx_shutdown.send(()).unwrap();
        server_handle.await.unwrap().unwrap();
        assert!(matches!(
            client.find_booking(id).await,
            Err(BridgeError::ServerUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_through_client() {
        let (bridge, _) = bridge_at(1_000).await;
        let (tx_shutdown, rx_shutdown) = broadcast::channel(1);
        let (mut server, client) = create_app(bridge, rx_shutdown);
        let server_handle = tokio::spawn(async move { server.run().await });

        let mut events = client.subscribe().await.unwrap();
        client.record_anchor(vector_anchor()).await.unwrap();
        assert_eq!(client.get_anchors().await.unwrap(), vec![vector_anchor()]);

        let id = client
            .issue_request(ISSUER, output_commitment(), REQUESTED_AMOUNT, DEADLINE, 7)
            .await
            .unwrap();
        client.book_request(id, BOOKER).await.unwrap();
        assert!(matches!(
            client
                .submit_booked_request_transaction_params(id, OTHER, vector_tx_params())
                .await,
            Err(BridgeError::NotBooker { .. })
        ));
        client
            .submit_booked_request_transaction_params(id, BOOKER, vector_tx_params())
            .await
            .unwrap();
        let record = client.fulfill_request(id, vector_proof()).await.unwrap();
        assert_eq!(record.amount, 7);
        assert_eq!(record.recipient, BOOKER);
        assert_eq!(
            client.get_request(id).await.unwrap().status,
            RequestStatus::Fulfilled
        );

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(seen.len(), 5);
        assert!(matches!(seen[0], BridgeEvent::AnchorRecorded(_)));
        assert_eq!(seen[4], BridgeEvent::RequestFulfilled(record));

        tx_shutdown.send(()).unwrap();
        server_handle.await.unwrap().unwrap();
        assert!(matches!(
            client.get_request(id).await,
            Err(BridgeError::ServerUnavailable)
        ));
    }
}
