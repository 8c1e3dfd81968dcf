//! Shared fixtures for unit tests: a mainnet payment of 365 FCT and its inclusion proof.

use std::sync::Arc;

use factom_spv_verify::{AnchorRecord, Hash32, ProofBundle, ProofParams, TransactionParams};

use crate::bridge::Bridge;
use crate::clock::ManualClock;
use crate::config::BridgeConfig;
use crate::payout::{PayoutSink, RecordingPayoutSink};
use crate::store::MemoryStore;
use crate::types::{Address, RequestId, Timestamp};

pub const ISSUER: Address = Address([0x11; 20]);
pub const BOOKER: Address = Address([0x22; 20]);
pub const OTHER: Address = Address([0x33; 20]);

pub const REQUESTED_AMOUNT: u64 = 36_500_000_000;
pub const DEADLINE: Timestamp = 2_000;

pub fn output_commitment() -> Hash32 {
    Hash32::from_hex("0x50fc0b6f3cae9d7677bb1d84170cb595269216d0b381666999cf8d9663ccc637")
        .unwrap()
}

pub fn vector_tx_hash() -> Hash32 {
    Hash32::from_hex("0x59c31965f38c8d48dd75c612145106d5cdbaf6d7096b748470d4f5d196de400e")
        .unwrap()
}

pub fn vector_tx_params() -> TransactionParams {
    serde_json::from_str(include_str!("../tests/fixtures/tx_params.json")).unwrap()
}

pub fn vector_proof() -> ProofBundle {
    let params: ProofParams =
        serde_json::from_str(include_str!("../tests/fixtures/proof_params.json")).unwrap();
    params.try_into().unwrap()
}

pub fn vector_anchor() -> AnchorRecord {
    AnchorRecord {
        height: 214_686,
        merkle_root: Hash32::from_hex(
            "0xa819509fbfe2fc1a2ef62af6e5a5cdcab173291b390285d23a9a6d0c29570057",
        )
        .unwrap(),
    }
}

pub async fn bridge_with_payouts(
    now: Timestamp,
    payouts: Arc<dyn PayoutSink>,
) -> (Bridge, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now));
    let bridge = Bridge::open(
        BridgeConfig::default(),
        Arc::new(MemoryStore::new()),
        clock.clone(),
        payouts,
    )
    .await
    .unwrap();
    (bridge, clock)
}

pub async fn bridge_at(now: Timestamp) -> (Bridge, Arc<ManualClock>) {
    bridge_with_payouts(now, Arc::new(RecordingPayoutSink::default())).await
}

/// Issue a request for the vector payment, escrowing one wei
pub async fn issue_vector_request(bridge: &mut Bridge) -> RequestId {
    bridge
        .issue_request(ISSUER, output_commitment(), REQUESTED_AMOUNT, DEADLINE, 1)
        .await
        .unwrap()
}

/// Issue, book and submit the vector transaction
pub async fn submitted_vector_request(bridge: &mut Bridge) -> RequestId {
    let id = issue_vector_request(bridge).await;
    bridge.book_request(id, BOOKER).await.unwrap();
    bridge
        .submit_booked_request_transaction_params(id, BOOKER, &vector_tx_params())
        .await
        .unwrap();
    id
}
