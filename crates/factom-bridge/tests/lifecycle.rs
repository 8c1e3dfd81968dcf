use std::sync::Arc;

use factom_bridge::{
    Address, Bridge, BridgeConfig, BridgeError, FulfillmentRecord, ManualClock, Payout,
    RecordingPayoutSink, RefundRecord, RequestId, RequestStatus, SqliteLedgerStore,
};
use factom_spv_verify::{
    verify_inclusion, AnchorRecord, Hash32, ProofBundle, ProofParams, Sha256Hasher,
    TransactionParams,
};

const ISSUER: Address = Address([0xaa; 20]);
const BOOKER: Address = Address([0xbb; 20]);
const ESCROW: u128 = 1_000_000_000_000_000_000;

fn h(hex: &str) -> Hash32 {
    Hash32::from_hex(hex).unwrap()
}

fn output_commitment() -> Hash32 {
    h("0x50fc0b6f3cae9d7677bb1d84170cb595269216d0b381666999cf8d9663ccc637")
}

fn tx_params() -> TransactionParams {
    serde_json::from_str(include_str!("fixtures/tx_params.json")).unwrap()
}

fn proof() -> ProofBundle {
    let params: ProofParams = serde_json::from_str(include_str!("fixtures/proof_params.json")).unwrap();
    params.try_into().unwrap()
}

fn anchor() -> AnchorRecord {
    AnchorRecord {
        height: 214686,
        merkle_root: h("0xa819509fbfe2fc1a2ef62af6e5a5cdcab173291b390285d23a9a6d0c29570057"),
    }
}

async fn open_bridge(
    path: &std::path::Path,
    clock: Arc<ManualClock>,
    payouts: Arc<RecordingPayoutSink>,
) -> Bridge {
    let store = SqliteLedgerStore::open(path).await.unwrap();
    Bridge::open(BridgeConfig::default(), Arc::new(store), clock, payouts)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_mainnet_payment_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ledger.db");
    let clock = Arc::new(ManualClock::new(1_570_000_000));
    let payouts = Arc::new(RecordingPayoutSink::default());
    let mut bridge = open_bridge(&db_path, clock.clone(), payouts.clone()).await;

    bridge.record_anchor(anchor()).await.unwrap();
    let deadline = 1_570_000_000 + 3_600;
    let id = bridge
        .issue_request(ISSUER, output_commitment(), 36_500_000_000, deadline, ESCROW)
        .await
        .unwrap();
    assert_eq!(id, RequestId(0));

    clock.advance(60);
    bridge.book_request(id, BOOKER).await.unwrap();
    let tx_hash = bridge
        .submit_booked_request_transaction_params(id, BOOKER, &tx_params())
        .await
        .unwrap();
    assert_eq!(
        tx_hash,
        h("0x59c31965f38c8d48dd75c612145106d5cdbaf6d7096b748470d4f5d196de400e")
    );
    assert!(verify_inclusion(
        &tx_hash,
        &proof(),
        bridge.anchors(),
        &Sha256Hasher
    ));

    clock.advance(600);
    let record = bridge.fulfill_request(id, &proof()).await.unwrap();
    assert_eq!(
        record,
        FulfillmentRecord {
            request_id: id,
            amount: ESCROW,
            recipient: BOOKER,
            output_commitment: output_commitment(),
            tx_hash,
        }
    );
    assert_eq!(payouts.payouts(), vec![Payout::Release(record)]);

    // Past the deadline nothing moves any more
    clock.set(deadline + 1);
    assert!(matches!(
        bridge.refund_request(id, ISSUER).await,
        Err(BridgeError::WrongStatus {
            actual: RequestStatus::Fulfilled,
            ..
        })
    ));
    assert_eq!(payouts.payouts().len(), 1);
}

#[tokio::test]
async fn test_ledger_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ledger.db");
    let clock = Arc::new(ManualClock::new(1_000));
    let payouts = Arc::new(RecordingPayoutSink::default());

    let (fulfilled, pending) = {
        let mut bridge = open_bridge(&db_path, clock.clone(), payouts.clone()).await;
        bridge.record_anchor(anchor()).await.unwrap();

        let fulfilled = bridge
            .issue_request(ISSUER, output_commitment(), 36_500_000_000, 2_000, ESCROW)
            .await
            .unwrap();
        bridge.book_request(fulfilled, BOOKER).await.unwrap();
        bridge
            .submit_booked_request_transaction_params(fulfilled, BOOKER, &tx_params())
            .await
            .unwrap();

        let pending = bridge
            .issue_request(ISSUER, output_commitment(), 36_500_000_000, 2_000, ESCROW)
            .await
            .unwrap();
        bridge.book_request(pending, BOOKER).await.unwrap();
        bridge
            .submit_booked_request_transaction_params(pending, BOOKER, &tx_params())
            .await
            .unwrap();

        bridge.fulfill_request(fulfilled, &proof()).await.unwrap();
        (fulfilled, pending)
    };

    let mut bridge = open_bridge(&db_path, clock.clone(), payouts.clone()).await;
    assert_eq!(bridge.anchors().records(), &[anchor()]);
    assert_eq!(
        bridge.get_request(fulfilled).await.unwrap().status,
        RequestStatus::Fulfilled
    );

    // The claim is persisted: the same payment cannot fulfill another request
    assert!(matches!(
        bridge.fulfill_request(pending, &proof()).await,
        Err(BridgeError::TransactionAlreadyClaimed { claimed_by, .. }) if claimed_by == fulfilled
    ));

    // New ids continue after the persisted ones
    let next = bridge
        .issue_request(ISSUER, output_commitment(), 1, 2_000, 1)
        .await
        .unwrap();
    assert_eq!(next, RequestId(2));

    clock.set(2_001);
    let refund = bridge.refund_request(pending, BOOKER).await.unwrap();
    assert_eq!(
        refund,
        RefundRecord {
            request_id: pending,
            amount: ESCROW,
            recipient: ISSUER,
        }
    );
    assert_eq!(payouts.payouts().len(), 2);
    assert_eq!(payouts.payouts()[1], Payout::Refund(refund));
}

#[tokio::test]
async fn test_anchor_heights_must_increase() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(1_000));
    let payouts = Arc::new(RecordingPayoutSink::default());
    let mut bridge = open_bridge(&dir.path().join("ledger.db"), clock, payouts).await;

    bridge.record_anchor(anchor()).await.unwrap();
    let stale = AnchorRecord {
        height: 214000,
        merkle_root: Hash32([1; 32]),
    };
    assert!(matches!(
        bridge.record_anchor(stale).await,
        Err(BridgeError::Anchor(_))
    ));
    assert_eq!(bridge.anchors().len(), 1);
}
