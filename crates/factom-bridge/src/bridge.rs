//! The bridge ledger: owns the store handle, the trusted anchor state and the collaborators
//! every lifecycle operation needs.
//!
//! Operations are split by concern across [`crate::registry`], [`crate::booking`],
//! [`crate::fulfillment`] and [`crate::refund`]. Every mutating operation takes `&mut self`,
//! checks all of its preconditions first, and then writes through a single store commit, so
//! a failed call never leaves partial state behind.

use std::sync::Arc;

use factom_spv_verify::{AnchorRecord, AnchorState, NodeHasher, Sha256Hasher};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::booking::Booking;
use crate::clock::Clock;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::payout::PayoutSink;
use crate::request::Request;
use crate::store::{LedgerStore, StoreError};
use crate::types::{RequestId, Timestamp};

pub struct Bridge {
    pub(crate) config: BridgeConfig,
    pub(crate) store: Arc<dyn LedgerStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) payouts: Arc<dyn PayoutSink>,
    pub(crate) hasher: Arc<dyn NodeHasher>,
    pub(crate) anchors: AnchorState,
    tx_events: broadcast::Sender<BridgeEvent>,
}

impl Bridge {
    /// Open the bridge on top of `store`, restoring the anchor state it holds
    pub async fn open(
        config: BridgeConfig,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        payouts: Arc<dyn PayoutSink>,
    ) -> Result<Self, BridgeError> {
        let anchors = AnchorState::from_records(store.get_anchors().await?)?;
        if let Some(latest) = anchors.latest() {
            info!(
                "Restored {} anchors, latest at height {}",
                anchors.len(),
                latest.height
            );
        }
        let (tx_events, _) = broadcast::channel(config.events_capacity.max(1));
        Ok(Self {
            config,
            store,
            clock,
            payouts,
            hasher: Arc::new(Sha256Hasher),
            anchors,
            tx_events,
        })
    }

    /// Replace the default SHA-256 hasher used for transaction ids and Merkle nodes
    pub fn with_hasher(mut self, hasher: Arc<dyn NodeHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn anchors(&self) -> &AnchorState {
        &self.anchors
    }

    /// Receive every event emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.tx_events.subscribe()
    }

    /// Append a trusted anchor published by the anchor oracle
    pub async fn record_anchor(&mut self, record: AnchorRecord) -> Result<(), BridgeError> {
        self.anchors.check_append(&record)?;
        self.store.add_anchor(&record).await?;
        self.anchors.append(record)?;
        info!(
            "Anchor recorded at height {}: {}",
            record.height, record.merkle_root
        );
        self.emit(BridgeEvent::AnchorRecorded(record));
        Ok(())
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub(crate) async fn load_request(&self, id: RequestId) -> Result<Request, BridgeError> {
        self.store
            .get_request(id)
            .await?
            .ok_or(BridgeError::NotFound(id))
    }

    /// Booking of a request whose status says it has one
    pub(crate) async fn load_booking(&self, id: RequestId) -> Result<Booking, BridgeError> {
        self.store.get_booking(id).await?.ok_or_else(|| {
            BridgeError::Store(StoreError::Corrupted(format!(
                "request {id} has no booking"
            )))
        })
    }

    pub(crate) fn emit(&self, event: BridgeEvent) {
        // No subscribers is fine
        if self.tx_events.send(event).is_err() {
            debug!("No event subscribers");
        }
    }
}
