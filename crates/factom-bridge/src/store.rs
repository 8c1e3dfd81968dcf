//! Persistence of the ledger: requests, bookings, claimed transactions and anchors.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use factom_spv_verify::{AnchorRecord, Hash32};
use thiserror::Error;

use crate::booking::Booking;
use crate::request::Request;
use crate::types::RequestId;

/// An error that can occur when using the store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    SQLite(#[from] sqlx::Error),
    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("Store lock poisoned")]
    LockPoisoned,
    #[error("Corrupted store: {0}")]
    Corrupted(String),
}

/// Everything one ledger operation writes, applied atomically
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerUpdate {
    pub request: Request,
    pub booking: Option<Booking>,
    /// Transaction hash claimed by `request`
    pub claimed_tx: Option<Hash32>,
}

impl LedgerUpdate {
    pub fn request(request: Request) -> Self {
        Self {
            request,
            booking: None,
            claimed_tx: None,
        }
    }

    pub fn with_booking(mut self, booking: Booking) -> Self {
        self.booking = Some(booking);
        self
    }

    pub fn with_claimed_tx(mut self, tx_hash: Hash32) -> Self {
        self.claimed_tx = Some(tx_hash);
        self
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Identifier the next issued request receives
    async fn next_request_id(&self) -> Result<RequestId, StoreError>;
    async fn get_request(&self, id: RequestId) -> Result<Option<Request>, StoreError>;
    async fn get_booking(&self, id: RequestId) -> Result<Option<Booking>, StoreError>;
    /// Request that claimed `tx_hash`, if any
    async fn claimed_by(&self, tx_hash: &Hash32) -> Result<Option<RequestId>, StoreError>;
    /// Insert or replace the request and booking, and record the claim, in one transaction
    async fn commit(&self, update: LedgerUpdate) -> Result<(), StoreError>;
    async fn add_anchor(&self, record: &AnchorRecord) -> Result<(), StoreError>;
    /// All anchor records in height order
    async fn get_anchors(&self) -> Result<Vec<AnchorRecord>, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    requests: BTreeMap<RequestId, Request>,
    bookings: HashMap<RequestId, Booking>,
    claimed: HashMap<Hash32, RequestId>,
    anchors: Vec<AnchorRecord>,
}

/// In-memory ledger store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> Result<T, StoreError> {
        let mut state = self.state.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(f(&mut state))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn next_request_id(&self) -> Result<RequestId, StoreError> {
        self.with_state(|state| {
            state
                .requests
                .keys()
                .next_back()
                .map_or(RequestId(0), |id| RequestId(id.0 + 1))
        })
    }

    async fn get_request(&self, id: RequestId) -> Result<Option<Request>, StoreError> {
        self.with_state(|state| state.requests.get(&id).cloned())
    }

    async fn get_booking(&self, id: RequestId) -> Result<Option<Booking>, StoreError> {
        self.with_state(|state| state.bookings.get(&id).cloned())
    }

    async fn claimed_by(&self, tx_hash: &Hash32) -> Result<Option<RequestId>, StoreError> {
        self.with_state(|state| state.claimed.get(tx_hash).copied())
    }

    async fn commit(&self, update: LedgerUpdate) -> Result<(), StoreError> {
        self.with_state(|state| {
            let id = update.request.id;
            if let Some(booking) = update.booking {
                state.bookings.insert(id, booking);
            }
            if let Some(tx_hash) = update.claimed_tx {
                state.claimed.insert(tx_hash, id);
            }
            state.requests.insert(id, update.request);
        })
    }

    async fn add_anchor(&self, record: &AnchorRecord) -> Result<(), StoreError> {
        self.with_state(|state| state.anchors.push(*record))
    }

    async fn get_anchors(&self) -> Result<Vec<AnchorRecord>, StoreError> {
        self.with_state(|state| state.anchors.clone())
    }
}
