//! Factom → Ethereum bridge ledger
//!
//! Requests escrow funds against a Factom payment to a committed address. A booker claims a
//! request, submits the paying factoid transaction, and proves its inclusion in the anchored
//! Factom chain to receive the escrow. Requests not fulfilled by their deadline are refunded
//! to the issuer.

pub mod app;
pub mod booking;
pub mod bridge;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod fulfillment;
pub mod payout;
pub mod refund;
pub mod registry;
pub mod request;
pub mod sqlite;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use app::{create_app, BridgeClient, BridgeServer};
pub use booking::Booking;
pub use bridge::Bridge;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BridgeConfig, ConfigError, PricingRule};
pub use error::BridgeError;
pub use events::BridgeEvent;
pub use payout::{
    FulfillmentRecord, LogPayoutSink, Payout, PayoutSink, RecordingPayoutSink, RefundRecord,
};
pub use request::{Request, RequestStatus};
pub use sqlite::SqliteLedgerStore;
pub use store::{LedgerStore, LedgerUpdate, MemoryStore, StoreError};
pub use types::{Address, RequestId, Timestamp};
