//! SQLite-backed ledger store.

use std::ops::DerefMut;
use std::path::Path;

use async_trait::async_trait;
use factom_spv_verify::{AnchorRecord, Hash32};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Acquire, Pool, Row, Sqlite};
use tokio::fs;

use crate::booking::Booking;
use crate::request::Request;
use crate::store::{LedgerStore, LedgerUpdate, StoreError};
use crate::types::RequestId;

/// SQLite busy timeout in milliseconds
const SQLITE_BUSY_TIMEOUT: &str = "5000";

/// Ledger store backed by SQLite.
/// - WAL mode
/// - Single writer (max_connections = 1), so every commit is serialized
/// - Requests and bookings are stored as bincode blobs
#[derive(Debug)]
pub struct SqliteLedgerStore {
    pool: Pool<Sqlite>,
}

impl SqliteLedgerStore {
    /// Open (or create) the database file at `path`
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::SQLite(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("busy_timeout", SQLITE_BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::init_with_pool(pool).await
    }

    /// Open a private in-memory database
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options: SqliteConnectOptions = "sqlite::memory:".parse()?;
        // The database lives as long as its only connection
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::init_with_pool(pool).await
    }

    async fn init_with_pool(pool: Pool<Sqlite>) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn acquire(&self) -> Result<PoolConnection<Sqlite>, sqlx::Error> {
        self.pool.acquire().await
    }

    /// Create the tables if missing
    async fn init(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.acquire().await?;
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS requests (
                id INTEGER PRIMARY KEY,
                status TEXT NOT NULL,
                request BLOB NOT NULL
            );"#,
        )
        .execute(conn.deref_mut())
        .await?;
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS bookings (
                request_id INTEGER PRIMARY KEY,
                booking BLOB NOT NULL
            );"#,
        )
        .execute(conn.deref_mut())
        .await?;
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS claimed_transactions (
                tx_hash TEXT PRIMARY KEY,
                request_id INTEGER NOT NULL
            );"#,
        )
        .execute(conn.deref_mut())
        .await?;
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS anchors (
                height INTEGER PRIMARY KEY,
                merkle_root TEXT NOT NULL
            );"#,
        )
        .execute(conn.deref_mut())
        .await?;
        Ok(())
    }
}

fn sql_id(id: RequestId) -> Result<i64, StoreError> {
    i64::try_from(id.0).map_err(|_| StoreError::Corrupted(format!("request id {id} out of range")))
}

fn parse_hash(hex: &str) -> Result<Hash32, StoreError> {
    Hash32::from_hex(hex).map_err(|e| StoreError::Corrupted(format!("bad hash {hex}: {e}")))
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn next_request_id(&self) -> Result<RequestId, StoreError> {
        let mut conn = self.acquire().await?;
        let row: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(id) + 1, 0) FROM requests")
            .fetch_one(conn.deref_mut())
            .await?;
        u64::try_from(row.0)
            .map(RequestId)
            .map_err(|_| StoreError::Corrupted(format!("negative request id {}", row.0)))
    }

    async fn get_request(&self, id: RequestId) -> Result<Option<Request>, StoreError> {
        let mut conn = self.acquire().await?;
        let row = sqlx::query("SELECT request FROM requests WHERE id = ?")
            .bind(sql_id(id)?)
            .fetch_optional(conn.deref_mut())
            .await?;
        match row {
            Some(row) => {
                let data: Vec<u8> = row.try_get("request")?;
                Ok(Some(bincode::deserialize(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn get_booking(&self, id: RequestId) -> Result<Option<Booking>, StoreError> {
        let mut conn = self.acquire().await?;
        let row = sqlx::query("SELECT booking FROM bookings WHERE request_id = ?")
            .bind(sql_id(id)?)
            .fetch_optional(conn.deref_mut())
            .await?;
        match row {
            Some(row) => {
                let data: Vec<u8> = row.try_get("booking")?;
                Ok(Some(bincode::deserialize(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn claimed_by(&self, tx_hash: &Hash32) -> Result<Option<RequestId>, StoreError> {
        let mut conn = self.acquire().await?;
        let row = sqlx::query("SELECT request_id FROM claimed_transactions WHERE tx_hash = ?")
            .bind(tx_hash.to_hex())
            .fetch_optional(conn.deref_mut())
            .await?;
        match row {
            Some(row) => {
                let id: i64 = row.try_get("request_id")?;
                let id = u64::try_from(id)
                    .map_err(|_| StoreError::Corrupted(format!("negative request id {id}")))?;
                Ok(Some(RequestId(id)))
            }
            None => Ok(None),
        }
    }

    async fn commit(&self, update: LedgerUpdate) -> Result<(), StoreError> {
        let id = sql_id(update.request.id)?;
        let request_data = bincode::serialize(&update.request)?;
        let booking_data = update
            .booking
            .as_ref()
            .map(bincode::serialize)
            .transpose()?;

        let mut conn = self.acquire().await?;
        let mut tx = conn.begin().await?;

        sqlx::query("INSERT OR REPLACE INTO requests (id, status, request) VALUES (?, ?, ?)")
            .bind(id)
            .bind(update.request.status.as_str())
            .bind(request_data)
            .execute(&mut *tx)
            .await?;

        if let Some(booking_data) = booking_data {
            sqlx::query("INSERT OR REPLACE INTO bookings (request_id, booking) VALUES (?, ?)")
                .bind(id)
                .bind(booking_data)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(tx_hash) = update.claimed_tx {
            // Plain INSERT: a second claim of the same transaction aborts the whole commit
            sqlx::query("INSERT INTO claimed_transactions (tx_hash, request_id) VALUES (?, ?)")
                .bind(tx_hash.to_hex())
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn add_anchor(&self, record: &AnchorRecord) -> Result<(), StoreError> {
        let mut conn = self.acquire().await?;
        sqlx::query("INSERT INTO anchors (height, merkle_root) VALUES (?, ?)")
            .bind(record.height)
            .bind(record.merkle_root.to_hex())
            .execute(conn.deref_mut())
            .await?;
        Ok(())
    }

    async fn get_anchors(&self) -> Result<Vec<AnchorRecord>, StoreError> {
        let mut conn = self.acquire().await?;
        let rows = sqlx::query("SELECT height, merkle_root FROM anchors ORDER BY height ASC")
            .fetch_all(conn.deref_mut())
            .await?;
        rows.iter()
            .map(|row| {
                let height: u32 = row.try_get("height")?;
                let merkle_root: String = row.try_get("merkle_root")?;
                Ok(AnchorRecord {
                    height,
                    merkle_root: parse_hash(&merkle_root)?,
                })
            })
            .collect()
    }
}
