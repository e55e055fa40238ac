//! SQLite-backed LeaseStore implementation.
//! Any number of coordinator processes can share one database file; each
//! primitive is a single conditional statement, so SQLite's write lock makes
//! it atomic across processes.
//!
//! Enable with the `sqlite` feature flag:
//! ```toml
//! lockd-core = { path = "../lockd-core", features = ["sqlite"] }
//! ```

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;
use std::time::Duration;

use crate::infrastructure::{LeaseStore, StoreEntry};
use crate::now_ms;
use crate::types::StoreError;

/// How long a statement waits on another process's write lock before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A lease store backed by a SQLite database file.
///
/// Uses WAL mode so readers do not block the writer.
pub struct SqliteLeaseStore {
    conn: Mutex<Connection>,
}

impl SqliteLeaseStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_timeout(path: &str, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::init(conn, busy_timeout)
    }

    /// Private database, useful for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, DEFAULT_BUSY_TIMEOUT)
    }

    fn init(conn: Connection, busy_timeout: Duration) -> Result<Self, StoreError> {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS lock_leases (
                lock_name   TEXT PRIMARY KEY,
                lease_id    TEXT NOT NULL,
                expires_at  INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_lock_leases_expiry ON lock_leases(expires_at);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn ttl_ms(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl LeaseStore for SqliteLeaseStore {
    async fn try_acquire(
        &self,
        lock_name: &str,
        lease_id: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = now_ms();
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        // An expired row is taken over in the same statement.
        let rows = conn.execute(
            "INSERT INTO lock_leases (lock_name, lease_id, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(lock_name) DO UPDATE
                 SET lease_id = excluded.lease_id, expires_at = excluded.expires_at
                 WHERE lock_leases.expires_at <= ?4",
            params![lock_name, lease_id, now + ttl_ms(ttl), now],
        )?;
        Ok(rows > 0)
    }

    async fn compare_and_release(
        &self,
        lock_name: &str,
        lease_id: &str,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let rows = conn.execute(
            "DELETE FROM lock_leases WHERE lock_name = ?1 AND lease_id = ?2 AND expires_at > ?3",
            params![lock_name, lease_id, now_ms()],
        )?;
        Ok(rows > 0)
    }

    async fn compare_and_extend(
        &self,
        lock_name: &str,
        lease_id: &str,
        new_ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = now_ms();
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let rows = conn.execute(
            "UPDATE lock_leases SET expires_at = ?3
             WHERE lock_name = ?1 AND lease_id = ?2 AND expires_at > ?4",
            params![lock_name, lease_id, now + ttl_ms(new_ttl), now],
        )?;
        Ok(rows > 0)
    }

    async fn peek(&self, lock_name: &str) -> Result<StoreEntry, StoreError> {
        let now = now_ms();
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let row: Option<(String, u64)> = conn
            .query_row(
                "SELECT lease_id, expires_at FROM lock_leases
                 WHERE lock_name = ?1 AND expires_at > ?2",
                params![lock_name, now],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(match row {
            Some((lease_id, expires_at)) => StoreEntry {
                owner: Some(lease_id),
                remaining_ttl: Some(Duration::from_millis(expires_at.saturating_sub(now))),
            },
            None => StoreEntry::default(),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        Ok(conn.execute(
            "DELETE FROM lock_leases WHERE expires_at <= ?1",
            params![now_ms()],
        )?)
    }
}
