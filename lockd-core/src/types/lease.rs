use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque caller-supplied metadata attached to a lease.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Current ownership of a named lock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    /// The lock this lease covers
    pub lock_name: String,
    /// Fencing token, fresh per acquisition
    pub lease_id: String,
    /// Client holding the lease
    pub holder_id: String,
    /// When the lease was acquired (epoch ms)
    pub acquired_at: u64,
    /// When the lease will expire (epoch ms)
    pub expires_at: u64,
    /// Whether the renewal loop keeps this lease alive
    pub auto_renew: bool,
    /// Number of successful renewals since acquisition
    pub renewal_count: u64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Lease {
    pub fn new(
        lock_name: String,
        lease_id: String,
        holder_id: String,
        ttl: Duration,
        auto_renew: bool,
        metadata: Metadata,
        now: u64,
    ) -> Self {
        // A sub-millisecond TTL still has to leave expires_at > acquired_at.
        let ttl_ms = (ttl.as_millis() as u64).max(1);
        Self {
            lock_name,
            lease_id,
            holder_id,
            acquired_at: now,
            expires_at: now + ttl_ms,
            auto_renew,
            renewal_count: 0,
            metadata,
        }
    }

    /// Milliseconds left before expiry, saturating at zero.
    pub fn remaining_ms(&self, now: u64) -> u64 {
        self.expires_at.saturating_sub(now)
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// Point-in-time view of a lock as seen by the store plus the local index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockStatus {
    pub lock_name: String,
    pub held: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    /// Remaining TTL reported by the store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquired_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_renew: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewal_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl LockStatus {
    pub fn free(lock_name: impl Into<String>) -> Self {
        Self {
            lock_name: lock_name.into(),
            held: false,
            holder_id: None,
            lease_id: None,
            expires_at: None,
            ttl_ms: None,
            acquired_at: None,
            auto_renew: None,
            renewal_count: None,
            metadata: None,
        }
    }
}

/// Outcome of a successful renewal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renewal {
    pub expires_at: u64,
    pub renewal_count: u64,
}

/// Aggregate counters over the local index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorStats {
    pub active_leases: usize,
    pub waiting_clients: usize,
    pub clients_holding: usize,
    pub average_renewals: f64,
}

/// A wait-for cycle found by the deadlock detector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeadlockReport {
    /// Clients in cycle order, starting from the smallest id
    pub clients: Vec<String>,
    /// `locks[i]` is the lock `clients[i]` waits on (held by `clients[i + 1]`)
    pub locks: Vec<String>,
    pub detected_at: u64,
}
