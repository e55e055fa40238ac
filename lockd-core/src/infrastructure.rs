use async_trait::async_trait;
use std::time::Duration;

use crate::types::StoreError;

/// Result of a non-mutating read of one lock key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreEntry {
    /// Lease id currently owning the key, if the key is live
    pub owner: Option<String>,
    /// Time left before the store expires the key
    pub remaining_ttl: Option<Duration>,
}

/// Atomic primitives over named leases. The store is the source of truth for
/// ownership; every method must be a single atomic operation against it, and
/// an expired key must behave exactly like an absent one.
///
/// Implementations must bound their own I/O and report timeouts as
/// [`StoreError::Unavailable`] rather than hang.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Create the key with `lease_id` as value only if it is absent.
    async fn try_acquire(
        &self,
        lock_name: &str,
        lease_id: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Delete the key only if its live value equals `lease_id`.
    async fn compare_and_release(&self, lock_name: &str, lease_id: &str)
    -> Result<bool, StoreError>;

    /// Reset the key's expiry to `now + new_ttl` only if its live value equals `lease_id`.
    async fn compare_and_extend(
        &self,
        lock_name: &str,
        lease_id: &str,
        new_ttl: Duration,
    ) -> Result<bool, StoreError>;

    async fn peek(&self, lock_name: &str) -> Result<StoreEntry, StoreError>;

    /// Cheap liveness probe
    async fn ping(&self) -> Result<(), StoreError>;

    /// Delete keys whose TTL has passed and return how many went. Expired keys
    /// already behave as absent, so this only reclaims space. Stores that
    /// expire keys on their own keep the default.
    async fn purge_expired(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}
