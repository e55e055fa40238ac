//! Bounded polling acquisition.
//!
//! Waiters poll the store at a fixed interval until they win or their
//! deadline passes. There is no queue: whichever waiter polls first after the
//! lock frees up wins, so a waiter can lose every race under sustained
//! contention. Cost grows with waiters times poll frequency.

use crate::infrastructure::LeaseStore;
use crate::state::LocalIndex;
use crate::types::LockError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Marks `client_id` as waiting on `lock_name` in the local index for as long
/// as it is alive. Dropping it, on any exit path including cancellation of
/// the waiting future, removes the entry.
pub struct WaitRegistration {
    index: Arc<Mutex<LocalIndex>>,
    lock_name: String,
    client_id: String,
}

impl WaitRegistration {
    pub fn register(index: Arc<Mutex<LocalIndex>>, lock_name: &str, client_id: &str) -> Self {
        index
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .add_waiter(lock_name, client_id);
        Self {
            index,
            lock_name: lock_name.to_string(),
            client_id: client_id.to_string(),
        }
    }
}

impl Drop for WaitRegistration {
    fn drop(&mut self) {
        self.index
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove_waiter(&self.lock_name, &self.client_id);
    }
}

/// Deadline used when `wait_timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

pub struct WaitScheduler;

impl WaitScheduler {
    /// Poll `try_acquire` every `poll_interval` until it succeeds or
    /// `wait_timeout` has elapsed. Store failures end the wait immediately.
    pub async fn wait_for(
        store: &dyn LeaseStore,
        lock_name: &str,
        lease_id: &str,
        ttl: Duration,
        wait_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<(), LockError> {
        let started = Instant::now();
        let deadline = started
            .checked_add(wait_timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);
        let mut attempts: u32 = 0;

        loop {
            let now = Instant::now();
            if now >= deadline {
                debug!(lock_name, attempts, "Wait deadline reached");
                return Err(LockError::WaitTimeoutExceeded {
                    lock_name: lock_name.to_string(),
                    waited: now - started,
                });
            }

            tokio::time::sleep(poll_interval.min(deadline - now)).await;
            attempts += 1;

            if store.try_acquire(lock_name, lease_id, ttl).await? {
                debug!(lock_name, attempts, "Lock acquired after waiting");
                return Ok(());
            }
        }
    }
}
