use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::infrastructure::{LeaseStore, StoreEntry};
use crate::now_ms;
use crate::types::StoreError;

struct Entry {
    lease_id: String,
    expires_at: u64,
}

/// Process-local lease store. Every primitive runs under one mutex, which is
/// what makes it atomic.
pub struct InMemoryLeaseStore {
    // Map of lock name -> owning entry
    entries: Mutex<HashMap<String, Entry>>,
    available: AtomicBool,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate a backend outage: while unavailable every call fails with
    /// [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = now_ms();
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store marked unavailable".into()))
        }
    }
}

impl Default for InMemoryLeaseStore {
    fn default() -> Self {
        Self::new()
    }
}

fn ttl_ms(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn try_acquire(
        &self,
        lock_name: &str,
        lease_id: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.check_available()?;
        let now = now_ms();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = entries.get(lock_name) {
            if existing.expires_at > now {
                return Ok(false);
            }
        }

        entries.insert(
            lock_name.to_string(),
            Entry {
                lease_id: lease_id.to_string(),
                expires_at: now + ttl_ms(ttl),
            },
        );
        Ok(true)
    }

    async fn compare_and_release(
        &self,
        lock_name: &str,
        lease_id: &str,
    ) -> Result<bool, StoreError> {
        self.check_available()?;
        let now = now_ms();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        match entries.get(lock_name) {
            Some(entry) if entry.lease_id == lease_id && entry.expires_at > now => {
                entries.remove(lock_name);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn compare_and_extend(
        &self,
        lock_name: &str,
        lease_id: &str,
        new_ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.check_available()?;
        let now = now_ms();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        match entries.get_mut(lock_name) {
            Some(entry) if entry.lease_id == lease_id && entry.expires_at > now => {
                entry.expires_at = now + ttl_ms(new_ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn peek(&self, lock_name: &str) -> Result<StoreEntry, StoreError> {
        self.check_available()?;
        let now = now_ms();
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        Ok(match entries.get(lock_name) {
            Some(entry) if entry.expires_at > now => StoreEntry {
                owner: Some(entry.lease_id.clone()),
                remaining_ttl: Some(Duration::from_millis(entry.expires_at - now)),
            },
            _ => StoreEntry::default(),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        self.check_available()?;
        let now = now_ms();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(before - entries.len())
    }
}
