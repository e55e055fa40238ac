//! The lock coordinator: lease acquisition, release and renewal over a
//! pluggable [`LeaseStore`], plus the local index the background tasks read.
//!
//! The store is authoritative for ownership. The local index only mirrors
//! what this process granted and who is waiting through it, so `status`,
//! `list_active` and deadlock detection see a single instance's view.

use crate::config::CoordinatorConfig;
use crate::deadlock::{self, detect_cycles};
use crate::infrastructure::LeaseStore;
use crate::now_ms;
use crate::renewal;
use crate::scheduler::{WaitRegistration, WaitScheduler};
use crate::state::LocalIndex;
use crate::types::*;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const DEADLOCK_CHANNEL_CAPACITY: usize = 64;

/// Parameters of a single acquisition.
#[derive(Debug, Clone)]
pub struct AcquireRequest {
    pub lock_name: String,
    pub client_id: String,
    /// Lease TTL. `None` or zero uses the configured default; larger values
    /// are clamped to the configured maximum.
    pub timeout: Option<Duration>,
    /// How long to wait for a contended lock. Zero fails fast.
    pub wait_timeout: Duration,
    pub auto_renew: bool,
    pub metadata: Metadata,
}

impl AcquireRequest {
    pub fn new(lock_name: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            lock_name: lock_name.into(),
            client_id: client_id.into(),
            timeout: None,
            wait_timeout: Duration::ZERO,
            auto_renew: false,
            metadata: Metadata::new(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn auto_renew(mut self, auto_renew: bool) -> Self {
        self.auto_renew = auto_renew;
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

pub struct LockCoordinator {
    store: Arc<dyn LeaseStore>,
    index: Arc<Mutex<LocalIndex>>,
    config: CoordinatorConfig,
    deadlocks: broadcast::Sender<DeadlockReport>,
}

impl LockCoordinator {
    pub fn new(store: Arc<dyn LeaseStore>, config: CoordinatorConfig) -> Self {
        let (deadlocks, _) = broadcast::channel(DEADLOCK_CHANNEL_CAPACITY);
        Self {
            store,
            index: Arc::new(Mutex::new(LocalIndex::new())),
            config,
            deadlocks,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    fn index(&self) -> MutexGuard<'_, LocalIndex> {
        self.index.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Acquire `lock_name` for `client_id`, waiting up to `wait_timeout` if it
    /// is held.
    pub async fn acquire(&self, request: AcquireRequest) -> Result<Lease, LockError> {
        if request.lock_name.is_empty() {
            return Err(LockError::InvalidRequest("lock_name is required".to_string()));
        }
        if request.client_id.is_empty() {
            return Err(LockError::InvalidRequest("client_id is required".to_string()));
        }

        let started = Instant::now();
        let ttl = self.config.effective_ttl(request.timeout);
        let lease_id = format!("lease_{}", nanoid::nanoid!());

        let acquired = self
            .store
            .try_acquire(&request.lock_name, &lease_id, ttl)
            .await?;

        if !acquired {
            if request.wait_timeout.is_zero() {
                debug!(
                    lock_name = %request.lock_name,
                    client_id = %request.client_id,
                    "Lock unavailable, caller asked not to wait"
                );
                return Err(LockError::LockUnavailable {
                    lock_name: request.lock_name,
                });
            }

            // The registration must be gone before the lease is indexed, or
            // the detector could see the client waiting on its own lock.
            let registration =
                WaitRegistration::register(Arc::clone(&self.index), &request.lock_name, &request.client_id);
            let waited = WaitScheduler::wait_for(
                self.store.as_ref(),
                &request.lock_name,
                &lease_id,
                ttl,
                request.wait_timeout,
                self.config.poll_interval(),
            )
            .await;
            drop(registration);

            if let Err(e) = waited {
                debug!(
                    lock_name = %request.lock_name,
                    client_id = %request.client_id,
                    error = %e,
                    "Wait for lock ended without acquiring"
                );
                return Err(e);
            }
        }

        let lease = Lease::new(
            request.lock_name,
            lease_id,
            request.client_id,
            ttl,
            request.auto_renew,
            request.metadata,
            now_ms(),
        );
        self.index().insert_lease(lease.clone());

        info!(
            lock_name = %lease.lock_name,
            client_id = %lease.holder_id,
            lease_id = %lease.lease_id,
            wait_ms = started.elapsed().as_millis() as u64,
            "Lock acquired"
        );
        Ok(lease)
    }

    /// Release a lease. Only the holder of `lease_id` can do this.
    pub async fn release(
        &self,
        lock_name: &str,
        client_id: &str,
        lease_id: &str,
    ) -> Result<(), LockError> {
        if !self.store.compare_and_release(lock_name, lease_id).await? {
            debug!(lock_name, client_id, lease_id, "Release rejected");
            return Err(LockError::NotOwner {
                lock_name: lock_name.to_string(),
            });
        }

        self.index().remove_lease(lease_id, lock_name, client_id);
        info!(lock_name, client_id, lease_id, "Lock released");
        Ok(())
    }

    /// Push a lease's expiry out to `now + extend_by`. Only the holder of
    /// `lease_id` can do this. The expiry never moves backwards: a renewal
    /// that would shorten a locally known lease lands 1ms past the current
    /// expiry instead.
    pub async fn renew(
        &self,
        lock_name: &str,
        client_id: &str,
        lease_id: &str,
        extend_by: Option<Duration>,
    ) -> Result<Renewal, LockError> {
        let now = now_ms();
        let requested = now + self.config.effective_ttl(extend_by).as_millis() as u64;
        let expires_at = match self.index().get_lease(lease_id) {
            Some(lease) => requested.max(lease.expires_at + 1),
            None => requested,
        };

        if !self
            .store
            .compare_and_extend(lock_name, lease_id, Duration::from_millis(expires_at - now))
            .await?
        {
            debug!(lock_name, client_id, lease_id, "Renewal rejected");
            return Err(LockError::NotOwner {
                lock_name: lock_name.to_string(),
            });
        }

        let renewal = match self.index().record_renewal(lease_id, expires_at) {
            Some(lease) => Renewal {
                expires_at: lease.expires_at,
                renewal_count: lease.renewal_count,
            },
            // Granted by another coordinator sharing the store
            None => Renewal {
                expires_at,
                renewal_count: 0,
            },
        };

        debug!(
            lock_name,
            client_id,
            lease_id,
            renewal_count = renewal.renewal_count,
            "Lock renewed"
        );
        Ok(renewal)
    }

    /// Current state of a lock. Never mutates anything.
    pub async fn status(&self, lock_name: &str) -> Result<LockStatus, LockError> {
        let entry = self.store.peek(lock_name).await?;
        let Some(owner) = entry.owner else {
            return Ok(LockStatus::free(lock_name));
        };

        let ttl_ms = entry.remaining_ttl.map(|ttl| ttl.as_millis() as u64);
        let index = self.index();
        Ok(match index.get_lease(&owner) {
            Some(lease) => LockStatus {
                lock_name: lock_name.to_string(),
                held: true,
                holder_id: Some(lease.holder_id.clone()),
                lease_id: Some(owner),
                expires_at: Some(lease.expires_at),
                ttl_ms,
                acquired_at: Some(lease.acquired_at),
                auto_renew: Some(lease.auto_renew),
                renewal_count: Some(lease.renewal_count),
                metadata: Some(lease.metadata.clone()),
            },
            None => LockStatus {
                held: true,
                lease_id: Some(owner),
                expires_at: ttl_ms.map(|ttl| now_ms() + ttl),
                ttl_ms,
                ..LockStatus::free(lock_name)
            },
        })
    }

    /// Leases granted by this coordinator, in acquisition order. Advisory:
    /// leases granted by other coordinators on the same store are not listed.
    pub fn list_active(&self) -> Vec<Lease> {
        self.index().leases()
    }

    /// lock name -> clients currently waiting on it through this coordinator
    pub fn waiting_clients(&self) -> BTreeMap<String, Vec<String>> {
        self.index().waiters()
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.index().stats()
    }

    pub async fn ping(&self) -> Result<(), LockError> {
        Ok(self.store.ping().await?)
    }

    pub(crate) async fn purge_store(&self) -> Result<usize, LockError> {
        Ok(self.store.purge_expired().await?)
    }

    /// Receive deadlock reports as the detector finds them.
    pub fn subscribe_deadlocks(&self) -> broadcast::Receiver<DeadlockReport> {
        self.deadlocks.subscribe()
    }

    /// Run one deadlock scan over the local index and publish what it finds.
    pub fn detect_now(&self) -> Vec<DeadlockReport> {
        let now = now_ms();
        let graph = self.index().wait_for_graph(now);
        let reports = detect_cycles(&graph, now);

        for report in &reports {
            warn!(
                clients = ?report.clients,
                locks = ?report.locks,
                "Deadlock detected"
            );
            // No subscribers is fine; the log line is the baseline report.
            let _ = self.deadlocks.send(report.clone());
        }
        reports
    }

    /// Spawn the renewal loop and, if enabled, the deadlock detector.
    pub fn start(self: &Arc<Self>) -> BackgroundTasks {
        let shutdown = CancellationToken::new();
        let mut handles = vec![renewal::spawn(
            Arc::clone(self),
            self.config.renewal_interval(),
            shutdown.clone(),
        )];

        if self.config.deadlock_detection_enabled {
            handles.push(deadlock::spawn(
                Arc::clone(self),
                self.config.detection_interval(),
                shutdown.clone(),
            ));
        }

        info!(
            renewal_interval_s = self.config.renewal_interval_seconds,
            deadlock_detection = self.config.deadlock_detection_enabled,
            "Background tasks started"
        );

        BackgroundTasks {
            coordinator: Arc::clone(self),
            shutdown,
            handles,
        }
    }

    /// Auto-renew leases expiring within `window` of `now`.
    pub(crate) fn renewal_candidates(&self, now: u64, window: Duration) -> Vec<Lease> {
        let window_ms = window.as_millis() as u64;
        self.index()
            .leases()
            .into_iter()
            .filter(|lease| lease.auto_renew && lease.remaining_ms(now) < window_ms)
            .collect()
    }

    pub(crate) fn forget_lease(&self, lease: &Lease) {
        self.index()
            .remove_lease(&lease.lease_id, &lease.lock_name, &lease.holder_id);
    }

    pub(crate) fn prune_expired(&self, now: u64) -> Vec<Lease> {
        self.index().prune_expired(now)
    }

    fn clear_local(&self) {
        self.index().clear();
    }
}

/// Handle over the coordinator's periodic tasks. Dropping it cancels them;
/// [`BackgroundTasks::shutdown`] also waits for them and clears the local index.
pub struct BackgroundTasks {
    coordinator: Arc<LockCoordinator>,
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        for handle in std::mem::take(&mut self.handles) {
            if let Err(e) = handle.await {
                error!("Background task failed during shutdown: {}", e);
            }
        }
        self.coordinator.clear_local();
        info!("Background tasks stopped");
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
