use crate::coordinator::LockCoordinator;
use crate::now_ms;
use crate::types::LockError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// What one renewal pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenewalPass {
    pub renewed: usize,
    /// Leases the store no longer attributes to us, removed from the index
    pub dropped: usize,
    /// Renewals that hit a store failure; kept for the next pass
    pub failed: usize,
    /// Expired leases without auto-renew, removed from the index
    pub pruned: usize,
    /// Expired keys deleted from the store
    pub purged: usize,
}

/// Renew every auto-renew lease expiring within two renewal intervals, using
/// the default extension.
///
/// Expired keys are purged from the store at the end of the pass.
///
/// A lease the store refuses to extend has already expired or been taken by
/// someone else; it is dropped, not retried. A store outage leaves the lease
/// in place so the next pass looks at it again.
pub async fn renewal_pass(coordinator: &LockCoordinator, renewal_interval: Duration) -> RenewalPass {
    let mut pass = RenewalPass::default();
    let now = now_ms();

    for lease in coordinator.prune_expired(now) {
        debug!(lock_name = %lease.lock_name, lease_id = %lease.lease_id, "Expired lease pruned");
        pass.pruned += 1;
    }

    for lease in coordinator.renewal_candidates(now, renewal_interval * 2) {
        match coordinator
            .renew(&lease.lock_name, &lease.holder_id, &lease.lease_id, None)
            .await
        {
            Ok(renewal) => {
                debug!(
                    lock_name = %lease.lock_name,
                    lease_id = %lease.lease_id,
                    expires_at = renewal.expires_at,
                    "Auto-renewed lease"
                );
                pass.renewed += 1;
            }
            Err(LockError::NotOwner { .. }) => {
                warn!(
                    lock_name = %lease.lock_name,
                    lease_id = %lease.lease_id,
                    "Auto-renewal failed, lease no longer owned; dropping it"
                );
                coordinator.forget_lease(&lease);
                pass.dropped += 1;
            }
            Err(e) => {
                error!(
                    lock_name = %lease.lock_name,
                    lease_id = %lease.lease_id,
                    "Auto-renewal failed: {}", e
                );
                pass.failed += 1;
            }
        }
    }

    match coordinator.purge_store().await {
        Ok(purged) => pass.purged = purged,
        Err(e) => warn!("Purging expired store keys failed: {}", e),
    }

    pass
}

/// Start the periodic renewal loop. Stops when `shutdown` is cancelled.
pub(crate) fn spawn(
    coordinator: Arc<LockCoordinator>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        timer.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Renewal loop shutting down");
                    break;
                }
                _ = timer.tick() => {
                    let pass = renewal_pass(&coordinator, interval).await;
                    if pass != RenewalPass::default() {
                        debug!(?pass, "Renewal pass complete");
                    }
                }
            }
        }
    })
}
