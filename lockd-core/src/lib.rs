//! # lockd-core
//!
//! Lease-based distributed locking over a shared key-value store.
//! Provides fenced lease acquisition with bounded waiting, automatic
//! renewal, and advisory wait-for deadlock detection.

pub mod config;
pub mod coordinator;
pub mod deadlock;
pub mod infrastructure;
#[path = "infrastructure_in_memory.rs"]
pub mod infrastructure_in_memory;
#[cfg(feature = "sqlite")]
#[path = "infrastructure_sqlite.rs"]
pub mod infrastructure_sqlite;
pub mod renewal;
pub mod scheduler;
pub mod state;
pub mod types;

pub use config::CoordinatorConfig;
pub use coordinator::{AcquireRequest, BackgroundTasks, LockCoordinator};
pub use infrastructure::{LeaseStore, StoreEntry};
pub use types::*;

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod deadlock_test;
#[cfg(test)]
mod state_test;
