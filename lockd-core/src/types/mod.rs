mod error;
mod lease;

pub use error::{LockError, StoreError};
pub use lease::{CoordinatorStats, DeadlockReport, Lease, LockStatus, Metadata, Renewal};
