use std::time::Duration;
use thiserror::Error;

/// Failure reported by a lease store adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Backend I/O failure or timeout
    #[error("lease store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Failures returned by coordinator operations. None are retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// Lock is held and the caller asked not to wait
    #[error("lock '{lock_name}' is not available")]
    LockUnavailable { lock_name: String },

    /// Lock stayed contended past the caller's wait bound
    #[error("wait timeout exceeded for lock '{lock_name}' after {waited:?}")]
    WaitTimeoutExceeded { lock_name: String, waited: Duration },

    /// Lease id does not match the current holder, or the lease already expired
    #[error("lock '{lock_name}' is not owned by this lease or has already expired")]
    NotOwner { lock_name: String },

    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl LockError {
    /// Stable machine-readable identifier for the error kind
    pub fn reason(&self) -> &'static str {
        match self {
            LockError::LockUnavailable { .. } => "LOCK_UNAVAILABLE",
            LockError::WaitTimeoutExceeded { .. } => "WAIT_TIMEOUT_EXCEEDED",
            LockError::NotOwner { .. } => "NOT_OWNER",
            LockError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            LockError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }
}
