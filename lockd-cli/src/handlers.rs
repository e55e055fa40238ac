use lockd_core::{AcquireRequest, Lease, LockError, Metadata};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

// ─── Validation Constants ───────────────────────────────────────────────────

const MAX_LOCK_NAME_LEN: usize = 256;
const MAX_CLIENT_ID_LEN: usize = 256;

// ─── Validation Helpers ─────────────────────────────────────────────────────

pub fn validate_lock_name(lock_name: &str) -> Result<(), String> {
    if lock_name.is_empty() {
        return Err("lock name is required".to_string());
    }
    if lock_name.len() > MAX_LOCK_NAME_LEN {
        return Err(format!(
            "lock name must be at most {} bytes",
            MAX_LOCK_NAME_LEN
        ));
    }
    Ok(())
}

fn validate_client_id(client_id: &str) -> Result<(), String> {
    if client_id.is_empty() {
        return Err("client_id is required".to_string());
    }
    if client_id.len() > MAX_CLIENT_ID_LEN {
        return Err(format!(
            "client_id must be at most {} bytes",
            MAX_CLIENT_ID_LEN
        ));
    }
    Ok(())
}

// ─── Request Types ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AcquireLockRequest {
    pub client_id: String,
    /// Lease TTL in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Seconds to wait for a contended lock; 0 or absent fails fast
    #[serde(default)]
    pub wait_timeout: Option<u64>,
    #[serde(default)]
    pub auto_renew: bool,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl AcquireLockRequest {
    pub fn validate(&self, lock_name: &str) -> Result<(), String> {
        validate_lock_name(lock_name)?;
        validate_client_id(&self.client_id)?;
        Ok(())
    }

    pub fn into_request(self, lock_name: String) -> AcquireRequest {
        let mut request = AcquireRequest::new(lock_name, self.client_id)
            .wait_timeout(Duration::from_secs(self.wait_timeout.unwrap_or(0)))
            .auto_renew(self.auto_renew)
            .metadata(self.metadata.unwrap_or_default());
        if let Some(timeout) = self.timeout {
            request = request.timeout(Duration::from_secs(timeout));
        }
        request
    }
}

#[derive(Deserialize)]
pub struct ReleaseLockRequest {
    pub client_id: String,
    pub lease_id: String,
}

impl ReleaseLockRequest {
    pub fn validate(&self, lock_name: &str) -> Result<(), String> {
        validate_lock_name(lock_name)?;
        validate_client_id(&self.client_id)?;
        if self.lease_id.is_empty() {
            return Err("lease_id is required".to_string());
        }
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct RenewLockRequest {
    pub client_id: String,
    pub lease_id: String,
    /// Seconds from now; absent uses the server default
    #[serde(default)]
    pub extend_by: Option<u64>,
}

impl RenewLockRequest {
    pub fn validate(&self, lock_name: &str) -> Result<(), String> {
        validate_lock_name(lock_name)?;
        validate_client_id(&self.client_id)?;
        if self.lease_id.is_empty() {
            return Err("lease_id is required".to_string());
        }
        Ok(())
    }

    pub fn extend_by(&self) -> Option<Duration> {
        self.extend_by.map(Duration::from_secs)
    }
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable failure kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            reason: None,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
            reason: Some("INVALID_REQUEST".to_string()),
        }
    }

    /// Failure that still carries a payload describing the failed state.
    pub fn degraded(data: T, e: &LockError) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: Some(e.to_string()),
            reason: Some(e.reason().to_string()),
        }
    }

    pub fn from_error(e: &LockError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(e.to_string()),
            reason: Some(e.reason().to_string()),
        }
    }
}

#[derive(Serialize)]
pub struct LeaseResponse {
    pub lease_id: String,
    pub lock_name: String,
    pub client_id: String,
    pub acquired_at: u64,
    pub expires_at: u64,
    pub auto_renew: bool,
    /// How long the request waited before acquiring
    pub wait_ms: u64,
}

impl LeaseResponse {
    pub fn new(lease: Lease, waited: Duration) -> Self {
        Self {
            lease_id: lease.lease_id,
            lock_name: lease.lock_name,
            client_id: lease.holder_id,
            acquired_at: lease.acquired_at,
            expires_at: lease.expires_at,
            auto_renew: lease.auto_renew,
            wait_ms: waited.as_millis() as u64,
        }
    }
}

#[derive(Serialize)]
pub struct ActiveLockInfo {
    pub lock_name: String,
    pub lease_id: String,
    pub holder_id: String,
    pub acquired_at: u64,
    pub expires_at: u64,
    pub auto_renew: bool,
    pub renewal_count: u64,
}

impl From<Lease> for ActiveLockInfo {
    fn from(lease: Lease) -> Self {
        Self {
            lock_name: lease.lock_name,
            lease_id: lease.lease_id,
            holder_id: lease.holder_id,
            acquired_at: lease.acquired_at,
            expires_at: lease.expires_at,
            auto_renew: lease.auto_renew,
            renewal_count: lease.renewal_count,
        }
    }
}

#[derive(Serialize)]
pub struct LockListResponse {
    pub locks: Vec<ActiveLockInfo>,
    pub count: usize,
    pub waiting_clients: BTreeMap<String, Vec<String>>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub active_leases: usize,
    pub version: String,
}
