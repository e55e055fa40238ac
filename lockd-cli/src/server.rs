use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use lockd_core::infrastructure::LeaseStore;
use lockd_core::infrastructure_in_memory::InMemoryLeaseStore;
use lockd_core::{CoordinatorConfig, CoordinatorStats, LockCoordinator, LockError, LockStatus, Renewal};

use crate::handlers::*;

pub type AppState = Arc<LockCoordinator>;

pub async fn run(
    host: &str,
    port: u16,
    storage: &str,
    config: CoordinatorConfig,
    max_concurrent_requests: usize,
) -> Result<(), String> {
    config.validate()?;
    let store = create_store(storage)?;
    let coordinator = Arc::new(LockCoordinator::new(store, config));
    let tasks = coordinator.start();

    let app = router(Arc::clone(&coordinator), max_concurrent_requests);
    let addr = format!("{}:{}", host, port);

    tracing::info!("🔒 lockd server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind {}: {}", addr, e))?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("Server error: {}", e));

    tasks.shutdown().await;
    served
}

pub fn router(state: AppState, max_concurrent_requests: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/locks", get(list_locks))
        .route("/locks/stats", get(stats))
        .route("/locks/{name}/acquire", post(acquire_lock))
        .route("/locks/{name}/release", post(release_lock))
        .route("/locks/{name}/renew", post(renew_lock))
        .route("/locks/{name}/status", get(lock_status))
        .layer(ConcurrencyLimitLayer::new(max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// HTTP status for each coordinator failure kind.
pub fn status_for(e: &LockError) -> StatusCode {
    match e {
        LockError::LockUnavailable { .. } | LockError::WaitTimeoutExceeded { .. } => {
            StatusCode::CONFLICT
        }
        LockError::NotOwner { .. } | LockError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        LockError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn failure<T: serde::Serialize>(e: &LockError) -> (StatusCode, Json<ApiResponse<T>>) {
    (status_for(e), Json(ApiResponse::from_error(e)))
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn health(State(coordinator): State<AppState>) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let report = |status: &str, store: String| HealthResponse {
        status: status.to_string(),
        store,
        active_leases: coordinator.stats().active_leases,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    match coordinator.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::ok(report("ok", "connected".to_string()))),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::degraded(report("unhealthy", e.to_string()), &e)),
            )
        }
    }
}

async fn acquire_lock(
    State(coordinator): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<AcquireLockRequest>,
) -> (StatusCode, Json<ApiResponse<LeaseResponse>>) {
    if let Err(e) = req.validate(&name) {
        return (StatusCode::BAD_REQUEST, Json(ApiResponse::invalid(e)));
    }

    let client_id = req.client_id.clone();
    let started = Instant::now();
    match coordinator.acquire(req.into_request(name.clone())).await {
        Ok(lease) => (
            StatusCode::OK,
            Json(ApiResponse::ok(LeaseResponse::new(lease, started.elapsed()))),
        ),
        Err(e) => {
            tracing::info!(
                lock_name = %name,
                client_id = %client_id,
                reason = e.reason(),
                "Lock denied"
            );
            failure(&e)
        }
    }
}

async fn release_lock(
    State(coordinator): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<ReleaseLockRequest>,
) -> (StatusCode, Json<ApiResponse<String>>) {
    if let Err(e) = req.validate(&name) {
        return (StatusCode::BAD_REQUEST, Json(ApiResponse::invalid(e)));
    }

    match coordinator.release(&name, &req.client_id, &req.lease_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::ok(format!("Lock '{}' released", name))),
        ),
        Err(e) => failure(&e),
    }
}

async fn renew_lock(
    State(coordinator): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<RenewLockRequest>,
) -> (StatusCode, Json<ApiResponse<Renewal>>) {
    if let Err(e) = req.validate(&name) {
        return (StatusCode::BAD_REQUEST, Json(ApiResponse::invalid(e)));
    }

    match coordinator
        .renew(&name, &req.client_id, &req.lease_id, req.extend_by())
        .await
    {
        Ok(renewal) => (StatusCode::OK, Json(ApiResponse::ok(renewal))),
        Err(e) => failure(&e),
    }
}

async fn lock_status(
    State(coordinator): State<AppState>,
    Path(name): Path<String>,
) -> (StatusCode, Json<ApiResponse<LockStatus>>) {
    if let Err(e) = validate_lock_name(&name) {
        return (StatusCode::BAD_REQUEST, Json(ApiResponse::invalid(e)));
    }

    match coordinator.status(&name).await {
        Ok(status) => (StatusCode::OK, Json(ApiResponse::ok(status))),
        Err(e) => failure(&e),
    }
}

async fn list_locks(State(coordinator): State<AppState>) -> Json<ApiResponse<LockListResponse>> {
    let locks: Vec<ActiveLockInfo> = coordinator
        .list_active()
        .into_iter()
        .map(ActiveLockInfo::from)
        .collect();
    Json(ApiResponse::ok(LockListResponse {
        count: locks.len(),
        locks,
        waiting_clients: coordinator.waiting_clients(),
    }))
}

async fn stats(State(coordinator): State<AppState>) -> Json<ApiResponse<CoordinatorStats>> {
    Json(ApiResponse::ok(coordinator.stats()))
}

// ─── Storage Backend Selection ──────────────────────────────────────────────

pub(crate) fn create_store(storage: &str) -> Result<Arc<dyn LeaseStore>, String> {
    if storage == "memory" {
        tracing::info!("💾 Storage backend: in-memory (locks are local to this process)");
        Ok(Arc::new(InMemoryLeaseStore::new()))
    } else if let Some(path) = storage.strip_prefix("sqlite:") {
        #[cfg(feature = "sqlite")]
        {
            tracing::info!("💾 Storage backend: SQLite ({})", path);
            let store = lockd_core::infrastructure_sqlite::SqliteLeaseStore::open(path)
                .map_err(|e| format!("Failed to open SQLite database at '{}': {}", path, e))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        {
            let _ = path;
            Err("SQLite storage requested but `sqlite` feature is not enabled. \
                 Rebuild with: cargo build --features sqlite"
                .to_string())
        }
    } else {
        Err(format!(
            "Unknown storage backend: '{}'. Use 'memory' or 'sqlite:<path>'",
            storage
        ))
    }
}
