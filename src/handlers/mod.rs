pub mod admin;
pub mod public;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::RateLimitConfig;
use crate::engine::LicenseEngine;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// The complete HTTP application: launcher endpoints plus the admin API.
pub fn app(state: AppState, rate_limit: RateLimitConfig) -> Router {
    Router::new()
        .merge(public::router(rate_limit))
        .merge(admin::router(state.clone(), rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run an engine operation on the blocking thread pool. Store calls may wait
/// on SQLite's busy timeout, which must not park an async worker.
pub(crate) async fn run_blocking<T, F>(engine: &LicenseEngine, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&LicenseEngine) -> Result<T> + Send + 'static,
{
    let engine = engine.clone();
    tokio::task::spawn_blocking(move || f(&engine))
        .await
        .map_err(|e| AppError::Internal(format!("Engine task failed: {}", e)))?
}
