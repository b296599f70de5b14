pub mod health;
pub mod moderate;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Limits applied at the HTTP boundary
#[derive(Debug, Clone, Copy)]
pub struct RouteLimits {
    pub max_upload_bytes: usize,
    /// Seconds between rate-limit token refills
    pub rate_limit_refill_secs: u64,
    pub rate_limit_burst: u32,
}

/// Build all routes for the API
pub fn build_routes(limits: RouteLimits) -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::routes())
        .merge(moderate::routes(limits))
}
