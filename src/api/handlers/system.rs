//! System endpoints: health check and presence stats.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::StatsResponse;
use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `"healthy"` when the process is serving.
    status: String,
    /// Current server time, RFC 3339.
    timestamp: String,
    /// Crate version.
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Sliding-window presence tracker behind `GET /api/stats`.
///
/// Counts distinct client addresses seen within the last five minutes.
/// This is REST-poll presence, independent of the hub's `user_count`
/// (which tracks live WebSocket connections).
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    inner: Arc<Mutex<HashMap<IpAddr, Instant>>>,
}

impl SessionTracker {
    const WINDOW: Duration = Duration::from_secs(300);

    /// Marks `ip` as active now and returns the distinct count of
    /// addresses still inside the window.
    pub fn touch_and_count(&self, ip: IpAddr) -> usize {
        let mut sessions = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        sessions.retain(|_, seen| now.duration_since(*seen) <= Self::WINDOW);
        sessions.insert(ip, now);
        sessions.len()
    }
}

/// `GET /api/stats` — Active users over the sliding window.
#[utoipa::path(
    get,
    path = "/api/stats",
    tag = "System",
    summary = "Active user count",
    responses(
        (status = 200, description = "Distinct recent clients", body = StatsResponse),
    )
)]
pub async fn stats_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Json<StatsResponse> {
    let active_users = state.sessions.touch_and_count(addr.ip());
    Json(StatsResponse { active_users })
}

/// System routes mounted at the root level (not under /api).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_counts_distinct_addresses() {
        let tracker = SessionTracker::default();
        let a: IpAddr = "10.0.0.1".parse().unwrap_or(IpAddr::from([0, 0, 0, 1]));
        let b: IpAddr = "10.0.0.2".parse().unwrap_or(IpAddr::from([0, 0, 0, 2]));

        assert_eq!(tracker.touch_and_count(a), 1);
        assert_eq!(tracker.touch_and_count(a), 1);
        assert_eq!(tracker.touch_and_count(b), 2);
    }
}
