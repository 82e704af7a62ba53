use axum::extract::State;
use axum::{routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `"expired"` once the monitor has seen the TTL lapse, `"ok"` otherwise.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Qualifying heartbeats received since startup.
    pub heartbeats_received: u64,
    /// Seconds since the last heartbeat as of the monitor's latest tick.
    pub seconds_since_heartbeat: f64,
    pub ttl_secs: u64,
    /// Successful alerts sent since startup.
    pub alerts_sent: u64,
    pub consecutive_failures: u32,
    pub last_alert_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// GET /health -- returns heartbeat and alerting status.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.watchdog.borrow().clone();
    let status = if snapshot.expired { "expired" } else { "ok" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        heartbeats_received: state.registry.heartbeat_count(),
        seconds_since_heartbeat: snapshot.since_last_heartbeat.as_secs_f64(),
        ttl_secs: state.config.watchdog.ttl.as_secs(),
        alerts_sent: snapshot.alerts_sent,
        consecutive_failures: snapshot.consecutive_failures,
        last_alert_at: snapshot.last_alert_at,
        last_attempt_at: snapshot.last_attempt_at,
    })
}

/// Mount health check routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
