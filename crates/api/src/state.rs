use std::sync::Arc;

use tokio::sync::watch;

use deadman_core::{HeartbeatMatcher, HeartbeatRegistry, WatchdogSnapshot};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is a watch
/// receiver).
#[derive(Clone)]
pub struct AppState {
    /// Last-heartbeat instant, shared with the watchdog monitor.
    pub registry: Arc<HeartbeatRegistry>,
    /// Rule deciding which webhook payloads reset the watchdog.
    pub matcher: Arc<HeartbeatMatcher>,
    /// Latest monitor snapshot, published once per tick.
    pub watchdog: watch::Receiver<WatchdogSnapshot>,
    /// Service configuration.
    pub config: Arc<ServerConfig>,
}
