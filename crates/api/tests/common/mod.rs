#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio::sync::watch;
use tower::ServiceExt;

use deadman_api::config::ServerConfig;
use deadman_api::router::build_app_router;
use deadman_api::state::AppState;
use deadman_core::{HeartbeatRegistry, WatchdogSnapshot};

/// Build a test `ServerConfig` from defaults plus `overrides`.
///
/// Uses a 5 second TTL so expiry tests need little virtual time.
pub fn test_config(overrides: &[(&str, &str)]) -> ServerConfig {
    let mut env: HashMap<String, String> = HashMap::from([
        ("HOST".to_string(), "127.0.0.1".to_string()),
        ("PORT".to_string(), "0".to_string()),
        ("WATCHDOG_TTL_SECS".to_string(), "5".to_string()),
    ]);
    for (k, v) in overrides {
        env.insert(k.to_string(), v.to_string());
    }
    ServerConfig::from_lookup(|key| env.get(key).cloned()).expect("valid test config")
}

/// Router plus handles to the state behind it.
pub struct TestApp {
    pub router: Router,
    pub registry: Arc<HeartbeatRegistry>,
    pub snapshot_tx: watch::Sender<WatchdogSnapshot>,
}

/// Build the full application router with the production middleware stack.
///
/// No monitor task runs; tests publish snapshots through `snapshot_tx`.
pub fn build_test_app(config: ServerConfig) -> TestApp {
    let registry = Arc::new(HeartbeatRegistry::new());
    let (snapshot_tx, snapshot_rx) = watch::channel(WatchdogSnapshot::default());

    TestApp {
        router: build_router(config, Arc::clone(&registry), snapshot_rx),
        registry,
        snapshot_tx,
    }
}

/// Build the router over an existing registry and snapshot receiver, such as
/// one subscribed to a running [`deadman_core::WatchdogMonitor`].
pub fn build_router(
    config: ServerConfig,
    registry: Arc<HeartbeatRegistry>,
    watchdog: watch::Receiver<WatchdogSnapshot>,
) -> Router {
    let state = AppState {
        registry,
        matcher: Arc::new(config.matcher.clone()),
        watchdog,
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_raw(app: Router, uri: &str, body: impl Into<Body>) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body is JSON")
}
