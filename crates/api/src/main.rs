//! `deadman` -- heartbeat watchdog for Alertmanager.
//!
//! Receives the always-firing "Watchdog" alert on `POST /webhook` and runs a
//! local notify program when it stops arriving. Configuration is read from
//! the environment (see [`ServerConfig::from_env`]).

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deadman_api::background;
use deadman_api::config::ServerConfig;
use deadman_api::notifier::CommandNotifier;
use deadman_api::router::build_app_router;
use deadman_api::state::AppState;
use deadman_core::{HeartbeatRegistry, WatchdogMonitor};

/// How long to wait for the watchdog task after cancellation.
const MONITOR_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "deadman_api=info,deadman_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });
    tracing::info!(
        host = %config.host,
        port = config.port,
        matcher = %config.matcher,
        notify_program = %config.notify.program,
        "Loaded server configuration"
    );

    // --- Watchdog ---
    // The registry's construction time counts as the first heartbeat.
    let registry = Arc::new(HeartbeatRegistry::new());
    let notifier = Arc::new(CommandNotifier::from_config(&config.notify));

    let monitor = WatchdogMonitor::new(Arc::clone(&registry), notifier, config.watchdog.clone())
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Invalid watchdog policy");
            std::process::exit(1);
        });
    let snapshot = monitor.subscribe();

    let cancel = CancellationToken::new();
    let monitor_handle = background::watchdog::start(monitor, cancel.clone());

    // --- App state ---
    let state = AppState {
        registry,
        matcher: Arc::new(config.matcher.clone()),
        watchdog: snapshot,
        config: Arc::new(config.clone()),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = match config.host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, config.port),
        Err(e) => {
            tracing::error!(host = %config.host, error = %e, "Invalid HOST address");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind to address");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "Server starting");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, stopping watchdog");

    cancel.cancel();
    if tokio::time::timeout(MONITOR_SHUTDOWN_TIMEOUT, monitor_handle)
        .await
        .is_err()
    {
        tracing::warn!("Watchdog did not stop within the shutdown timeout");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the service
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
