//! The side-effecting action taken when the heartbeat expires.

use std::time::Duration;

use async_trait::async_trait;

/// Error type for a failed notify attempt.
///
/// Every variant is recoverable: the monitor logs it and retries on the
/// reattempt (or resend) schedule.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The notify action could not be started at all.
    #[error("Failed to start notify action: {0}")]
    Spawn(#[from] std::io::Error),

    /// The action ran but reported failure. `-1` when killed by a signal.
    #[error("Notify action exited with status {0}")]
    ExitStatus(i32),

    /// The action did not finish within its time budget.
    #[error("Notify action timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    /// Any other backend-specific refusal.
    #[error("Notify action rejected: {0}")]
    Rejected(String),
}

/// Capability invoked by [`WatchdogMonitor`](crate::WatchdogMonitor) to
/// alert an operator.
///
/// Implementations must be safe to share across tasks. The monitor never
/// runs two attempts concurrently, so implementations need no internal
/// de-duplication.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short human-readable name used in logs.
    fn name(&self) -> &str;

    /// Perform one notification attempt.
    async fn attempt(&self) -> Result<(), NotifyError>;
}
