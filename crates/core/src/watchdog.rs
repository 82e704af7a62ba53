//! Periodic expiry check with throttled alerting.
//!
//! # State machine (evaluated once per tick)
//!
//! ```text
//!                 since_last < ttl
//!   Healthy ◄───────────────────────────────┐
//!     │                                     │
//!     │ since_last >= ttl                   │
//!     ▼                                     │
//!   Expired ── resend/reattempt open ──► attempt ──► Sent | Failed
//!     │                                     ▲
//!     └── throttled (wait) ─────────────────┘
//! ```
//!
//! - `last_sent` advances only on a successful attempt.
//! - `last_attempt` advances on every attempt, before the notifier runs.
//! - Recovery is silent: no notification is sent when heartbeats resume and
//!   `last_sent` is kept, so a flapping source stays within the resend
//!   budget.
//!
//! The notify attempt is awaited on the monitor task itself. This gives at
//! most one in-flight attempt; a slow notifier delays later ticks instead of
//! overlapping with them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;
use crate::heartbeat::HeartbeatRegistry;
use crate::notify::Notifier;

/// Default grace period before the heartbeat counts as expired.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Default spacing between successful alerts while still expired.
pub const DEFAULT_RESEND_INTERVAL: Duration = Duration::from_secs(900);

/// Default spacing between attempts after a failed alert.
pub const DEFAULT_REATTEMPT_INTERVAL: Duration = Duration::from_secs(10);

/// Default polling period.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
pub fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Timing configuration for a [`WatchdogMonitor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogPolicy {
    /// Maximum silence before the heartbeat is considered expired.
    pub ttl: Duration,
    /// Minimum spacing between successful alerts.
    pub resend_interval: Duration,
    /// Minimum spacing between attempts. `None` falls back to
    /// `resend_interval`, so a failing notifier is retried at the resend
    /// cadence rather than on every tick.
    pub reattempt_interval: Option<Duration>,
    /// Polling period.
    pub tick: Duration,
}

impl Default for WatchdogPolicy {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            resend_interval: DEFAULT_RESEND_INTERVAL,
            reattempt_interval: Some(DEFAULT_REATTEMPT_INTERVAL),
            tick: DEFAULT_TICK,
        }
    }
}

impl WatchdogPolicy {
    /// Reject settings the monitor cannot run with.
    ///
    /// A zero `ttl` or `resend_interval` is allowed: the former fires on the
    /// first tick, the latter degrades to one alert per tick.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.tick.is_zero() {
            return Err(CoreError::Validation(
                "watchdog tick period must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Whether the tick is longer than a tenth of the smallest non-zero
    /// interval, which makes throttle boundaries drift by up to one tick.
    pub fn tick_is_coarse(&self) -> bool {
        [
            Some(self.ttl),
            Some(self.resend_interval),
            self.reattempt_interval,
        ]
        .into_iter()
        .flatten()
        .filter(|d| !d.is_zero())
        .min()
        .is_some_and(|smallest| self.tick * 10 > smallest)
    }

    fn effective_reattempt(&self) -> Duration {
        self.reattempt_interval.unwrap_or(self.resend_interval)
    }
}

// ---------------------------------------------------------------------------
// Status / outcome / snapshot
// ---------------------------------------------------------------------------

/// Result of evaluating the state machine at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogStatus {
    /// A heartbeat arrived within the TTL.
    Healthy,
    /// Expired, but the resend or reattempt window is still closed.
    Throttled,
    /// Expired and allowed to attempt a notification now.
    Eligible,
}

/// What a single [`WatchdogMonitor::poll`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Healthy,
    Throttled,
    /// A notification attempt succeeded.
    Sent,
    /// A notification attempt failed; it will be retried.
    Failed,
}

/// Read-only view of the monitor, published after every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogSnapshot {
    pub expired: bool,
    pub since_last_heartbeat: Duration,
    pub last_alert_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub alerts_sent: u64,
    pub consecutive_failures: u32,
}

impl Default for WatchdogSnapshot {
    fn default() -> Self {
        Self {
            expired: false,
            since_last_heartbeat: Duration::ZERO,
            last_alert_at: None,
            last_attempt_at: None,
            alerts_sent: 0,
            consecutive_failures: 0,
        }
    }
}

/// Monitor-local throttle state. Only the monitor task touches it.
#[derive(Debug, Default)]
struct WatchdogState {
    last_sent: Option<Instant>,
    last_attempt: Option<Instant>,
    expired: bool,
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Polls a [`HeartbeatRegistry`] and invokes a [`Notifier`] on expiry.
pub struct WatchdogMonitor {
    registry: Arc<HeartbeatRegistry>,
    notifier: Arc<dyn Notifier>,
    policy: WatchdogPolicy,
    state: WatchdogState,
    snapshot: WatchdogSnapshot,
    snapshot_tx: watch::Sender<WatchdogSnapshot>,
}

impl WatchdogMonitor {
    /// Build a monitor; fails if `policy` does not validate.
    pub fn new(
        registry: Arc<HeartbeatRegistry>,
        notifier: Arc<dyn Notifier>,
        policy: WatchdogPolicy,
    ) -> Result<Self, CoreError> {
        policy.validate()?;
        let (snapshot_tx, _) = watch::channel(WatchdogSnapshot::default());
        Ok(Self {
            registry,
            notifier,
            policy,
            state: WatchdogState::default(),
            snapshot: WatchdogSnapshot::default(),
            snapshot_tx,
        })
    }

    pub fn policy(&self) -> &WatchdogPolicy {
        &self.policy
    }

    /// Receive a fresh [`WatchdogSnapshot`] after every tick.
    pub fn subscribe(&self) -> watch::Receiver<WatchdogSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Decide what the monitor would do at `now`, without side effects.
    pub fn evaluate(&self, now: Instant) -> WatchdogStatus {
        if self.registry.since_last(now) < self.policy.ttl {
            return WatchdogStatus::Healthy;
        }

        let window_open = |since: Option<Instant>, interval: Duration| {
            since.map_or(true, |t| now.saturating_duration_since(t) >= interval)
        };

        let resend_open = window_open(self.state.last_sent, self.policy.resend_interval);
        let reattempt_open =
            window_open(self.state.last_attempt, self.policy.effective_reattempt());

        if resend_open && reattempt_open {
            WatchdogStatus::Eligible
        } else {
            WatchdogStatus::Throttled
        }
    }

    /// Run one tick of the state machine at `now`.
    pub async fn poll(&mut self, now: Instant) -> TickOutcome {
        let since_last = self.registry.since_last(now);
        let status = self.evaluate(now);

        let outcome = match status {
            WatchdogStatus::Healthy => {
                if self.state.expired {
                    tracing::info!(
                        since_last_ms = saturating_millis(since_last),
                        "Heartbeat restored, watchdog healthy again"
                    );
                }
                self.state.expired = false;
                TickOutcome::Healthy
            }
            WatchdogStatus::Throttled => {
                self.mark_expired(since_last);
                tracing::trace!("Watchdog expired, alert throttled");
                TickOutcome::Throttled
            }
            WatchdogStatus::Eligible => {
                self.mark_expired(since_last);
                self.attempt(now, since_last).await
            }
        };

        self.snapshot.expired = self.state.expired;
        self.snapshot.since_last_heartbeat = since_last;
        self.snapshot_tx.send_replace(self.snapshot.clone());

        outcome
    }

    /// Drive [`poll`](Self::poll) every `policy.tick` until `cancel` fires.
    ///
    /// A pending notify attempt is abandoned on cancellation.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            notifier = self.notifier.name(),
            ttl_secs = self.policy.ttl.as_secs(),
            resend_secs = self.policy.resend_interval.as_secs(),
            reattempt_secs = self.policy.reattempt_interval.map(|d| d.as_secs()),
            tick_ms = saturating_millis(self.policy.tick),
            "Watchdog monitor started"
        );

        let mut interval = tokio::time::interval(self.policy.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let now = Instant::now();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!("Watchdog stopping mid-tick");
                    break;
                }
                _ = self.poll(now) => {}
            }
        }

        tracing::info!("Watchdog monitor stopped");
    }

    fn mark_expired(&mut self, since_last: Duration) {
        if !self.state.expired {
            tracing::warn!(
                since_last_secs = since_last.as_secs(),
                ttl_secs = self.policy.ttl.as_secs(),
                "Heartbeat expired"
            );
            self.state.expired = true;
        }
    }

    async fn attempt(&mut self, now: Instant, since_last: Duration) -> TickOutcome {
        // Recorded before dispatch so a slow notifier cannot be re-triggered.
        self.state.last_attempt = Some(now);
        self.snapshot.last_attempt_at = Some(Utc::now());

        tracing::warn!(
            notifier = self.notifier.name(),
            since_last_secs = since_last.as_secs(),
            "Heartbeat missing, sending alert"
        );

        match self.notifier.attempt().await {
            Ok(()) => {
                self.state.last_sent = Some(now);
                self.snapshot.last_alert_at = Some(Utc::now());
                self.snapshot.alerts_sent += 1;
                self.snapshot.consecutive_failures = 0;
                tracing::info!(notifier = self.notifier.name(), "Alert sent");
                TickOutcome::Sent
            }
            Err(e) => {
                self.snapshot.consecutive_failures += 1;
                tracing::error!(
                    notifier = self.notifier.name(),
                    error = %e,
                    consecutive_failures = self.snapshot.consecutive_failures,
                    "Error sending alert"
                );
                TickOutcome::Failed
            }
        }
    }
}
