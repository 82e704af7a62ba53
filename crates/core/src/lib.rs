//! Heartbeat watchdog core.
//!
//! - [`HeartbeatRegistry`] -- shared "last heartbeat" instant, written by
//!   any number of ingestion handlers and read by the monitor.
//! - [`WatchdogMonitor`] -- periodic expiry check with resend / reattempt
//!   throttling around an injected [`Notifier`].
//! - [`alertmanager`] -- webhook payload model and the rule deciding which
//!   payloads count as a heartbeat.
//!
//! Nothing in this crate performs HTTP or spawns processes; those live in
//! `deadman-api`.

pub mod alertmanager;
pub mod error;
pub mod heartbeat;
pub mod notify;
pub mod watchdog;

pub use alertmanager::{HeartbeatMatcher, WebhookMessage};
pub use error::CoreError;
pub use heartbeat::HeartbeatRegistry;
pub use notify::{NotifyError, Notifier};
pub use watchdog::{TickOutcome, WatchdogMonitor, WatchdogPolicy, WatchdogSnapshot, WatchdogStatus};
