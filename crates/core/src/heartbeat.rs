//! Shared record of the most recent qualifying heartbeat.
//!
//! [`HeartbeatRegistry`] is designed to be shared via `Arc<HeartbeatRegistry>`
//! between every ingestion handler (many writers) and the watchdog monitor
//! (one reader). It holds no business logic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Lock-free holder of the last heartbeat instant.
///
/// The instant is stored as nanoseconds elapsed since `base`, the moment the
/// registry was created. A fresh registry therefore reports its own
/// construction time as the last heartbeat, which gives a newly started
/// watchdog a full TTL of grace before it can fire.
///
/// Writes go through `fetch_max`, so the stored value never moves backwards
/// even when concurrent writers race.
#[derive(Debug)]
pub struct HeartbeatRegistry {
    base: Instant,
    last_offset_nanos: AtomicU64,
    count: AtomicU64,
}

impl HeartbeatRegistry {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            last_offset_nanos: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a heartbeat at the current instant.
    pub fn record_now(&self) {
        self.record_at(Instant::now());
    }

    /// Record a heartbeat observed at `at`.
    ///
    /// An `at` older than the stored value leaves it unchanged.
    pub(crate) fn record_at(&self, at: Instant) {
        let offset = to_nanos(at.saturating_duration_since(self.base));
        self.last_offset_nanos.fetch_max(offset, Ordering::SeqCst);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Instant of the most recent heartbeat (or construction time if none).
    pub fn last_received(&self) -> Instant {
        let offset = self.last_offset_nanos.load(Ordering::SeqCst);
        self.base + Duration::from_nanos(offset)
    }

    /// Time elapsed between the last heartbeat and `now`, zero if `now` is
    /// earlier.
    pub fn since_last(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_received())
    }

    /// Number of heartbeats recorded since construction.
    pub fn heartbeat_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for HeartbeatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Saturate at `u64::MAX` nanoseconds (~584 years of uptime).
fn to_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
