//! End-to-end timing tests for `WatchdogMonitor::run`.
//!
//! All tests run on tokio's paused clock, so the monitor's interval and the
//! notifier's sleeps advance virtual time only. Attempt times are recorded
//! relative to the moment the registry was created.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use deadman_core::{HeartbeatRegistry, NotifyError, Notifier, WatchdogMonitor, WatchdogPolicy};

// ---------------------------------------------------------------------------
// Scripted notifier
// ---------------------------------------------------------------------------

/// Notifier that records when it was called and how many calls overlapped.
struct ScriptedNotifier {
    start: Instant,
    delay: Duration,
    /// Number of initial attempts that fail; `usize::MAX` means always.
    failures: usize,
    attempts: Mutex<Vec<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedNotifier {
    fn new(start: Instant) -> Self {
        Self {
            start,
            delay: Duration::ZERO,
            failures: 0,
            attempts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn failing(mut self, failures: usize) -> Self {
        self.failures = failures;
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn attempts(&self) -> Vec<Duration> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for ScriptedNotifier {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn attempt(&self) -> Result<(), NotifyError> {
        let n = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(Instant::now() - self.start);
            attempts.len()
        };

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if n <= self.failures {
            Err(NotifyError::Rejected(format!("attempt {n} scripted to fail")))
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn policy(ttl: u64, resend: u64, reattempt: Option<u64>) -> WatchdogPolicy {
    WatchdogPolicy {
        ttl: secs(ttl),
        resend_interval: secs(resend),
        reattempt_interval: reattempt.map(secs),
        tick: secs(1),
    }
}

/// Run the monitor for `duration` of virtual time, then cancel it.
async fn run_for(
    registry: Arc<HeartbeatRegistry>,
    notifier: Arc<ScriptedNotifier>,
    policy: WatchdogPolicy,
    duration: Duration,
) {
    let monitor = WatchdogMonitor::new(registry, notifier, policy).expect("valid policy");
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(monitor.run(cancel.clone()));

    tokio::time::sleep(duration).await;
    cancel.cancel();
    handle.await.expect("monitor task panicked");
}

/// Assert that `actual` lies within one tick of `expected_secs`.
fn assert_near(actual: Duration, expected_secs: u64) {
    let expected = secs(expected_secs);
    let slack = Duration::from_millis(1_100);
    assert!(
        actual + Duration::from_millis(10) >= expected && actual <= expected + slack,
        "attempt at {actual:?}, expected ~{expected:?}"
    );
}

// ---------------------------------------------------------------------------
// Test: no alert before the TTL has elapsed since start
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn grace_period_at_start() {
    let registry = Arc::new(HeartbeatRegistry::new());
    let notifier = Arc::new(ScriptedNotifier::new(Instant::now()));

    run_for(registry, Arc::clone(&notifier), policy(30, 900, Some(10)), secs(29)).await;

    assert!(notifier.attempts().is_empty());
}

// ---------------------------------------------------------------------------
// Test: expiry triggers one attempt, then throttles until resend
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn expiry_fires_once_then_waits_for_resend() {
    let registry = Arc::new(HeartbeatRegistry::new());
    let notifier = Arc::new(ScriptedNotifier::new(Instant::now()));

    run_for(
        registry,
        Arc::clone(&notifier),
        policy(5, 300, Some(10)),
        Duration::from_millis(320_500),
    )
    .await;

    let attempts = notifier.attempts();
    assert_eq!(attempts.len(), 2, "attempts: {attempts:?}");
    assert_near(attempts[0], 5);
    assert_near(attempts[1], 305);
}

// ---------------------------------------------------------------------------
// Test: a failing notifier is retried on the reattempt interval
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failing_notifier_retried_every_reattempt_interval() {
    let registry = Arc::new(HeartbeatRegistry::new());
    let notifier = Arc::new(ScriptedNotifier::new(Instant::now()).failing(usize::MAX));

    run_for(
        registry,
        Arc::clone(&notifier),
        policy(5, 300, Some(10)),
        Duration::from_millis(50_500),
    )
    .await;

    let attempts = notifier.attempts();
    assert_eq!(attempts.len(), 5, "attempts: {attempts:?}");
    for (attempt, expected) in attempts.iter().zip([5, 15, 25, 35, 45]) {
        assert_near(*attempt, expected);
    }
}

// ---------------------------------------------------------------------------
// Test: once a retry succeeds the resend interval takes over
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn success_after_failures_switches_to_resend_cadence() {
    let registry = Arc::new(HeartbeatRegistry::new());
    let notifier = Arc::new(ScriptedNotifier::new(Instant::now()).failing(2));

    run_for(
        registry,
        Arc::clone(&notifier),
        policy(5, 300, Some(10)),
        Duration::from_millis(100_500),
    )
    .await;

    let attempts = notifier.attempts();
    assert_eq!(attempts.len(), 3, "attempts: {attempts:?}");
    assert_near(attempts[2], 25);
}

// ---------------------------------------------------------------------------
// Test: a heartbeat before the TTL postpones expiry
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn heartbeat_before_ttl_postpones_expiry() {
    let registry = Arc::new(HeartbeatRegistry::new());
    let notifier = Arc::new(ScriptedNotifier::new(Instant::now()));

    let producer = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(3_500)).await;
            registry.record_now();
        })
    };

    run_for(
        Arc::clone(&registry),
        Arc::clone(&notifier),
        policy(5, 300, Some(10)),
        Duration::from_millis(12_500),
    )
    .await;
    producer.await.unwrap();

    let attempts = notifier.attempts();
    assert_eq!(attempts.len(), 1, "attempts: {attempts:?}");
    assert!(
        attempts[0] >= Duration::from_millis(8_500),
        "fired at {:?}, before ttl elapsed since the heartbeat",
        attempts[0]
    );
    assert_near(attempts[0], 9);
}

// ---------------------------------------------------------------------------
// Test: a slow notifier never overlaps with itself
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn slow_notifier_has_at_most_one_attempt_in_flight() {
    let registry = Arc::new(HeartbeatRegistry::new());
    let notifier = Arc::new(ScriptedNotifier::new(Instant::now()).slow(secs(3)));

    // Zero resend interval: eligible on every tick while expired.
    run_for(
        registry,
        Arc::clone(&notifier),
        policy(1, 0, None),
        Duration::from_millis(20_500),
    )
    .await;

    let attempts = notifier.attempts();
    assert!(attempts.len() >= 2, "attempts: {attempts:?}");
    assert_eq!(notifier.max_in_flight.load(Ordering::SeqCst), 1);
    for pair in attempts.windows(2) {
        assert!(pair[1] - pair[0] >= secs(3), "overlapping attempts: {attempts:?}");
    }
}

// ---------------------------------------------------------------------------
// Test: resend interval shorter than the tick alerts every tick
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn resend_shorter_than_tick_alerts_every_tick() {
    let registry = Arc::new(HeartbeatRegistry::new());
    let notifier = Arc::new(ScriptedNotifier::new(Instant::now()));

    run_for(
        registry,
        Arc::clone(&notifier),
        policy(2, 0, None),
        Duration::from_millis(6_500),
    )
    .await;

    let attempts = notifier.attempts();
    assert_eq!(attempts.len(), 5, "attempts: {attempts:?}");
    for (attempt, expected) in attempts.iter().zip([2, 3, 4, 5, 6]) {
        assert_near(*attempt, expected);
    }
}

// ---------------------------------------------------------------------------
// Test: cancellation does not wait for a hung notifier
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn cancel_abandons_hung_attempt() {
    let registry = Arc::new(HeartbeatRegistry::new());
    let notifier = Arc::new(ScriptedNotifier::new(Instant::now()).slow(secs(3_600)));

    let monitor =
        WatchdogMonitor::new(registry, notifier.clone(), policy(1, 300, Some(10))).unwrap();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(monitor.run(cancel.clone()));

    tokio::time::sleep(secs(5)).await;
    assert_eq!(notifier.in_flight.load(Ordering::SeqCst), 1);

    cancel.cancel();
    tokio::time::timeout(secs(1), handle)
        .await
        .expect("monitor did not stop promptly")
        .unwrap();

    assert_eq!(notifier.attempts().len(), 1);
}
