use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use deadman_core::watchdog::saturating_millis;
use deadman_core::WatchdogMonitor;

/// Spawn the watchdog monitor loop.
///
/// The task runs until `cancel` is triggered; an in-flight notify attempt is
/// dropped at that point, which kills a running notify program.
pub fn start(monitor: WatchdogMonitor, cancel: CancellationToken) -> JoinHandle<()> {
    if monitor.policy().tick_is_coarse() {
        tracing::warn!(
            tick_ms = saturating_millis(monitor.policy().tick),
            "Watchdog tick is more than a tenth of the shortest interval; \
             alert timing may drift by up to one tick"
        );
    }

    tokio::spawn(monitor.run(cancel))
}
