//! Background tasks.
//!
//! Each submodule spawns a long-running task that accepts a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) for graceful
//! shutdown.

pub mod watchdog;
