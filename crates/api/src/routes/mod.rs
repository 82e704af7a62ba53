//! HTTP routes.
//!
//! ```text
//! GET  /health     watchdog status
//! POST /webhook    Alertmanager heartbeat receiver
//! ```

pub mod health;
pub mod webhook;
