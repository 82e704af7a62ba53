//! Deadman webhook service library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! notifier, background watchdog task) so integration tests and the binary
//! entrypoint can both access them.

pub mod background;
pub mod config;
pub mod error;
pub mod notifier;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
