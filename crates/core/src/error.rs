/// Domain errors raised by the watchdog core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Malformed heartbeat payload: {0}")]
    Decode(#[from] serde_json::Error),
}
