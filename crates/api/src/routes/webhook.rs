//! Alertmanager webhook receiver.
//!
//! A qualifying payload (see [`HeartbeatMatcher`](deadman_core::HeartbeatMatcher))
//! resets the watchdog. Anything else that parses is acknowledged and
//! ignored; a body that does not parse is rejected with 400 and leaves the
//! watchdog untouched.

use axum::body::Bytes;
use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::Serialize;

use deadman_core::WebhookMessage;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Acknowledgement returned to the sender.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// Whether the payload reset the watchdog.
    pub reset: bool,
}

/// POST /webhook
async fn receive_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<DataResponse<WebhookAck>>> {
    let message = WebhookMessage::from_slice(&body).inspect_err(|e| {
        tracing::warn!(error = %e, "Rejected malformed webhook payload");
    })?;

    let reset = state.matcher.qualifies(&message);
    if reset {
        state.registry.record_now();
        tracing::info!(
            external_url = %message.external_url,
            receiver = %message.receiver,
            alerts = message.alerts.len(),
            "Got heartbeat; reset watchdog"
        );
    } else {
        tracing::debug!(
            matcher = %state.matcher,
            alerts = message.alerts.len(),
            "Got webhook without a heartbeat alert"
        );
    }

    Ok(Json(DataResponse {
        data: WebhookAck { reset },
    }))
}

/// Mount the webhook receiver.
pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(receive_webhook))
}
