//! Paystack webhook endpoint.
//!
//! The webhook is the settlement path that does not depend on the customer's
//! browser coming back from the gateway. Events are authenticated by the
//! HMAC signature header; the settlement itself goes through the same
//! idempotent path as client-driven verification, so double delivery is
//! harmless.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::gateway::signature::validate_webhook;

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

const CHARGE_SUCCESS: &str = "charge.success";

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    event: String,
    #[serde(default)]
    data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    #[serde(default)]
    reference: Option<String>,
}

fn ack() -> axum::response::Response {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
}

/// POST /webhooks/paystack
pub async fn handle_paystack_webhook(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    body: String,
) -> impl IntoResponse {
    info!("Received webhook");

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let Some(signature) = signature else {
        warn!("Missing webhook signature");
        return (StatusCode::UNAUTHORIZED, "Missing signature").into_response();
    };

    // The signature is checked against whichever secret is active right now,
    // matching the key the gateway signed with.
    let secret = match state.orders.resolve_gateway_secret().await {
        Ok(secret) => secret,
        Err(e) => {
            error!(error = %e, "Cannot resolve gateway secret for webhook validation");
            return (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable").into_response();
        }
    };

    if !validate_webhook(&secret, &signature, body.as_bytes()) {
        warn!("Invalid webhook signature");
        return (StatusCode::UNAUTHORIZED, "Invalid signature").into_response();
    }

    let event: WebhookEvent = match serde_json::from_str(&body) {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "Invalid JSON payload");
            return (StatusCode::BAD_REQUEST, "Invalid JSON").into_response();
        }
    };

    if event.event != CHARGE_SUCCESS {
        info!(event = %event.event, "Ignoring webhook event");
        return ack();
    }

    let Some(reference) = event.data.and_then(|d| d.reference) else {
        warn!("charge.success event without a transaction reference");
        return ack();
    };

    // Processing failures are acknowledged so the gateway does not retry a
    // payload we will never be able to apply; the log line carries the story.
    match state.orders.settle_by_reference(&reference).await {
        Ok(summary) => {
            info!(reference = %reference, summary = ?summary, "Webhook processed successfully");
            ack()
        }
        Err(e) => {
            error!(reference = %reference, error = %e, "Webhook settlement failed");
            ack()
        }
    }
}
