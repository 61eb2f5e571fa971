use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::gateway::webhook::{parse_completed_checkout, verify_signature, WebhookError, SIGNATURE_HEADER};
use crate::handlers::payments::record_detached;
use crate::validation;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<Uuid>,
}

/// Gateway-side completion callback. Shares the recording pipeline with the
/// client confirmation, keyed by the checkout session id.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let secret = state
        .settings
        .webhook_secret
        .as_deref()
        .ok_or_else(|| AppError::NotConfigured("STRIPE_WEBHOOK_SECRET not set".to_string()))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(WebhookError::MalformedHeader.to_string()))?;

    verify_signature(&body, signature, secret, state.clock.now().timestamp()).map_err(|e| {
        tracing::warn!(error = %e, "rejected webhook");
        AppError::Unauthorized(e.to_string())
    })?;

    let completed = match parse_completed_checkout(&body) {
        Ok(Some(completed)) => completed,
        Ok(None) => {
            return Ok(Json(WebhookAck {
                received: true,
                message: None,
                payment_id: None,
            }))
        }
        Err(e) => return Err(AppError::Validation(e.to_string())),
    };

    tracing::info!(
        event_id = %completed.event_id,
        session_id = %completed.session_id,
        "checkout completion received from gateway"
    );

    let signal = validation::completion_signal(
        Some(completed.session_id),
        Some(completed.buyer),
        Some(completed.product),
    )?;
    let decision = record_detached(&state.recorder, signal).await?;

    Ok(Json(WebhookAck {
        received: true,
        message: Some(decision.message().to_string()),
        payment_id: Some(decision.payment().id),
    }))
}
