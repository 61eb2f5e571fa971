use axum::{extract::State, Json};
use bigdecimal::BigDecimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Buyer, NewPayment, Product};
use crate::error::AppError;
use crate::services::NotificationError;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub message: String,
    pub scanned: usize,
    pub deleted_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillResponse {
    pub message: String,
    pub updated_payments: u64,
}

#[derive(Debug, Serialize)]
pub struct TestEmailResponse {
    pub message: String,
    pub recipient: String,
}

pub async fn cleanup_duplicates(State(state): State<AppState>) -> Result<Json<CleanupResponse>, AppError> {
    let report = state.reconciliation.cleanup_duplicates().await?;

    Ok(Json(CleanupResponse {
        message: format!("Removed {} duplicate payments", report.deleted_ids.len()),
        scanned: report.scanned,
        deleted_ids: report.deleted_ids,
    }))
}

pub async fn backfill_keys(State(state): State<AppState>) -> Result<Json<BackfillResponse>, AppError> {
    let updated = state.reconciliation.backfill_legacy_keys().await?;

    Ok(Json(BackfillResponse {
        message: format!("Assigned transaction keys to {} legacy payments", updated),
        updated_payments: updated,
    }))
}

/// Sends a sample notification synchronously. Nothing is stored.
pub async fn test_email(State(state): State<AppState>) -> Result<Json<TestEmailResponse>, AppError> {
    let recipient = state
        .notifier
        .recipient()
        .map(str::to_string)
        .ok_or_else(|| AppError::NotConfigured("ADMIN_EMAIL not set".to_string()))?;

    let now = state.clock.now();
    let sample = NewPayment::new(
        format!("test_{}", now.timestamp_millis()),
        Buyer {
            name: "Test Customer".to_string(),
            email: "test@example.com".to_string(),
        },
        Product {
            name: "Test Product".to_string(),
            price: BigDecimal::from(1),
        },
        now,
    )
    .into_payment();

    match state.notifier.notify(&sample).await {
        Ok(()) => {
            tracing::info!(recipient = %recipient, "test email sent");
            Ok(Json(TestEmailResponse {
                message: "Test email sent".to_string(),
                recipient,
            }))
        }
        Err(NotificationError::NotConfigured(reason)) => Err(AppError::NotConfigured(reason)),
        Err(e) => Err(AppError::Internal(format!("test email failed: {}", e))),
    }
}
