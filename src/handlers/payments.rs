use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{CompletionSignal, Payment};
use crate::error::AppError;
use crate::gateway::CheckoutRequest;
use crate::ports::Page;
use crate::use_cases::{PaymentDecision, RecordPayment};
use crate::validation::{self, BuyerInput, ProductInput};
use crate::AppState;

const DEFAULT_PAGE_LIMIT: i64 = 50;
const MAX_PAGE_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSuccessRequest {
    #[serde(alias = "sessionId")]
    pub transaction_key: Option<String>,
    pub user: Option<BuyerInput>,
    pub product: Option<ProductInput>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSuccessResponse {
    pub message: String,
    pub payment_id: Uuid,
}

impl From<&PaymentDecision> for PaymentSuccessResponse {
    fn from(decision: &PaymentDecision) -> Self {
        Self {
            message: decision.message().to_string(),
            payment_id: decision.payment().id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    fn page(&self) -> Option<Page> {
        if self.limit.is_none() && self.offset.is_none() {
            return None;
        }

        Some(Page {
            limit: self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
            offset: self.offset.unwrap_or(0).max(0),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionRequest {
    pub product: Option<ProductInput>,
    pub user: Option<BuyerInput>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionResponse {
    pub id: String,
    pub url: String,
    pub publishable_key: Option<String>,
}

/// Runs the recording decision on its own task so it finishes even when the
/// requesting connection is dropped mid-flight.
pub(crate) async fn record_detached(
    recorder: &RecordPayment,
    signal: CompletionSignal,
) -> Result<PaymentDecision, AppError> {
    let recorder = recorder.clone();
    let decision = tokio::spawn(async move { recorder.execute(signal).await })
        .await
        .map_err(|e| AppError::Internal(format!("recording task failed: {}", e)))??;

    Ok(decision)
}

pub async fn payment_success(
    State(state): State<AppState>,
    payload: Result<Json<PaymentSuccessRequest>, JsonRejection>,
) -> Result<Json<PaymentSuccessResponse>, AppError> {
    let Json(request) = payload?;
    let signal = validation::completion_signal(request.transaction_key, request.user, request.product)?;

    let decision = record_detached(&state.recorder, signal).await?;

    Ok(Json(PaymentSuccessResponse::from(&decision)))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let payments = state.store.list(pagination.page()).await?;
    Ok(Json(payments))
}

pub async fn create_checkout_session(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutSessionRequest>, JsonRejection>,
) -> Result<Json<CheckoutSessionResponse>, AppError> {
    let Json(request) = payload?;
    let product = validation::checkout_product(request.product)?;

    let gateway = state
        .gateway
        .as_ref()
        .ok_or_else(|| AppError::GatewayUnavailable("STRIPE_SECRET_KEY not set".to_string()))?;

    let user = request.user.unwrap_or_default();
    let optional = |value: Option<String>| {
        value
            .map(|v| validation::sanitize_string(&v))
            .filter(|v| !v.is_empty())
    };
    let checkout = CheckoutRequest {
        product,
        buyer_name: optional(user.name),
        buyer_email: optional(user.email),
    };

    let session = gateway.create_checkout(&checkout).await?;

    Ok(Json(CheckoutSessionResponse {
        id: session.transaction_handle,
        url: session.client_reference,
        publishable_key: state.settings.publishable_key.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_absent_lists_everything() {
        let pagination = Pagination {
            limit: None,
            offset: None,
        };
        assert_eq!(pagination.page(), None);
    }

    #[test]
    fn test_pagination_is_clamped() {
        let pagination = Pagination {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(
            pagination.page(),
            Some(Page {
                limit: MAX_PAGE_LIMIT,
                offset: 0
            })
        );
    }

    #[test]
    fn test_session_id_alias_is_accepted() {
        let request: PaymentSuccessRequest = serde_json::from_str(
            r#"{"sessionId":"cs_1","user":{"name":"Asha","email":"a@example.com"},"product":{"name":"Plan","price":999}}"#,
        )
        .unwrap();
        assert_eq!(request.transaction_key.as_deref(), Some("cs_1"));
    }
}
