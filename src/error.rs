use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::ports::StoreError;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotConfigured(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Store(_) => "Store error",
            AppError::Validation(_) => "Validation error",
            AppError::GatewayUnavailable(_) => "Payment gateway unavailable",
            AppError::NotConfigured(_) => "Not configured",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Internal(_) => "Internal server error",
        }
    }

    fn details(&self) -> String {
        match self {
            AppError::Store(e) => e.to_string(),
            AppError::Validation(msg)
            | AppError::GatewayUnavailable(msg)
            | AppError::NotConfigured(msg)
            | AppError::Unauthorized(msg)
            | AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidAmount(_) => AppError::Validation(err.to_string()),
            _ => AppError::GatewayUnavailable(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = Json(json!({
            "error": self.kind(),
            "details": self.details(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::from(ValidationError::new("user.email", "must not be empty"));
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.details(), "user.email: must not be empty");
    }

    #[test]
    fn test_store_error_status_code() {
        let error = AppError::from(StoreError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_gateway_errors_map_to_unavailable() {
        let open = AppError::from(GatewayError::CircuitBreakerOpen("open".to_string()));
        assert_eq!(open.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let rejected = AppError::from(GatewayError::Rejected {
            status: 402,
            body: "card declined".to_string(),
        });
        assert_eq!(rejected.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let amount = AppError::from(GatewayError::InvalidAmount("1e30".to_string()));
        assert_eq!(amount.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_configured_status_code() {
        let error = AppError::NotConfigured("ADMIN_EMAIL not set".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unauthorized_error_status_code() {
        let error = AppError::Unauthorized("signature mismatch".to_string());
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_error_response_body_shape() {
        let error = AppError::Internal("recording task aborted".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["details"], "recording task aborted");
    }
}
