use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use uuid::Uuid;

use crate::utils::sanitize::loggable_body;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Upper bound on a body buffered for logging.
const MAX_BUFFERED_BODY: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogSettings {
    pub log_body: bool,
}

pub async fn request_logger_middleware(
    State(settings): State<RequestLogSettings>,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let header_value = HeaderValue::from_str(&request_id).ok();
    if let Some(value) = &header_value {
        req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
    }

    if settings.log_body {
        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, MAX_BUFFERED_BODY).await {
            Ok(bytes) => bytes,
            Err(_) => {
                tracing::warn!(
                    request_id = %request_id,
                    method = %method,
                    uri = %uri,
                    "Request body too large or failed to read"
                );
                return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
            }
        };

        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            body_size = bytes.len(),
            body = %loggable_body(&bytes),
            "Incoming request"
        );

        req = Request::from_parts(parts, Body::from(bytes));
    } else {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            "Incoming request"
        );
    }

    let response = next.run(req).await;

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status().as_u16(),
        latency_ms = start.elapsed().as_millis(),
        "Outgoing response"
    );

    let (mut parts, body) = response.into_parts();
    if let Some(value) = header_value {
        parts.headers.insert(REQUEST_ID_HEADER, value);
    }

    Response::from_parts(parts, body)
}
