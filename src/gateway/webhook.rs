//! Stripe webhook signature verification and completion event parsing.

use bigdecimal::BigDecimal;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

use crate::validation::{BuyerInput, ProductInput};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum accepted age of a signed payload, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;
const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing or malformed signature header")]
    MalformedHeader,

    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
}

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>]`)
/// against the raw request body.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now_unix: i64) -> Result<(), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }

    let age = now_unix - timestamp;
    if age > SIGNATURE_TOLERANCE_SECS || age < -MAX_CLOCK_SKEW_SECS {
        return Err(WebhookError::StaleTimestamp);
    }

    let mut signed = timestamp.to_string().into_bytes();
    signed.push(b'.');
    signed.extend_from_slice(payload);

    for signature in signatures {
        let Ok(expected) = hex::decode(signature) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::MalformedHeader)?;
        mac.update(&signed);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(WebhookError::SignatureMismatch)
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    payment_status: Option<String>,
    customer_email: Option<String>,
    customer_details: Option<CustomerDetails>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CustomerDetails {
    email: Option<String>,
    name: Option<String>,
}

/// A paid checkout session, ready for validation into a completion signal.
#[derive(Debug, Clone)]
pub struct CompletedCheckout {
    pub event_id: String,
    pub session_id: String,
    pub buyer: BuyerInput,
    pub product: ProductInput,
}

/// Parses a verified event body. Returns `Ok(None)` for events that do not
/// represent a paid checkout.
pub fn parse_completed_checkout(payload: &[u8]) -> Result<Option<CompletedCheckout>, WebhookError> {
    let event: StripeEvent =
        serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    match event.event_type.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {}
        other => {
            tracing::debug!(event_id = %event.id, event_type = other, "ignoring webhook event");
            return Ok(None);
        }
    }

    let session: CheckoutSessionObject = serde_json::from_value(event.data.object)
        .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    if session.payment_status.as_deref().is_some_and(|status| status != "paid") {
        tracing::info!(
            event_id = %event.id,
            session_id = %session.id,
            payment_status = ?session.payment_status,
            "checkout completed without payment; waiting for async confirmation"
        );
        return Ok(None);
    }

    let details = session.customer_details.as_ref();
    let email = session
        .metadata
        .get("buyer_email")
        .cloned()
        .or(session.customer_email.clone())
        .or_else(|| details.and_then(|d| d.email.clone()));
    let name = session
        .metadata
        .get("buyer_name")
        .cloned()
        .or_else(|| details.and_then(|d| d.name.clone()));
    let price = session
        .metadata
        .get("product_price")
        .and_then(|raw| BigDecimal::from_str(raw).ok());

    Ok(Some(CompletedCheckout {
        event_id: event.id,
        product: ProductInput {
            name: session.metadata.get("product_name").cloned(),
            price,
        },
        buyer: BuyerInput { name, email },
        session_id: session.id,
    }))
}
