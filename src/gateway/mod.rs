//! Checkout gateway boundary.
//!
//! The gateway issues the transaction handle (checkout session id) that
//! clients later send back as `transactionKey` with their completion report.

pub mod stripe;
pub mod webhook;

use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use thiserror::Error;

use crate::domain::Product;

pub use stripe::StripeGateway;

/// Minor units per base currency unit (paise per rupee, cents per dollar).
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("gateway rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub product: Product,
    pub buyer_name: Option<String>,
    pub buyer_email: Option<String>,
}

/// What the client needs to continue to the hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Unique per checkout attempt; becomes the `transaction_key`.
    pub transaction_handle: String,
    pub client_reference: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayError>;
}

/// Converts a non-negative base-unit price to integral minor units,
/// rounding half up.
pub fn to_minor_units(price: &BigDecimal) -> Result<i64, GatewayError> {
    if price < &BigDecimal::from(0) {
        return Err(GatewayError::InvalidAmount(price.to_string()));
    }

    let half = BigDecimal::new(5.into(), 1);
    (price * BigDecimal::from(MINOR_UNITS_PER_MAJOR) + half)
        .with_scale(0)
        .to_i64()
        .ok_or_else(|| GatewayError::InvalidAmount(price.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn minor(price: &str) -> i64 {
        to_minor_units(&BigDecimal::from_str(price).unwrap()).unwrap()
    }

    #[test]
    fn test_to_minor_units_scales_by_hundred() {
        assert_eq!(minor("999"), 99_900);
        assert_eq!(minor("499.5"), 49_950);
    }

    #[test]
    fn test_to_minor_units_rounds_to_nearest() {
        assert_eq!(minor("10.005"), 1_001);
        assert_eq!(minor("10.004"), 1_000);
        assert_eq!(minor("0.019"), 2);
    }

    #[test]
    fn test_to_minor_units_rejects_negative() {
        let err = to_minor_units(&BigDecimal::from(-1)).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidAmount(_)));
    }
}
