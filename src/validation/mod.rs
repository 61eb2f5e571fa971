use bigdecimal::BigDecimal;
use serde::Deserialize;
use std::fmt;

use crate::domain::{Buyer, CompletionSignal, Product};

pub const NAME_MAX_LEN: usize = 255;
pub const EMAIL_MAX_LEN: usize = 255;
pub const TRANSACTION_KEY_MAX_LEN: usize = 255;

/// Prices are stored with two decimal places.
pub const PRICE_SCALE: i64 = 2;
/// Exclusive upper bound on a price, in base units (`NUMERIC(12, 2)`).
pub const PRICE_LIMIT: i64 = 10_000_000_000;

/// Buyer identity as reported by an untrusted client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuyerInput {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Product descriptor as reported by an untrusted client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductInput {
    pub name: Option<String>,
    pub price: Option<BigDecimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_non_negative_amount(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount < &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must not be negative"));
    }

    Ok(())
}

pub fn validate_positive_amount(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }

    Ok(())
}

pub fn validate_price_limit(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount >= &BigDecimal::from(PRICE_LIMIT) {
        return Err(ValidationError::new(
            field,
            format!("must be less than {}", PRICE_LIMIT),
        ));
    }

    Ok(())
}

/// Rounds a non-negative price half up to [`PRICE_SCALE`] decimal places, so
/// the amount compared, fingerprinted and stored is the same value.
pub fn normalize_price(price: &BigDecimal) -> BigDecimal {
    let half = BigDecimal::new(5.into(), PRICE_SCALE + 1);
    (price + half).with_scale(PRICE_SCALE)
}

fn required_price(field: &'static str, price: Option<BigDecimal>) -> Result<BigDecimal, ValidationError> {
    let price = price.ok_or_else(|| ValidationError::new(field, "is required"))?;
    validate_non_negative_amount(field, &price)?;
    let price = normalize_price(&price);
    validate_price_limit(field, &price)?;
    Ok(price)
}

fn required_text(
    field: &'static str,
    value: Option<&str>,
    max_len: usize,
) -> Result<String, ValidationError> {
    let value = sanitize_string(value.unwrap_or_default());
    validate_required(field, &value)?;
    validate_max_len(field, &value, max_len)?;
    Ok(value)
}

/// Validates a completion report. Names and emails are checked for presence
/// only; the price must be a non-negative amount below [`PRICE_LIMIT`] and is
/// rounded to [`PRICE_SCALE`] places.
pub fn completion_signal(
    transaction_key: Option<String>,
    user: Option<BuyerInput>,
    product: Option<ProductInput>,
) -> Result<CompletionSignal, ValidationError> {
    let user = user.ok_or_else(|| ValidationError::new("user", "is required"))?;
    let product = product.ok_or_else(|| ValidationError::new("product", "is required"))?;

    let buyer = Buyer {
        name: required_text("user.name", user.name.as_deref(), NAME_MAX_LEN)?,
        email: required_text("user.email", user.email.as_deref(), EMAIL_MAX_LEN)?,
    };

    let price = required_price("product.price", product.price)?;

    let product = Product {
        name: required_text("product.name", product.name.as_deref(), NAME_MAX_LEN)?,
        price,
    };

    let transaction_key = transaction_key
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty());
    if let Some(key) = &transaction_key {
        validate_max_len("transactionKey", key, TRANSACTION_KEY_MAX_LEN)?;
    }

    Ok(CompletionSignal {
        transaction_key,
        buyer,
        product,
    })
}

/// Validates the product of a checkout request. Unlike completion reports,
/// the gateway refuses free items, so the price must be positive.
pub fn checkout_product(product: Option<ProductInput>) -> Result<Product, ValidationError> {
    let product = product.ok_or_else(|| ValidationError::new("product", "is required"))?;
    let name = required_text("product.name", product.name.as_deref(), NAME_MAX_LEN)?;
    let price = required_price("product.price", product.price)?;
    validate_positive_amount("product.price", &price)?;

    Ok(Product { name, price })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn buyer() -> Option<BuyerInput> {
        Some(BuyerInput {
            name: Some("Asha Rao".to_string()),
            email: Some("asha@example.com".to_string()),
        })
    }

    fn product(price: &str) -> Option<ProductInput> {
        Some(ProductInput {
            name: Some("Asmi Premium Plan".to_string()),
            price: Some(BigDecimal::from_str(price).expect("valid decimal")),
        })
    }

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn accepts_complete_signal() {
        let signal = completion_signal(Some(" cs_123 ".to_string()), buyer(), product("999")).unwrap();
        assert_eq!(signal.transaction_key.as_deref(), Some("cs_123"));
        assert_eq!(signal.buyer.name, "Asha Rao");
        assert_eq!(signal.product.price, BigDecimal::from(999));
    }

    #[test]
    fn blank_key_is_treated_as_absent() {
        let signal = completion_signal(Some("   ".to_string()), buyer(), product("1")).unwrap();
        assert!(signal.transaction_key.is_none());
    }

    #[test]
    fn rejects_missing_buyer_or_product() {
        assert_eq!(
            completion_signal(None, None, product("1")).unwrap_err().field,
            "user"
        );
        assert_eq!(
            completion_signal(None, buyer(), None).unwrap_err().field,
            "product"
        );
    }

    #[test]
    fn rejects_empty_email() {
        let user = Some(BuyerInput {
            name: Some("Asha".to_string()),
            email: Some("  ".to_string()),
        });
        let err = completion_signal(None, user, product("1")).unwrap_err();
        assert_eq!(err.field, "user.email");
    }

    #[test]
    fn rejects_negative_price_but_allows_zero() {
        assert!(completion_signal(None, buyer(), product("-1")).is_err());
        assert!(completion_signal(None, buyer(), product("0")).is_ok());
    }

    #[test]
    fn checkout_requires_positive_price() {
        assert!(checkout_product(product("0")).is_err());
        assert!(checkout_product(product("499.50")).is_ok());
        assert!(checkout_product(None).is_err());
    }

    #[test]
    fn price_is_rounded_half_up_to_cents() {
        let signal = completion_signal(None, buyer(), product("999.999")).unwrap();
        assert_eq!(signal.product.price, BigDecimal::from(1000));
        assert_eq!(signal.product.price.to_string(), "1000.00");

        let signal = completion_signal(None, buyer(), product("10.005")).unwrap();
        assert_eq!(signal.product.price.to_string(), "10.01");

        let signal = completion_signal(None, buyer(), product("10.004")).unwrap();
        assert_eq!(signal.product.price.to_string(), "10.00");
    }

    #[test]
    fn float_noise_collapses_to_one_price() {
        let a = completion_signal(None, buyer(), product("19.990000000000002")).unwrap();
        let b = completion_signal(None, buyer(), product("19.99")).unwrap();
        assert_eq!(a.product.price, b.product.price);
    }

    #[test]
    fn rejects_price_at_storage_limit() {
        let err = completion_signal(None, buyer(), product("10000000000")).unwrap_err();
        assert_eq!(err.field, "product.price");
        assert!(completion_signal(None, buyer(), product("9999999999.99")).is_ok());
        // rounds up past the limit
        assert!(completion_signal(None, buyer(), product("9999999999.995")).is_err());
        assert!(checkout_product(product("10000000000")).is_err());
    }

    #[test]
    fn checkout_rejects_price_rounding_to_zero() {
        assert!(checkout_product(product("0.004")).is_err());
    }
}
