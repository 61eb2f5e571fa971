//! Payment domain entities.
//! Framework-agnostic representation of a recorded purchase.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buyer {
    pub name: String,
    pub email: String,
}

/// What was bought, priced in the store's base currency unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub name: String,
    pub price: BigDecimal,
}

/// A validated "payment completed" report.
///
/// `transaction_key` is the externally issued handle (checkout session id)
/// when the reporter supplied one.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    pub transaction_key: Option<String>,
    pub buyer: Buyer,
    pub product: Product,
}

/// Durable record of one real-world transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub transaction_key: Option<String>,
    pub buyer_name: String,
    pub buyer_email: String,
    pub product_name: String,
    pub product_price: BigDecimal,
    pub created_at: DateTime<Utc>,
}

/// A payment that has passed deduplication and is about to be inserted.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub id: Uuid,
    pub transaction_key: String,
    pub buyer: Buyer,
    pub product: Product,
    pub created_at: DateTime<Utc>,
}

impl NewPayment {
    pub fn new(transaction_key: String, buyer: Buyer, product: Product, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_key,
            buyer,
            product,
            created_at,
        }
    }

    pub fn into_payment(self) -> Payment {
        Payment {
            id: self.id,
            transaction_key: Some(self.transaction_key),
            buyer_name: self.buyer.name,
            buyer_email: self.buyer.email,
            product_name: self.product.name,
            product_price: self.product.price,
            created_at: self.created_at,
        }
    }
}

impl Payment {
    /// True when this record was bought by the same buyer, for the same
    /// product, at the same price.
    pub fn matches(&self, buyer_email: &str, product: &Product) -> bool {
        self.buyer_email == buyer_email
            && self.product_name == product.name
            && self.product_price == product.price
    }
}
