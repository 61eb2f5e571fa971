//! Storage port for payment records.
//!
//! The store is the only shared mutable resource in the service and the sole
//! arbiter of `transaction_key` uniqueness. Every implementation must make
//! [`PaymentStore::record_if_new`] a single atomic decision: two concurrent
//! calls with the same key never both insert.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{NewPayment, Payment, Product};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of an insert attempt. A duplicate is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Inserted(Payment),
    AlreadyExists(Payment),
}

impl RecordOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            RecordOutcome::Inserted(p) | RecordOutcome::AlreadyExists(p) => p,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, RecordOutcome::Inserted(_))
    }
}

/// Window into the newest-first listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Cheap reachability probe used by health checks.
    async fn ping(&self) -> StoreResult<()>;

    async fn find_by_key(&self, transaction_key: &str) -> StoreResult<Option<Payment>>;

    /// Most recent record for the same buyer, product and price.
    async fn find_latest_matching(
        &self,
        buyer_email: &str,
        product: &Product,
    ) -> StoreResult<Option<Payment>>;

    /// Insert unless a record with the same `transaction_key` exists, in which
    /// case the existing record is returned.
    async fn record_if_new(&self, payment: &NewPayment) -> StoreResult<RecordOutcome>;

    /// Records ordered by `created_at` descending. `None` returns everything.
    async fn list(&self, page: Option<Page>) -> StoreResult<Vec<Payment>>;

    /// Records created at or after `since`, oldest first.
    async fn list_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Payment>>;

    /// Administrative repair. Returns the number of rows removed.
    async fn delete_many(&self, ids: &[Uuid]) -> StoreResult<u64>;

    /// Administrative backfill: give every keyless legacy row the key
    /// `legacy_<id>`. Returns the number of rows updated.
    async fn backfill_missing_keys(&self) -> StoreResult<u64>;
}

/// Key used for rows that predate transaction keys.
pub fn legacy_key(id: Uuid) -> String {
    format!("legacy_{}", id)
}

/// Canonical textual form of a price so `999`, `999.0` and `999.00` compare
/// and group as one amount.
pub fn price_key(price: &BigDecimal) -> String {
    price.normalized().to_string()
}
