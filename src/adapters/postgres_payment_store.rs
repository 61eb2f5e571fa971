//! Postgres implementation of PaymentStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{NewPayment, Payment, Product};
use crate::ports::{Page, PaymentStore, RecordOutcome, StoreError, StoreResult};

const PAYMENT_COLUMNS: &str =
    "id, transaction_key, buyer_name, buyer_email, product_name, product_price, created_at";

/// Postgres-backed payment store. Uniqueness of `transaction_key` is enforced
/// by `idx_payments_transaction_key`, not by the caller's pre-checks.
#[derive(Clone)]
pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn existing_for(&self, transaction_key: &str) -> StoreResult<RecordOutcome> {
        self.find_by_key(transaction_key)
            .await?
            .map(RecordOutcome::AlreadyExists)
            .ok_or_else(|| StoreError::NotFound(transaction_key.to_string()))
    }
}

#[async_trait]
impl PaymentStore for PostgresPaymentStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_by_key(&self, transaction_key: &str) -> StoreResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE transaction_key = $1",
            PAYMENT_COLUMNS
        ))
        .bind(transaction_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PaymentRow::into_domain))
    }

    async fn find_latest_matching(
        &self,
        buyer_email: &str,
        product: &Product,
    ) -> StoreResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            SELECT {} FROM payments
            WHERE buyer_email = $1 AND product_name = $2 AND product_price = $3
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(buyer_email)
        .bind(&product.name)
        .bind(&product.price)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PaymentRow::into_domain))
    }

    async fn record_if_new(&self, payment: &NewPayment) -> StoreResult<RecordOutcome> {
        let inserted = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            INSERT INTO payments (
                id, transaction_key, buyer_name, buyer_email,
                product_name, product_price, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (transaction_key) DO NOTHING
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(payment.id)
        .bind(&payment.transaction_key)
        .bind(&payment.buyer.name)
        .bind(&payment.buyer.email)
        .bind(&payment.product.name)
        .bind(&payment.product.price)
        .bind(payment.created_at)
        .fetch_optional(&self.pool)
        .await;

        match inserted {
            Ok(Some(row)) => Ok(RecordOutcome::Inserted(row.into_domain())),
            // Lost the race: the conflicting row is committed by now.
            Ok(None) => self.existing_for(&payment.transaction_key).await,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                tracing::debug!(
                    transaction_key = %payment.transaction_key,
                    "unique violation on insert, treating as duplicate"
                );
                self.existing_for(&payment.transaction_key).await
            }
            Err(e) => Err(StoreError::from(e)),
        }
    }

    async fn list(&self, page: Option<Page>) -> StoreResult<Vec<Payment>> {
        let rows = match page {
            Some(page) => {
                sqlx::query_as::<_, PaymentRow>(&format!(
                    "SELECT {} FROM payments ORDER BY created_at DESC LIMIT $1 OFFSET $2",
                    PAYMENT_COLUMNS
                ))
                .bind(page.limit)
                .bind(page.offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, PaymentRow>(&format!(
                    "SELECT {} FROM payments ORDER BY created_at DESC",
                    PAYMENT_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(PaymentRow::into_domain).collect())
    }

    async fn list_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE created_at >= $1 ORDER BY created_at ASC, id ASC",
            PAYMENT_COLUMNS
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PaymentRow::into_domain).collect())
    }

    async fn delete_many(&self, ids: &[Uuid]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM payments WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn backfill_missing_keys(&self) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE payments SET transaction_key = 'legacy_' || id::text WHERE transaction_key IS NULL",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    transaction_key: Option<String>,
    buyer_name: String,
    buyer_email: String,
    product_name: String,
    product_price: bigdecimal::BigDecimal,
    created_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_domain(self) -> Payment {
        Payment {
            id: self.id,
            transaction_key: self.transaction_key,
            buyer_name: self.buyer_name,
            buyer_email: self.buyer_email,
            product_name: self.product_name,
            product_price: self.product_price,
            created_at: self.created_at,
        }
    }
}
