//! In-process implementation of PaymentStore.
//!
//! Used for local development (`PAYMENT_STORE=memory`) and tests. The key
//! check and the insert happen under one write lock, which gives the same
//! winner/loser semantics as the unique index in Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{NewPayment, Payment, Product};
use crate::ports::{legacy_key, Page, PaymentStore, RecordOutcome, StoreResult};

#[derive(Default)]
pub struct MemoryPaymentStore {
    rows: RwLock<Vec<Payment>>,
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row as-is, bypassing dedup. Mirrors rows written before
    /// transaction keys existed.
    pub async fn insert_raw(&self, payment: Payment) {
        self.rows.write().await.push(payment);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

fn newest_first(rows: &mut [Payment]) {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn find_by_key(&self, transaction_key: &str) -> StoreResult<Option<Payment>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .find(|p| p.transaction_key.as_deref() == Some(transaction_key))
            .cloned())
    }

    async fn find_latest_matching(
        &self,
        buyer_email: &str,
        product: &Product,
    ) -> StoreResult<Option<Payment>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|p| p.matches(buyer_email, product))
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn record_if_new(&self, payment: &NewPayment) -> StoreResult<RecordOutcome> {
        let mut rows = self.rows.write().await;

        if let Some(existing) = rows
            .iter()
            .find(|p| p.transaction_key.as_deref() == Some(payment.transaction_key.as_str()))
        {
            return Ok(RecordOutcome::AlreadyExists(existing.clone()));
        }

        let inserted = payment.clone().into_payment();
        rows.push(inserted.clone());
        Ok(RecordOutcome::Inserted(inserted))
    }

    async fn list(&self, page: Option<Page>) -> StoreResult<Vec<Payment>> {
        let mut rows = self.rows.read().await.clone();
        newest_first(&mut rows);

        Ok(match page {
            Some(page) => rows
                .into_iter()
                .skip(page.offset.max(0) as usize)
                .take(page.limit.max(0) as usize)
                .collect(),
            None => rows,
        })
    }

    async fn list_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Payment>> {
        let mut rows: Vec<Payment> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|p| p.created_at >= since)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> StoreResult<u64> {
        let doomed: HashSet<&Uuid> = ids.iter().collect();
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|p| !doomed.contains(&p.id));
        Ok((before - rows.len()) as u64)
    }

    async fn backfill_missing_keys(&self) -> StoreResult<u64> {
        let mut rows = self.rows.write().await;
        let mut updated = 0;
        for row in rows.iter_mut().filter(|p| p.transaction_key.is_none()) {
            row.transaction_key = Some(legacy_key(row.id));
            updated += 1;
        }
        Ok(updated)
    }
}
