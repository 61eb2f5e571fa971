//! Administrative duplicate cleanup and legacy key backfill.
//!
//! Cleanup scans a bounded recent range, groups records by buyer email,
//! product name, price and a fixed-width time bucket, and deletes every
//! record but the oldest in each group. Buckets are aligned to the Unix
//! epoch, so re-running after a cleanup finds nothing further to delete.

use chrono::Duration;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::Payment;
use crate::ports::{price_key, PaymentStore, StoreResult};
use crate::utils::clock::Clock;

pub const DEFAULT_LOOKBACK_SECS: i64 = 5 * 60;
pub const DEFAULT_BUCKET_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationPolicy {
    pub lookback: Duration,
    pub bucket: Duration,
}

impl Default for ReconciliationPolicy {
    fn default() -> Self {
        Self {
            lookback: Duration::seconds(DEFAULT_LOOKBACK_SECS),
            bucket: Duration::seconds(DEFAULT_BUCKET_SECS),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub scanned: usize,
    pub deleted_ids: Vec<Uuid>,
}

pub struct ReconciliationService {
    store: Arc<dyn PaymentStore>,
    clock: Arc<dyn Clock>,
    policy: ReconciliationPolicy,
}

impl ReconciliationService {
    pub fn new(store: Arc<dyn PaymentStore>, clock: Arc<dyn Clock>, policy: ReconciliationPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub async fn cleanup_duplicates(&self) -> StoreResult<ReconciliationReport> {
        let since = self.clock.now() - self.policy.lookback;
        let recent = self.store.list_since(since).await?;
        tracing::info!(scanned = recent.len(), since = %since, "scanning recent payments for duplicates");

        let deleted_ids = find_duplicates(&recent, self.policy.bucket);
        if !deleted_ids.is_empty() {
            let removed = self.store.delete_many(&deleted_ids).await?;
            tracing::warn!(
                removed,
                ids = ?deleted_ids,
                "deleted duplicate payments"
            );
        }

        Ok(ReconciliationReport {
            scanned: recent.len(),
            deleted_ids,
        })
    }

    pub async fn backfill_legacy_keys(&self) -> StoreResult<u64> {
        let updated = self.store.backfill_missing_keys().await?;
        tracing::info!(updated, "backfilled legacy transaction keys");
        Ok(updated)
    }
}

/// Ids to delete from `payments`, which must be ordered oldest first.
pub fn find_duplicates(payments: &[Payment], bucket: Duration) -> Vec<Uuid> {
    let bucket_ms = bucket.num_milliseconds().max(1);
    let mut seen = HashSet::new();
    let mut doomed = Vec::new();

    for payment in payments {
        let group = (
            payment.buyer_email.as_str(),
            payment.product_name.as_str(),
            price_key(&payment.product_price),
            payment.created_at.timestamp_millis().div_euclid(bucket_ms),
        );

        if seen.contains(&group) {
            tracing::debug!(payment_id = %payment.id, "marking duplicate for deletion");
            doomed.push(payment.id);
        } else {
            seen.insert(group);
        }
    }

    doomed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryPaymentStore;
    use crate::domain::{Buyer, NewPayment, Product};
    use crate::utils::clock::ManualClock;
    use bigdecimal::BigDecimal;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn payment(key: &str, email: &str, created_at: DateTime<Utc>) -> NewPayment {
        NewPayment::new(
            key.to_string(),
            Buyer {
                name: "Asha".to_string(),
                email: email.to_string(),
            },
            Product {
                name: "Asmi Premium Plan".to_string(),
                price: BigDecimal::from(999),
            },
            created_at,
        )
    }

    #[test]
    fn keeps_first_of_each_bucket() {
        // 1_700_000_000 is a multiple of 10 but not of 30; bucket starts at +10.
        let rows: Vec<Payment> = [
            payment("a", "asha@example.com", at(10)),
            payment("b", "asha@example.com", at(15)),
            payment("c", "ravi@example.com", at(16)),
            payment("d", "asha@example.com", at(45)),
        ]
        .into_iter()
        .map(NewPayment::into_payment)
        .collect();

        let doomed = find_duplicates(&rows, Duration::seconds(30));

        assert_eq!(doomed, vec![rows[1].id]);
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let store = Arc::new(MemoryPaymentStore::new());
        let clock = Arc::new(ManualClock::new(at(60)));
        for (key, secs) in [("a", 10), ("b", 12), ("c", 14), ("d", 200)] {
            store
                .record_if_new(&payment(key, "asha@example.com", at(secs)))
                .await
                .unwrap();
        }
        clock.advance(Duration::seconds(10));

        let service = ReconciliationService::new(store.clone(), clock, ReconciliationPolicy::default());

        let first = service.cleanup_duplicates().await.unwrap();
        assert_eq!(first.deleted_ids.len(), 2);
        assert_eq!(store.len().await, 2);

        let second = service.cleanup_duplicates().await.unwrap();
        assert!(second.deleted_ids.is_empty());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn cleanup_ignores_rows_outside_lookback() {
        let store = Arc::new(MemoryPaymentStore::new());
        store
            .record_if_new(&payment("old-1", "asha@example.com", at(10)))
            .await
            .unwrap();
        store
            .record_if_new(&payment("old-2", "asha@example.com", at(11)))
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::new(at(10 + DEFAULT_LOOKBACK_SECS + 60)));

        let service = ReconciliationService::new(store.clone(), clock, ReconciliationPolicy::default());
        let report = service.cleanup_duplicates().await.unwrap();

        assert_eq!(report.scanned, 0);
        assert_eq!(store.len().await, 2);
    }
}
