//! Request-path duplicate detection.
//!
//! Two rules, first match wins:
//! 1. exact key: a record with the resolved `transaction_key` exists;
//! 2. recent match: the newest record for the same buyer email, product name
//!    and price is younger than the fuzzy window.
//!
//! This is a read-then-decide check. It keeps the common duplicate cheap but
//! cannot close the race on its own; `PaymentStore::record_if_new` does that.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::domain::{Payment, Product};
use crate::ports::{PaymentStore, StoreResult};

/// Default width of the fuzzy recent-match window.
pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateRule {
    ExactKey,
    RecentMatch,
}

impl DuplicateRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateRule::ExactKey => "exact_key",
            DuplicateRule::RecentMatch => "recent_match",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    New,
    Duplicate { rule: DuplicateRule, existing: Payment },
}

#[derive(Clone)]
pub struct DuplicateDetector {
    store: Arc<dyn PaymentStore>,
    window: Duration,
}

impl DuplicateDetector {
    pub fn new(store: Arc<dyn PaymentStore>, window: Duration) -> Self {
        Self { store, window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub async fn classify(
        &self,
        transaction_key: &str,
        buyer_email: &str,
        product: &Product,
        now: DateTime<Utc>,
    ) -> StoreResult<Classification> {
        if let Some(existing) = self.store.find_by_key(transaction_key).await? {
            return Ok(Classification::Duplicate {
                rule: DuplicateRule::ExactKey,
                existing,
            });
        }

        if let Some(latest) = self.store.find_latest_matching(buyer_email, product).await? {
            if now - latest.created_at < self.window {
                return Ok(Classification::Duplicate {
                    rule: DuplicateRule::RecentMatch,
                    existing: latest,
                });
            }
        }

        Ok(Classification::New)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryPaymentStore;
    use crate::domain::{Buyer, NewPayment};
    use bigdecimal::BigDecimal;

    fn product() -> Product {
        Product {
            name: "Asmi Premium Plan".to_string(),
            price: BigDecimal::from(999),
        }
    }

    async fn seeded(key: &str, at: DateTime<Utc>) -> (Arc<MemoryPaymentStore>, DuplicateDetector) {
        let store = Arc::new(MemoryPaymentStore::new());
        store
            .record_if_new(&NewPayment::new(
                key.to_string(),
                Buyer {
                    name: "Asha".to_string(),
                    email: "asha@example.com".to_string(),
                },
                product(),
                at,
            ))
            .await
            .unwrap();
        let detector = DuplicateDetector::new(
            store.clone(),
            Duration::seconds(DEFAULT_DEDUP_WINDOW_SECS),
        );
        (store, detector)
    }

    #[tokio::test]
    async fn exact_key_wins_regardless_of_age() {
        let t0 = Utc::now();
        let (_store, detector) = seeded("cs_1", t0).await;

        let result = detector
            .classify("cs_1", "someone-else@example.com", &product(), t0 + Duration::days(2))
            .await
            .unwrap();

        assert!(matches!(
            result,
            Classification::Duplicate { rule: DuplicateRule::ExactKey, .. }
        ));
    }

    #[tokio::test]
    async fn recent_match_inside_window_is_duplicate() {
        let t0 = Utc::now();
        let (_store, detector) = seeded("cs_1", t0).await;

        let result = detector
            .classify("cs_2", "asha@example.com", &product(), t0 + Duration::seconds(5))
            .await
            .unwrap();

        assert!(matches!(
            result,
            Classification::Duplicate { rule: DuplicateRule::RecentMatch, .. }
        ));
    }

    #[tokio::test]
    async fn recent_match_outside_window_is_new() {
        let t0 = Utc::now();
        let (_store, detector) = seeded("cs_1", t0).await;

        for offset in [30, 40] {
            let result = detector
                .classify("cs_2", "asha@example.com", &product(), t0 + Duration::seconds(offset))
                .await
                .unwrap();
            assert_eq!(result, Classification::New);
        }
    }

    #[tokio::test]
    async fn different_price_is_not_a_match() {
        let t0 = Utc::now();
        let (_store, detector) = seeded("cs_1", t0).await;
        let cheaper = Product {
            price: BigDecimal::from(499),
            ..product()
        };

        let result = detector
            .classify("cs_2", "asha@example.com", &cheaper, t0 + Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(result, Classification::New);
    }
}
