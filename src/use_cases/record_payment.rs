//! Record payment use case.
//! Turns a validated completion signal into exactly one stored record per
//! transaction, then schedules the admin notification.

use std::sync::Arc;

use crate::domain::{CompletionSignal, NewPayment, Payment};
use crate::ports::{PaymentStore, RecordOutcome, StoreResult};
use crate::services::dedup::{Classification, DuplicateDetector, DuplicateRule};
use crate::services::idempotency_key::{self, KeySource};
use crate::services::notifier::NotificationDispatcher;
use crate::utils::clock::Clock;

/// Outcome of one recording decision. Both variants are successes.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentDecision {
    Recorded(Payment),
    Duplicate { rule: DuplicateRule, existing: Payment },
}

impl PaymentDecision {
    pub fn payment(&self) -> &Payment {
        match self {
            PaymentDecision::Recorded(payment) => payment,
            PaymentDecision::Duplicate { existing, .. } => existing,
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, PaymentDecision::Recorded(_))
    }

    pub fn message(&self) -> &'static str {
        match self {
            PaymentDecision::Recorded(_) => "Payment stored successfully",
            PaymentDecision::Duplicate {
                rule: DuplicateRule::ExactKey,
                ..
            } => "Payment already recorded",
            PaymentDecision::Duplicate {
                rule: DuplicateRule::RecentMatch,
                ..
            } => "Payment already recorded recently",
        }
    }
}

/// Use case for recording completion signals.
#[derive(Clone)]
pub struct RecordPayment {
    store: Arc<dyn PaymentStore>,
    detector: DuplicateDetector,
    notifier: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl RecordPayment {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        detector: DuplicateDetector,
        notifier: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            detector,
            notifier,
            clock,
        }
    }

    pub async fn execute(&self, signal: CompletionSignal) -> StoreResult<PaymentDecision> {
        let now = self.clock.now();
        let resolved = idempotency_key::resolve(
            signal.transaction_key.as_deref(),
            &signal.buyer,
            &signal.product,
            now,
        );

        let classification = self
            .detector
            .classify(&resolved.key, &signal.buyer.email, &signal.product, now)
            .await?;

        if let Classification::Duplicate { rule, existing } = classification {
            tracing::info!(
                transaction_key = %resolved.key,
                existing_id = %existing.id,
                rule = rule.as_str(),
                "duplicate completion signal"
            );
            return Ok(PaymentDecision::Duplicate { rule, existing });
        }

        let new_payment = NewPayment::new(resolved.key, signal.buyer, signal.product, now);
        match self.store.record_if_new(&new_payment).await? {
            RecordOutcome::Inserted(payment) => {
                tracing::info!(
                    payment_id = %payment.id,
                    transaction_key = %new_payment.transaction_key,
                    fallback_key = resolved.source == KeySource::Fallback,
                    "payment recorded"
                );
                self.notifier.dispatch(payment.clone());
                Ok(PaymentDecision::Recorded(payment))
            }
            RecordOutcome::AlreadyExists(existing) => {
                tracing::info!(
                    transaction_key = %new_payment.transaction_key,
                    existing_id = %existing.id,
                    "lost insert race to concurrent completion signal"
                );
                Ok(PaymentDecision::Duplicate {
                    rule: DuplicateRule::ExactKey,
                    existing,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryPaymentStore;
    use crate::domain::{Buyer, Product};
    use crate::services::email::DisabledTransport;
    use crate::utils::clock::ManualClock;
    use bigdecimal::BigDecimal;
    use chrono::{Duration, TimeZone, Utc};

    fn use_case(store: Arc<MemoryPaymentStore>, clock: Arc<ManualClock>) -> RecordPayment {
        let notifier = NotificationDispatcher::new(
            Arc::new(DisabledTransport::new("test")),
            None,
            "inr".to_string(),
        );
        RecordPayment::new(
            store.clone(),
            DuplicateDetector::new(store, Duration::seconds(30)),
            notifier,
            clock,
        )
    }

    fn signal(key: Option<&str>) -> CompletionSignal {
        CompletionSignal {
            transaction_key: key.map(str::to_string),
            buyer: Buyer {
                name: "Asha".to_string(),
                email: "asha@example.com".to_string(),
            },
            product: Product {
                name: "Asmi Premium Plan".to_string(),
                price: BigDecimal::from(999),
            },
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()))
    }

    #[tokio::test]
    async fn second_signal_with_same_key_is_duplicate() {
        let store = Arc::new(MemoryPaymentStore::new());
        let clock = clock();
        let recorder = use_case(store.clone(), clock.clone());

        let first = recorder.execute(signal(Some("cs_1"))).await.unwrap();
        clock.advance(Duration::minutes(10));
        let second = recorder.execute(signal(Some("cs_1"))).await.unwrap();

        assert!(first.is_recorded());
        assert_eq!(second.message(), "Payment already recorded");
        assert_eq!(second.payment().id, first.payment().id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn keyless_signals_inside_window_are_duplicates() {
        let store = Arc::new(MemoryPaymentStore::new());
        let clock = clock();
        let recorder = use_case(store.clone(), clock.clone());

        recorder.execute(signal(None)).await.unwrap();
        clock.advance(Duration::seconds(5));
        let second = recorder.execute(signal(None)).await.unwrap();

        assert_eq!(second.message(), "Payment already recorded recently");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn created_at_comes_from_clock() {
        let store = Arc::new(MemoryPaymentStore::new());
        let clock = clock();
        let recorder = use_case(store, clock.clone());

        let decision = recorder.execute(signal(Some("cs_2"))).await.unwrap();

        assert_eq!(decision.payment().created_at, clock.now());
        assert_eq!(decision.payment().transaction_key.as_deref(), Some("cs_2"));
    }
}
