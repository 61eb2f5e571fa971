#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;
use uuid::Uuid;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use payment_ledger::adapters::MemoryPaymentStore;
use payment_ledger::domain::{NewPayment, Payment, Product};
use payment_ledger::gateway::PaymentGateway;
use payment_ledger::ports::{Page, PaymentStore, RecordOutcome, StoreResult};
use payment_ledger::services::{EmailMessage, EmailTransport, NotificationError};
use payment_ledger::utils::clock::ManualClock;
use payment_ledger::{create_app, AppSettings, AppState};

pub const START_UNIX: i64 = 1_700_000_000;

pub fn start_time() -> DateTime<Utc> {
    Utc.timestamp_opt(START_UNIX, 0).unwrap()
}

/// Records every delivery attempt; optionally fails all of them.
#[derive(Default)]
pub struct RecordingTransport {
    pub attempts: AtomicUsize,
    pub fail: bool,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, _message: &EmailMessage) -> Result<(), NotificationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NotificationError::Rejected {
                status: 500,
                body: "mail provider down".to_string(),
            });
        }
        Ok(())
    }
}

/// Memory store whose inserts wait until the test releases them.
pub struct GatedStore {
    pub inner: Arc<MemoryPaymentStore>,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryPaymentStore::new()),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl PaymentStore for GatedStore {
    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }

    async fn find_by_key(&self, transaction_key: &str) -> StoreResult<Option<Payment>> {
        self.inner.find_by_key(transaction_key).await
    }

    async fn find_latest_matching(
        &self,
        buyer_email: &str,
        product: &Product,
    ) -> StoreResult<Option<Payment>> {
        self.inner.find_latest_matching(buyer_email, product).await
    }

    async fn record_if_new(&self, payment: &NewPayment) -> StoreResult<RecordOutcome> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.record_if_new(payment).await
    }

    async fn list(&self, page: Option<Page>) -> StoreResult<Vec<Payment>> {
        self.inner.list(page).await
    }

    async fn list_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<Payment>> {
        self.inner.list_since(since).await
    }

    async fn delete_many(&self, ids: &[Uuid]) -> StoreResult<u64> {
        self.inner.delete_many(ids).await
    }

    async fn backfill_missing_keys(&self) -> StoreResult<u64> {
        self.inner.backfill_missing_keys().await
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryPaymentStore>,
    pub clock: Arc<ManualClock>,
    pub transport: Arc<RecordingTransport>,
}

pub struct TestAppBuilder {
    transport: RecordingTransport,
    gateway: Option<Arc<dyn PaymentGateway>>,
    settings: AppSettings,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            transport: RecordingTransport::default(),
            gateway: None,
            settings: AppSettings {
                admin_email: Some("admin@example.com".to_string()),
                ..AppSettings::default()
            },
        }
    }

    pub fn transport(mut self, transport: RecordingTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn settings(mut self, update: impl FnOnce(&mut AppSettings)) -> Self {
        update(&mut self.settings);
        self
    }

    pub fn build(self) -> TestApp {
        let store = Arc::new(MemoryPaymentStore::new());
        self.build_over(store.clone(), store)
    }

    /// Serves through a gated store; `TestApp::store` is the memory store behind it.
    pub fn build_with_store(self, gated: Arc<GatedStore>) -> TestApp {
        let memory = gated.inner.clone();
        self.build_over(memory, gated)
    }

    fn build_over(self, memory: Arc<MemoryPaymentStore>, store: Arc<dyn PaymentStore>) -> TestApp {
        let clock = Arc::new(ManualClock::new(start_time()));
        let transport = Arc::new(self.transport);

        let state = AppState::new(
            store,
            clock.clone(),
            transport.clone(),
            self.gateway,
            self.settings,
        );

        TestApp {
            router: create_app(state),
            store: memory,
            clock,
            transport,
        }
    }
}

impl TestApp {
    pub async fn post_json(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_empty(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    /// Waits for detached notification tasks to reach the transport.
    pub async fn wait_for_attempts(&self, expected: usize) {
        for _ in 0..100 {
            if self.transport.attempts() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

pub fn completion(key: Option<&str>, email: &str, product: &str, price: f64) -> Value {
    let mut body = serde_json::json!({
        "user": {"name": "Asha Rao", "email": email},
        "product": {"name": product, "price": price}
    });
    if let Some(key) = key {
        body["transactionKey"] = Value::String(key.to_string());
    }
    body
}
