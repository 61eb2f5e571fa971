pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod startup;
pub mod use_cases;
pub mod utils;
pub mod validation;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use chrono::Duration;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;
use crate::gateway::{PaymentGateway, StripeGateway};
use crate::middleware::RequestLogSettings;
use crate::ports::PaymentStore;
use crate::services::{
    DisabledTransport, DuplicateDetector, EmailTransport, NotificationDispatcher, ReconciliationPolicy,
    ReconciliationService, ResendTransport,
};
use crate::use_cases::RecordPayment;
use crate::utils::clock::Clock;

/// Everything the HTTP layer needs that is not derived from a collaborator.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub dedup_window: Duration,
    pub reconciliation: ReconciliationPolicy,
    pub admin_email: Option<String>,
    pub currency: String,
    pub publishable_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub cors_allowed_origins: Vec<String>,
    pub log_request_body: bool,
}

impl AppSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dedup_window: Duration::seconds(config.dedup_window_secs),
            reconciliation: ReconciliationPolicy {
                lookback: Duration::seconds(config.reconcile_lookback_secs),
                bucket: Duration::seconds(config.reconcile_bucket_secs),
            },
            admin_email: config.mail.admin_email.clone(),
            currency: config.checkout.currency.clone(),
            publishable_key: config.checkout.stripe_publishable_key.clone(),
            webhook_secret: config.checkout.stripe_webhook_secret.clone(),
            cors_allowed_origins: config.cors_allowed_origins.clone(),
            log_request_body: config.log_request_body,
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            dedup_window: Duration::seconds(services::dedup::DEFAULT_DEDUP_WINDOW_SECS),
            reconciliation: ReconciliationPolicy::default(),
            admin_email: None,
            currency: "inr".to_string(),
            publishable_key: None,
            webhook_secret: None,
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            log_request_body: false,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PaymentStore>,
    pub clock: Arc<dyn Clock>,
    pub recorder: RecordPayment,
    pub reconciliation: Arc<ReconciliationService>,
    pub notifier: NotificationDispatcher,
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    pub settings: Arc<AppSettings>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        clock: Arc<dyn Clock>,
        transport: Arc<dyn EmailTransport>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        settings: AppSettings,
    ) -> Self {
        let notifier = NotificationDispatcher::new(transport, settings.admin_email.clone(), settings.currency.clone());
        let detector = DuplicateDetector::new(store.clone(), settings.dedup_window);
        let recorder = RecordPayment::new(store.clone(), detector, notifier.clone(), clock.clone());
        let reconciliation = Arc::new(ReconciliationService::new(
            store.clone(),
            clock.clone(),
            settings.reconciliation,
        ));

        Self {
            store,
            clock,
            recorder,
            reconciliation,
            notifier,
            gateway,
            settings: Arc::new(settings),
        }
    }

    /// Wires the mail transport and checkout gateway described by `config`.
    pub fn from_config(config: &Config, store: Arc<dyn PaymentStore>, clock: Arc<dyn Clock>) -> Self {
        let transport: Arc<dyn EmailTransport> = match (&config.mail.resend_api_key, &config.mail.from_email) {
            (Some(api_key), Some(from)) => Arc::new(ResendTransport::new(
                api_key.clone(),
                from.clone(),
                config.mail.resend_api_url.clone(),
            )),
            _ => {
                let missing = config.mail.missing().join(", ");
                tracing::warn!(missing = %missing, "email notifications disabled");
                Arc::new(DisabledTransport::new(format!("missing {}", missing)))
            }
        };

        let gateway: Option<Arc<dyn PaymentGateway>> = match config.checkout.stripe_settings() {
            Some(settings) => Some(Arc::new(StripeGateway::new(settings))),
            None => {
                tracing::warn!("STRIPE_SECRET_KEY not set, checkout sessions disabled");
                None
            }
        };

        Self::new(store, clock, transport, gateway, AppSettings::from_config(config))
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

pub fn create_app(state: AppState) -> Router {
    let payment_routes = Router::new()
        .route("/payment-success", post(handlers::payments::payment_success))
        .route("/list", get(handlers::payments::list_payments))
        .route(
            "/create-checkout-session",
            post(handlers::payments::create_checkout_session),
        )
        .route("/webhook/stripe", post(handlers::webhook::stripe_webhook))
        .route("/cleanup-duplicates", post(handlers::admin::cleanup_duplicates))
        .route("/backfill-keys", post(handlers::admin::backfill_keys))
        .route("/test-email", post(handlers::admin::test_email));

    let request_log = RequestLogSettings {
        log_body: state.settings.log_request_body,
    };
    let cors = cors_layer(&state.settings.cors_allowed_origins);

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/payment", payment_routes)
        .layer(axum::middleware::from_fn_with_state(
            request_log,
            middleware::request_logger_middleware,
        ))
        .layer(cors)
        .with_state(state)
}
