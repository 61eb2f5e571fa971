use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{to_minor_units, CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway};

pub const STRIPE_API_URL: &str = "https://api.stripe.com";

const UNKNOWN_BUYER_NAME: &str = "Unknown User";
const UNKNOWN_BUYER_EMAIL: &str = "unknown@example.com";

#[derive(Debug, Deserialize)]
struct CreateCheckoutSessionResponse {
    id: String,
    url: Option<String>,
}

/// Settings for creating Stripe checkout sessions.
#[derive(Debug, Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    pub api_url: String,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// HTTP client for the Stripe checkout API
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    settings: StripeSettings,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl StripeGateway {
    pub fn new(settings: StripeSettings) -> Self {
        Self::with_circuit_breaker(settings, 3, 60)
    }

    /// Creates a client with custom circuit breaker configuration
    pub fn with_circuit_breaker(
        settings: StripeSettings,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Self {
            client,
            settings,
            circuit_breaker,
        }
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    fn form_for(&self, request: &CheckoutRequest) -> Result<Vec<(&'static str, String)>, GatewayError> {
        let unit_amount = to_minor_units(&request.product.price)?;
        let buyer_name = request
            .buyer_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_BUYER_NAME.to_string());
        let buyer_email = request
            .buyer_email
            .clone()
            .unwrap_or_else(|| UNKNOWN_BUYER_EMAIL.to_string());

        let mut form = vec![
            ("mode", "payment".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("success_url", self.settings.success_url.clone()),
            ("cancel_url", self.settings.cancel_url.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", self.settings.currency.clone()),
            ("line_items[0][price_data][unit_amount]", unit_amount.to_string()),
            (
                "line_items[0][price_data][product_data][name]",
                request.product.name.clone(),
            ),
            ("metadata[product_name]", request.product.name.clone()),
            ("metadata[product_price]", request.product.price.to_string()),
            ("metadata[buyer_name]", buyer_name),
            ("metadata[buyer_email]", buyer_email),
        ];
        if let Some(email) = &request.buyer_email {
            form.push(("customer_email", email.clone()));
        }

        Ok(form)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        let form = self.form_for(request)?;
        let url = format!(
            "{}/v1/checkout/sessions",
            self.settings.api_url.trim_end_matches('/')
        );
        let client = self.client.clone();
        let secret_key = self.settings.secret_key.clone();

        tracing::info!(
            product = %request.product.name,
            amount = %request.product.price,
            currency = %self.settings.currency,
            "creating checkout session"
        );

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .basic_auth(&secret_key, None::<&str>)
                    .form(&form)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(GatewayError::Rejected {
                        status: status.as_u16(),
                        body,
                    });
                }

                let session = response.json::<CreateCheckoutSessionResponse>().await?;
                Ok(session)
            })
            .await;

        match result {
            Ok(session) => {
                tracing::info!(session_id = %session.id, "checkout session created");
                Ok(CheckoutSession {
                    client_reference: session.url.unwrap_or_else(|| session.id.clone()),
                    transaction_handle: session.id,
                })
            }
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitBreakerOpen(
                "Stripe API circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}
