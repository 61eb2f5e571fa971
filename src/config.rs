use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

use crate::gateway::stripe::{StripeSettings, STRIPE_API_URL};
use crate::services::email::RESEND_API_URL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("PAYMENT_STORE must be 'postgres' or 'memory', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'text' or 'json', got '{}'", other),
        }
    }
}

/// Admin notification settings. Any missing field disables delivery.
#[derive(Debug, Clone, Default)]
pub struct MailConfig {
    pub admin_email: Option<String>,
    pub from_email: Option<String>,
    pub resend_api_key: Option<String>,
    pub resend_api_url: String,
}

impl MailConfig {
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.admin_email.is_none() {
            missing.push("ADMIN_EMAIL");
        }
        if self.from_email.is_none() {
            missing.push("EMAIL_FROM");
        }
        if self.resend_api_key.is_none() {
            missing.push("RESEND_API_KEY");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub stripe_secret_key: Option<String>,
    pub stripe_publishable_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_api_url: String,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutConfig {
    /// Gateway settings, if a secret key is configured.
    pub fn stripe_settings(&self) -> Option<StripeSettings> {
        self.stripe_secret_key.as_ref().map(|secret_key| StripeSettings {
            secret_key: secret_key.clone(),
            api_url: self.stripe_api_url.clone(),
            currency: self.currency.clone(),
            success_url: self.success_url.clone(),
            cancel_url: self.cancel_url.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub cors_allowed_origins: Vec<String>,
    pub mail: MailConfig,
    pub checkout: CheckoutConfig,
    pub dedup_window_secs: i64,
    pub reconcile_lookback_secs: i64,
    pub reconcile_bucket_secs: i64,
    pub log_format: LogFormat,
    pub log_request_body: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let store_backend: StoreBackend = or("PAYMENT_STORE", "postgres").parse()?;
        let database_url = get("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when PAYMENT_STORE=postgres");
        }

        let config = Config {
            server_port: parse("SERVER_PORT", &or("SERVER_PORT", "5000"))?,
            store_backend,
            database_url,
            database_max_connections: parse(
                "DATABASE_MAX_CONNECTIONS",
                &or("DATABASE_MAX_CONNECTIONS", "5"),
            )?,
            cors_allowed_origins: or("CORS_ALLOWED_ORIGINS", "http://localhost:3000")
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            mail: MailConfig {
                admin_email: get("ADMIN_EMAIL"),
                from_email: get("EMAIL_FROM"),
                resend_api_key: get("RESEND_API_KEY"),
                resend_api_url: or("RESEND_API_URL", RESEND_API_URL),
            },
            checkout: CheckoutConfig {
                stripe_secret_key: get("STRIPE_SECRET_KEY"),
                stripe_publishable_key: get("STRIPE_PUBLISHABLE_KEY"),
                stripe_webhook_secret: get("STRIPE_WEBHOOK_SECRET"),
                stripe_api_url: or("STRIPE_API_URL", STRIPE_API_URL),
                currency: or("CHECKOUT_CURRENCY", "inr").to_lowercase(),
                success_url: or("CHECKOUT_SUCCESS_URL", "http://localhost:3000/success"),
                cancel_url: or("CHECKOUT_CANCEL_URL", "http://localhost:3000/cancel"),
            },
            dedup_window_secs: parse("DEDUP_WINDOW_SECS", &or("DEDUP_WINDOW_SECS", "30"))?,
            reconcile_lookback_secs: parse(
                "RECONCILE_LOOKBACK_SECS",
                &or("RECONCILE_LOOKBACK_SECS", "300"),
            )?,
            reconcile_bucket_secs: parse(
                "RECONCILE_BUCKET_SECS",
                &or("RECONCILE_BUCKET_SECS", "30"),
            )?,
            log_format: or("LOG_FORMAT", "text").parse()?,
            log_request_body: parse("LOG_REQUEST_BODY", &or("LOG_REQUEST_BODY", "false"))?,
        };

        for (name, value) in [
            ("DEDUP_WINDOW_SECS", config.dedup_window_secs),
            ("RECONCILE_LOOKBACK_SECS", config.reconcile_lookback_secs),
            ("RECONCILE_BUCKET_SECS", config.reconcile_bucket_secs),
        ] {
            if value <= 0 {
                anyhow::bail!("{} must be greater than 0", name);
            }
        }

        Ok(config)
    }
}

fn parse<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("{} has invalid value '{}'", name, raw))
}
