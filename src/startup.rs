use crate::config::{Config, StoreBackend};
use anyhow::{Context, Result};
use sqlx::PgPool;

pub struct ValidationReport {
    pub environment: bool,
    pub store: bool,
    pub mail: bool,
    pub gateway: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Mail and gateway gaps degrade features but do not block startup.
    pub fn is_valid(&self) -> bool {
        self.environment && self.store
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Payment Store:         {}", status(self.store));
        println!("Email Notifications:   {}", optional(self.mail));
        println!("Checkout Gateway:      {}", optional(self.gateway));

        if !self.warnings.is_empty() {
            println!("\nWarnings:");
            for warning in &self.warnings {
                println!("  ⚠️  {}", warning);
            }
        }

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

fn optional(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "⚠️  DISABLED" }
}

/// `pool` is the opened Postgres pool, if the Postgres backend is selected
/// and a connection could be made.
pub async fn validate_environment(config: &Config, pool: Option<&PgPool>) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        store: true,
        mail: true,
        gateway: true,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {:#}", e));
    }

    if config.store_backend == StoreBackend::Postgres {
        let result = match pool {
            Some(pool) => validate_database(pool).await,
            None => Err(anyhow::anyhow!("could not connect to DATABASE_URL")),
        };
        if let Err(e) = result {
            report.store = false;
            report.errors.push(format!("Database: {:#}", e));
        }
    }

    let missing = config.mail.missing();
    if !missing.is_empty() {
        report.mail = false;
        report
            .warnings
            .push(format!("Email notifications disabled, missing {}", missing.join(", ")));
    }

    if let Err(e) = validate_gateway(config) {
        report.gateway = false;
        report.warnings.push(format!("Checkout gateway: {:#}", e));
    }

    report
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.database_max_connections == 0 {
        anyhow::bail!("DATABASE_MAX_CONNECTIONS must be greater than 0");
    }

    url::Url::parse(&config.mail.resend_api_url).context("RESEND_API_URL is not a valid URL")?;

    for origin in &config.cors_allowed_origins {
        if origin != "*" {
            url::Url::parse(origin)
                .with_context(|| format!("CORS origin '{}' is not a valid URL", origin))?;
        }
    }

    Ok(())
}

fn validate_gateway(config: &Config) -> Result<()> {
    let checkout = &config.checkout;
    if checkout.stripe_secret_key.is_none() {
        anyhow::bail!("STRIPE_SECRET_KEY not set, checkout sessions disabled");
    }

    url::Url::parse(&checkout.stripe_api_url).context("STRIPE_API_URL is not a valid URL")?;
    url::Url::parse(&checkout.success_url).context("CHECKOUT_SUCCESS_URL is not a valid URL")?;
    url::Url::parse(&checkout.cancel_url).context("CHECKOUT_CANCEL_URL is not a valid URL")?;

    if checkout.stripe_publishable_key.is_none() {
        anyhow::bail!("STRIPE_PUBLISHABLE_KEY not set, clients cannot open checkout");
    }
    if checkout.stripe_webhook_secret.is_none() {
        anyhow::bail!("STRIPE_WEBHOOK_SECRET not set, gateway callbacks will be rejected");
    }

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn memory_config(extra: &[(&str, &str)]) -> Config {
        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert("PAYMENT_STORE".to_string(), "memory".to_string());
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[tokio::test]
    async fn test_memory_store_without_integrations_is_valid_with_warnings() {
        let report = validate_environment(&memory_config(&[]), None).await;

        assert!(report.is_valid());
        assert!(!report.mail);
        assert!(!report.gateway);
        assert_eq!(report.warnings.len(), 2);
    }

    #[tokio::test]
    async fn test_postgres_without_pool_is_invalid() {
        let config = memory_config(&[
            ("PAYMENT_STORE", "postgres"),
            ("DATABASE_URL", "postgres://localhost:1/none"),
        ]);
        let report = validate_environment(&config, None).await;

        assert!(!report.is_valid());
        assert!(!report.store);
    }

    #[test]
    fn test_invalid_cors_origin() {
        let config = memory_config(&[("CORS_ALLOWED_ORIGINS", "not a url")]);
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_gateway_complete() {
        let config = memory_config(&[
            ("STRIPE_SECRET_KEY", "sk_test_1"),
            ("STRIPE_PUBLISHABLE_KEY", "pk_test_1"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_1"),
        ]);
        assert!(validate_gateway(&config).is_ok());
    }
}
