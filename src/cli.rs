use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::adapters::{MemoryPaymentStore, PostgresPaymentStore};
use crate::config::{Config, StoreBackend};
use crate::ports::{Page, PaymentStore};
use crate::services::{ReconciliationService, ReconciliationPolicy};
use crate::utils::clock::SystemClock;

#[derive(Parser)]
#[command(name = "payment-ledger")]
#[command(about = "Payment Ledger - idempotent payment recording service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Payment record maintenance
    #[command(subcommand)]
    Payments(PaymentCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum PaymentCommands {
    /// Print recorded payments, newest first
    List {
        /// Maximum number of payments to print
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },

    /// Delete near-simultaneous duplicates from the recent past
    CleanupDuplicates,

    /// Assign `legacy_<id>` keys to payments recorded without one
    BackfillKeys,
}

/// Opens the configured store. The memory store starts empty.
pub async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn PaymentStore>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let pool = crate::db::create_pool(config).await?;
            Ok(Arc::new(PostgresPaymentStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory payment store; records are lost on exit");
            Ok(Arc::new(MemoryPaymentStore::new()))
        }
    }
}

fn reconciliation_service(config: &Config, store: Arc<dyn PaymentStore>) -> ReconciliationService {
    ReconciliationService::new(
        store,
        Arc::new(SystemClock),
        ReconciliationPolicy {
            lookback: chrono::Duration::seconds(config.reconcile_lookback_secs),
            bucket: chrono::Duration::seconds(config.reconcile_bucket_secs),
        },
    )
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    if config.store_backend != StoreBackend::Postgres {
        anyhow::bail!("db migrate requires PAYMENT_STORE=postgres");
    }

    let pool = crate::db::create_pool(config).await?;
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");

    Ok(())
}

pub async fn handle_payments_list(config: &Config, limit: i64) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let payments = store
        .list(Some(Page {
            limit: limit.max(1),
            offset: 0,
        }))
        .await?;

    if payments.is_empty() {
        println!("No payments found");
        return Ok(());
    }

    println!(
        "{:<36} {:<20} {:<28} {:<24} {:>10}",
        "ID", "Created", "Buyer", "Product", "Price"
    );
    println!("{}", "-".repeat(122));

    for payment in payments {
        println!(
            "{:<36} {:<20} {:<28} {:<24} {:>10}",
            payment.id,
            payment.created_at.format("%Y-%m-%d %H:%M:%S"),
            truncate(&payment.buyer_email, 28),
            truncate(&payment.product_name, 24),
            payment.product_price
        );
    }

    Ok(())
}

pub async fn handle_payments_cleanup(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let report = reconciliation_service(config, store).cleanup_duplicates().await?;

    println!(
        "✓ Scanned {} recent payments, removed {} duplicates",
        report.scanned,
        report.deleted_ids.len()
    );
    for id in report.deleted_ids {
        println!("  - {}", id);
    }

    Ok(())
}

pub async fn handle_payments_backfill(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let updated = reconciliation_service(config, store).backfill_legacy_keys().await?;

    println!("✓ Assigned transaction keys to {} legacy payments", updated);

    Ok(())
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Payment Store: {:?}", config.store_backend);
    if let Some(url) = &config.database_url {
        println!("  Database URL: {}", mask_password(url));
    }
    println!("  CORS Origins: {}", config.cors_allowed_origins.join(", "));
    println!(
        "  Admin Email: {}",
        config.mail.admin_email.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  Resend API Key: {}",
        mask_secret(config.mail.resend_api_key.as_deref())
    );
    println!(
        "  Stripe Secret Key: {}",
        mask_secret(config.checkout.stripe_secret_key.as_deref())
    );
    println!("  Checkout Currency: {}", config.checkout.currency);
    println!("  Dedup Window: {}s", config.dedup_window_secs);

    let store = match config.store_backend {
        StoreBackend::Postgres => match crate::db::create_pool(config).await {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!(error = %e, "could not open database pool");
                None
            }
        },
        StoreBackend::Memory => None,
    };

    let report = crate::startup::validate_environment(config, store.as_ref()).await;
    report.print();

    if !report.is_valid() {
        anyhow::bail!("Configuration is invalid");
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

fn mask_secret(secret: Option<&str>) -> String {
    match secret {
        Some(s) if s.chars().count() > 8 => {
            let prefix: String = s.chars().take(4).collect();
            format!("{}****", prefix)
        }
        Some(_) => "****".to_string(),
        None => "(not set)".to_string(),
    }
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
