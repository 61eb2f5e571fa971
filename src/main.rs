use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payment_ledger::adapters::PostgresPaymentStore;
use payment_ledger::cli::{self, Cli, Commands, DbCommands, PaymentCommands};
use payment_ledger::config::{Config, LogFormat, StoreBackend};
use payment_ledger::ports::PaymentStore;
use payment_ledger::utils::clock::SystemClock;
use payment_ledger::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Payments(PaymentCommands::List { limit }) => cli::handle_payments_list(&config, limit).await,
        Commands::Payments(PaymentCommands::CleanupDuplicates) => cli::handle_payments_cleanup(&config).await,
        Commands::Payments(PaymentCommands::BackfillKeys) => cli::handle_payments_backfill(&config).await,
        Commands::Config => cli::handle_config_validate(&config).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let store: Arc<dyn PaymentStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = payment_ledger::db::create_pool(&config).await?;
            payment_ledger::db::run_migrations(&pool).await?;
            Arc::new(PostgresPaymentStore::new(pool))
        }
        StoreBackend::Memory => cli::open_store(&config).await?,
    };

    let state = AppState::from_config(&config, store, Arc::new(SystemClock));
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
