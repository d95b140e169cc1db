use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use sqlx::migrate::Migrator;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use momo_gateway::adapters::PostgresPaymentStore;
use momo_gateway::cli::{self, Cli, Commands, DbCommands, PaymentCommands};
use momo_gateway::config::{Config, LogFormat};
use momo_gateway::provider::ProviderClient;
use momo_gateway::services::{run_reconciler, DebugLog};
use momo_gateway::{create_app, db, AppState};

fn init_tracing(format: LogFormat, debug_log: &DebugLog) {
    let fmt_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt_layer)
        .with(debug_log.layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let debug_log = DebugLog::default();
    init_tracing(config.log_format, &debug_log);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, debug_log).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config).await,
        Commands::Payments(PaymentCommands::Status { reference }) => {
            cli::handle_payment_status(&config, &reference).await
        }
        Commands::Payments(PaymentCommands::Reconcile) => {
            cli::handle_payment_reconcile(&config).await
        }
    }
}

async fn serve(config: Config, debug_log: DebugLog) -> anyhow::Result<()> {
    // Database pool
    let pool = db::create_pool(&config).await?;

    // Run migrations
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let provider = ProviderClient::new(config.provider_settings());
    tracing::info!("Payment provider client initialized with URL: {}", provider.base_url());

    let store = Arc::new(PostgresPaymentStore::new(pool));
    let state = AppState::new(
        store.clone(),
        Arc::new(provider),
        &config.country_prefix,
        config.payment_settings(),
        debug_log,
    );

    match config.reconcile_interval {
        Some(interval) => {
            tokio::spawn(run_reconciler(store, state.poller.clone(), interval));
        }
        None => tracing::info!("Payment reconciler disabled"),
    }

    let app = create_app(state, config.cors_layer());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
