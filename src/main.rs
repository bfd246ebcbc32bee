// Initialize configuration and logging
// Create database connection pool (retried while the database comes up)
// Wire the chain client, rate normalizer and services into shared state
// Start forward sync and backward seeding tasks
// Start HTTP server, shut everything down on Ctrl-C

use backon::{ExponentialBuilder, Retryable};
use eth_ledger_mirror::{
    api, blockchain, config::Config, db::connection, service::HttpRateNormalizer, AppState, EthereumClient,
    LedgerStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting eth-ledger-mirror");

    let config = Config::from_env();
    info!(
        "Configuration loaded: database {}, rpc {}, {} confirmations",
        config.database_url, config.eth_rpc_url, config.expected_confirmations
    );

    let db_pool = (|| connection::establish_connection(&config.database_url))
        .retry(ExponentialBuilder::default().with_max_times(5))
        .notify(|err: &sqlx::Error, dur: Duration| {
            warn!("Database connection failed, retrying in {:?}: {}", dur, err);
        })
        .await?;
    info!("Database connection established");

    let store = LedgerStore::new(db_pool);
    let chain = Arc::new(EthereumClient::new(&config)?);
    let normalizer = Arc::new(HttpRateNormalizer::new(
        &config.rates_url,
        &config.rates_token,
        Duration::from_secs(config.rpc_timeout_secs),
    )?);

    let app_state = Arc::new(AppState::new(config.clone(), store.clone(), chain.clone(), normalizer));

    let shutdown = CancellationToken::new();
    let sync_handles = blockchain::start_sync(store, chain, &config, shutdown.clone());
    info!("Sync tasks started");

    let app = api::create_router(app_state);
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Starting server on {}", addr);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    for handle in sync_handles {
        if let Err(e) = handle.await {
            error!("Sync task ended abnormally: {}", e);
        }
    }

    Ok(())
}
