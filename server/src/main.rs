use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use server::api::{ApiState, run_api_server};
use server::config::ServiceConfig;
use server::db::open_store;
use server::tier_aggregator::{TierAggregator, run_aggregation_service};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if exists
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServiceConfig::from_env().context("Invalid scoreboard configuration")?;
    info!(
        "Starting scoreboard server (table: {}, tier width: {}, aggregation interval: {:?})",
        config.store.table_name, config.ranking.tier_width, config.ranking.aggregation_interval
    );

    let store = open_store(&config.store).await?;
    let cancellation_token = CancellationToken::new();

    let aggregator = TierAggregator::new(store.clone(), &config.ranking);
    let aggregation_handle = tokio::spawn(run_aggregation_service(
        aggregator,
        config.ranking.aggregation_interval,
        cancellation_token.clone(),
    ));

    let state = ApiState::new(store.clone(), &config.ranking);
    let api_token = cancellation_token.clone();
    let http_addr = config.http_addr.clone();
    let mut api_handle =
        tokio::spawn(async move { run_api_server(&http_addr, state, api_token).await });

    info!("Server started. Waiting for shutdown signal (Ctrl+C)...");
    let api_result = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Received shutdown signal. Shutting down gracefully...");
            cancellation_token.cancel();
            api_handle.await
        }
        result = &mut api_handle => {
            cancellation_token.cancel();
            result
        }
    };

    match api_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("API server stopped with error: {}", e),
        Err(e) => error!("API server task failed: {}", e),
    }
    if let Err(e) = aggregation_handle.await {
        error!("Tier aggregation task failed: {}", e);
    }

    store.close().await.context("Failed to close score store")?;
    info!("Server shut down successfully");
    Ok(())
}
