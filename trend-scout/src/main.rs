use std::sync::Arc;

use trend_scout::api::ApiServer;
use trend_scout::config::AppConfig;
use trend_scout::database;
use trend_scout::logging::init_logging;
use trend_scout::services::ServiceContainer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    // Keep the guard alive so buffered file output is flushed on exit
    let (logging, _guard) = init_logging(&config.log_dir)?;

    // Initialize database
    let pool =
        database::init_pool_with_size(&config.database.url, config.database.max_connections)
            .await?;
    database::run_migrations(&pool).await?;

    let services = Arc::new(ServiceContainer::from_config(pool, &config)?);
    logging.start_retention_cleanup(services.cancellation_token());
    services.start_background().await;

    let server = ApiServer::new(config.api.clone(), services.clone())
        .with_cancel_token(services.cancellation_token());
    let mut server_handle = tokio::spawn(async move { server.run().await });

    tracing::info!("trend-scout initialized successfully");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
        }
        result = &mut server_handle => {
            match result {
                Ok(Ok(())) => tracing::warn!("API server stopped"),
                Ok(Err(e)) => tracing::error!(error = %e, "API server failed"),
                Err(e) => tracing::error!(error = %e, "API server task panicked"),
            }
        }
    }

    services.shutdown().await?;
    if !server_handle.is_finished() {
        server_handle.abort();
    }

    Ok(())
}
