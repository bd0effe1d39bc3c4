use tracing_subscriber::EnvFilter;

use product_search::api;
use product_search::config::Config;
use product_search::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("Catalog: {}", config.catalog_path().display());
    tracing::info!(
        "LLM provider: {} ({}), configured: {}",
        config.llm.provider,
        config.llm.base_url,
        config.llm.is_configured()
    );

    let state = AppState::new(config.clone()).await?;
    tracing::info!("Loaded {} products", state.catalog.len());

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
