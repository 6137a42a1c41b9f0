use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{fmt, EnvFilter};

use shopvision::{routes::{router, AppState}, Analyzer, Config, ContentGenerator, GeminiClient, Visualizer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    if shopvision::gemini::resolve_api_key(None, |name| std::env::var(name).ok()).is_none() {
        tracing::warn!("No Gemini API key in the environment; analyze and visualize calls will fail until one is set");
    }
    tracing::info!(analyze_model = %config.analyze_model, visualize_model = %config.visualize_model, "Using Gemini at {}", config.api_base);

    let gemini: Arc<dyn ContentGenerator> = Arc::new(GeminiClient::from_config(&config));
    let state = AppState::new(
        Analyzer::new(gemini.clone(), config.analyze_model.clone()),
        Visualizer::new(gemini, config.visualize_model.clone()),
    );

    let app = router(state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
