mod api;
mod config;
mod error;
mod handlers;
mod models;
mod prompts;
mod services;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;

use api::create_router;
use config::Settings;
use handlers::DietHandler;
use prompts::Prompts;
use services::{AnthropicClient, HttpImageFetcher};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables first so RUST_LOG from .env is honoured
    dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("🚀 Starting diet feedback service...");

    let settings = Settings::from_env()?;
    let prompts = Prompts::load(
        settings.description_prompt_file.as_deref(),
        settings.feedback_prompt_file.as_deref(),
    )?;

    // One connection pool for image downloads and the LLM provider
    let http_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let fetcher = Arc::new(HttpImageFetcher::new(
        http_client.clone(),
        settings.max_image_bytes,
        settings.fetch_timeout,
    ));
    log::info!(
        "✅ Image fetcher initialized (max {} bytes)",
        settings.max_image_bytes
    );

    let anthropic = Arc::new(
        AnthropicClient::new(
            http_client,
            settings.anthropic_api_key.clone(),
            settings.anthropic_model.clone(),
            prompts,
        )
        .with_base_url(settings.anthropic_base_url.clone())
        .with_max_tokens(settings.description_max_tokens, settings.feedback_max_tokens),
    );
    log::info!(
        "✅ Anthropic client initialized with model: {}",
        settings.anthropic_model
    );

    let diet_handler = Arc::new(DietHandler::new(fetcher, anthropic.clone(), anthropic));
    let app = create_router(diet_handler, &settings.static_dir);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind_addr))?;

    log::info!("🌐 Server listening on {}", settings.bind_addr);
    log::info!("🖼️ Static files served from ./{} at /static", settings.static_dir);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    log::info!("🛑 Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("❌ Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("🛑 Shutting down...");
}
