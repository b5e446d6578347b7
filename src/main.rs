mod config;
mod context;
mod converter;
mod engines;
mod error;
mod handlers;
mod page_size;

use anyhow::Context;
use config::Config;
use context::RenderThread;
use converter::PdfConverter;
use engines::{ChromiumEngine, RenderEngine};
use handlers::AppState;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdfpress=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env();

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.output_dir.display()))?;

    let engine = Arc::new(ChromiumEngine::new(config.chrome_path.clone()));
    if engine.is_available().await {
        info!("✓ Chromium found at {}", config.chrome_path);
        if let Err(e) = engine.init().await {
            warn!("Failed to initialize Chromium CDP: {}", e);
        }
    } else {
        warn!("✗ Chromium not found at {}, conversions will fail", config.chrome_path);
    }

    // Every conversion runs on this thread
    let render = RenderThread::spawn().context("Failed to start render thread")?;

    let state = Arc::new(AppState {
        converter: PdfConverter::new(engine),
        context: render.context(),
        output_dir: config.output_dir.clone(),
    });

    let app = handlers::router(state);

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;

    info!("🚀 PDFPress server running on http://{}", config.addr);
    info!("📖 API documentation: http://{}/info", config.addr);
    info!("📄 Output directory: {}", config.output_dir.display());

    axum::serve(listener, app).await?;
    Ok(())
}
