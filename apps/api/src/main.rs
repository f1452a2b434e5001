mod chunking;
mod config;
mod errors;
mod extraction;
mod llm_client;
mod models;
mod normalization;
mod pipeline;
mod routes;
mod state;
mod structuring;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::{Config, Provider};
use crate::extraction::{ExtractOptions, OcrEngine, TesseractOcr};
use crate::llm_client::{AnthropicOracle, GeminiOracle, OpenAiOracle, StructuringOracle};
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::routes::build_router;
use crate::state::AppState;
use crate::structuring::ProviderChain;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on bad or missing values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV Draft API v{}", env!("CARGO_PKG_VERSION"));
    info!(?config, "Configuration loaded");

    // Structuring oracles, in fallback order
    let providers = build_providers(&config)?;
    let chain = ProviderChain::new(providers, config.oracle_timeout);
    info!(
        "Structuring providers: {} (timeout {}s)",
        chain.provider_names().join(" -> "),
        config.oracle_timeout.as_secs()
    );

    // OCR fallback for image-only PDFs
    let ocr: Option<Arc<dyn OcrEngine>> = if config.ocr_enabled {
        info!("OCR fallback enabled (pdftoppm + tesseract)");
        Some(Arc::new(TesseractOcr::default()))
    } else {
        warn!("OCR fallback disabled; image-only PDFs will yield little or no text");
        None
    };

    let settings = PipelineSettings {
        chunk_threshold_chars: config.chunk_threshold_chars,
        chunk_target_chars: config.chunk_target_chars,
        chunk_overlap_chars: config.chunk_overlap_chars,
        max_concurrent_chunks: config.max_concurrent_chunks,
        extract: ExtractOptions {
            min_pdf_text_chars: config.min_pdf_text_chars,
            ocr,
        },
    };

    // Build app state
    let state = AppState {
        pipeline: Pipeline::new(chain, settings),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // TODO: restrict origins once the upload UI has a fixed host
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs one oracle adapter per configured provider that has a key.
fn build_providers(config: &Config) -> Result<Vec<Arc<dyn StructuringOracle>>> {
    config
        .enabled_providers()
        .into_iter()
        .map(|(provider, key)| {
            let oracle: Arc<dyn StructuringOracle> = match provider {
                Provider::Anthropic => Arc::new(AnthropicOracle::new(key)?),
                Provider::OpenAi => Arc::new(OpenAiOracle::new(key)?),
                Provider::Gemini => Arc::new(GeminiOracle::new(key)?),
            };
            Ok(oracle)
        })
        .collect::<Result<Vec<_>>>()
        .context("Failed to construct structuring providers")
}
