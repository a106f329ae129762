//! Procurement Signal Enricher — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the source registry, cache, and
//! middleware.
//!
//! See `README.md` for quickstart.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use procurement_signal_enricher::api::{create_router, AppState};
use procurement_signal_enricher::cache::ResponseCache;
use procurement_signal_enricher::config::{self, SourceDescriptors};
use procurement_signal_enricher::engine::EnrichmentEngine;
use procurement_signal_enricher::metrics::Metrics;
use procurement_signal_enricher::sources::{SourceContext, SourceRegistry};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("procurement_signal_enricher=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let metrics = Metrics::init()?;

    let descriptors = SourceDescriptors::load_default();
    let cache = Arc::new(ResponseCache::new(config::cache_dir())?);
    let ctx = Arc::new(SourceContext::new(cache.clone()));
    let registry = SourceRegistry::standard(ctx, &descriptors);
    let engine = Arc::new(EnrichmentEngine::new(registry, cache));

    let router = create_router(AppState { engine }).merge(metrics.router());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
