// src/metrics.rs
use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder. Must run once, before any
    /// counter/gauge macro fires, or those samples are dropped.
    pub fn init() -> anyhow::Result<Self> {
        // Default buckets to avoid API differences across crate versions.
        let builder = PrometheusBuilder::new();
        let handle = builder.install_recorder()?;
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
