// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod fetch;
pub mod metrics;
pub mod ratelimit;
pub mod robots;
pub mod scorer;
pub mod signal;
pub mod sources;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::cache::ResponseCache;
pub use crate::engine::EnrichmentEngine;
pub use crate::signal::{EnrichmentRequest, EnrichmentResponse, EnrichmentSignal, RawSignal};
pub use crate::sources::{SourceClient, SourceContext, SourceRegistry};
