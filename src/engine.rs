// src/engine.rs
//! # Enrichment Engine
//! Orchestrates one enrichment run: dispatch eligible source clients onto a
//! bounded worker pool, await them under a hard per-source budget, then
//! merge → score → dedupe → filter → aggregate.
//!
//! There is no fatal path. A source that times out, errors, or finds
//! nothing contributes zero signals; the response always carries
//! `sources_used` and `processing_time_ms` so callers can detect
//! degradation without an error.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, gauge, histogram};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::cache::{CacheStats, ResponseCache};
use crate::dedup;
use crate::scorer;
use crate::signal::{
    EnrichmentRequest, EnrichmentResponse, EnrichmentSignal, RawSignal, SignalAggregate,
};
use crate::sources::{ensure_metrics_described, SourceQuery, SourceRegistry};

/// Hard cap on concurrently fetching sources.
const MAX_WORKERS: usize = 4;

/// Per-source overall budget; a client that exceeds it is abandoned for
/// this request, no retry, no partial salvage.
const SOURCE_BUDGET: Duration = Duration::from_secs(30);

pub struct EnrichmentEngine {
    registry: SourceRegistry,
    cache: Arc<ResponseCache>,
    max_workers: usize,
}

impl EnrichmentEngine {
    pub fn new(registry: SourceRegistry, cache: Arc<ResponseCache>) -> Self {
        ensure_metrics_described();
        Self {
            registry,
            cache,
            max_workers: MAX_WORKERS,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached payload; returns the number of entries removed.
    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }

    /// Run one enrichment request end to end.
    pub async fn enrich(&self, request: &EnrichmentRequest) -> EnrichmentResponse {
        let started = Instant::now();
        let request_id = new_request_id();

        let (raw_signals, mut sources_used) = if request.use_scrapers {
            self.collect(request).await
        } else {
            (Vec::new(), Vec::new())
        };

        let scored: Vec<EnrichmentSignal> = raw_signals
            .iter()
            .map(|r| scorer::score(r, request))
            .collect();

        let (unique, removed) = dedup::dedupe(scored);
        counter!("enrich_dedup_total").increment(removed as u64);

        let before = unique.len();
        let mut kept: Vec<EnrichmentSignal> = unique
            .into_iter()
            .filter(|s| s.relevance_score >= request.min_relevance)
            .collect();
        counter!("enrich_filtered_total").increment((before - kept.len()) as u64);

        // Presentation order only; nothing upstream guarantees any
        // cross-source ordering.
        kept.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.impact_score
                        .partial_cmp(&a.impact_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        let aggregates = generate_aggregates(&kept, &request.materials);
        gauge!("enrich_last_run_ts").set(Utc::now().timestamp() as f64);
        sources_used.sort();

        EnrichmentResponse {
            request_id,
            site: request.site.clone(),
            region: request.region.clone(),
            materials: request.materials.clone(),
            signals: kept,
            aggregates,
            sources_used,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            generated_at: Utc::now(),
        }
    }

    /// Fan out to all clients under the worker cap and the per-source
    /// budget. Returns the flattened raw signals and the names of sources
    /// that contributed at least one.
    async fn collect(&self, request: &EnrichmentRequest) -> (Vec<RawSignal>, Vec<String>) {
        let clients = self.registry.clients();
        if clients.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let query = SourceQuery {
            region: request.region.clone(),
            materials: request.materials.clone(),
            time_window_days: request.time_window_days,
            use_cache: request.use_cache,
        };

        let workers = clients.len().min(self.max_workers).max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut set = JoinSet::new();

        for client in clients.iter().cloned() {
            let semaphore = semaphore.clone();
            let query = query.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire().await;
                let name = client.descriptor().name.clone();
                let t0 = Instant::now();
                let outcome = tokio::time::timeout(SOURCE_BUDGET, client.fetch(&query)).await;
                histogram!("enrich_fetch_ms").record(t0.elapsed().as_secs_f64() * 1000.0);
                (name, outcome)
            });
        }

        let mut raw = Vec::new();
        let mut sources_used = Vec::new();

        while let Some(joined) = set.join_next().await {
            let (name, outcome) = match joined {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "source task failed to join");
                    continue;
                }
            };
            match outcome {
                Ok(Ok(signals)) => {
                    counter!("enrich_source_outcomes_total", "kind" => "ok").increment(1);
                    info!(source = %name, signals = signals.len(), "source fetch complete");
                    if !signals.is_empty() {
                        sources_used.push(name);
                    }
                    raw.extend(signals);
                }
                Ok(Err(e)) => {
                    counter!("enrich_source_outcomes_total", "kind" => e.kind()).increment(1);
                    warn!(source = %name, kind = e.kind(), error = %e, "source contributed nothing");
                }
                Err(_) => {
                    counter!("enrich_source_outcomes_total", "kind" => "timeout").increment(1);
                    warn!(
                        source = %name,
                        budget_secs = SOURCE_BUDGET.as_secs(),
                        "source exceeded budget; abandoned"
                    );
                }
            }
        }

        (raw, sources_used)
    }
}

fn new_request_id() -> String {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("req_{stamp}_{}", &suffix[..8])
}

fn generate_aggregates(signals: &[EnrichmentSignal], materials: &[String]) -> SignalAggregate {
    if signals.is_empty() {
        return SignalAggregate::default();
    }

    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_effect: BTreeMap<String, usize> = BTreeMap::new();
    for s in signals {
        *by_type.entry(s.signal_type.as_str().to_string()).or_default() += 1;
        for e in &s.effects {
            *by_effect.entry(e.as_str().to_string()).or_default() += 1;
        }
    }

    let n = signals.len() as f32;
    let avg_relevance = signals.iter().map(|s| s.relevance_score).sum::<f32>() / n;
    let avg_confidence = signals.iter().map(|s| s.confidence_score).sum::<f32>() / n;
    let avg_impact = signals.iter().map(|s| s.impact_score).sum::<f32>() / n;

    let high_impact_count = signals.iter().filter(|s| s.impact_score > 0.7).count();

    let mut materials_coverage = BTreeMap::new();
    for material in materials {
        let count = signals
            .iter()
            .filter(|s| {
                s.materials_affected
                    .iter()
                    .any(|m| m.eq_ignore_ascii_case(material) || m.eq_ignore_ascii_case("General"))
            })
            .count();
        materials_coverage.insert(material.clone(), count);
    }

    SignalAggregate {
        total_signals: signals.len(),
        by_type,
        by_effect,
        avg_relevance: round2(avg_relevance),
        avg_confidence: round2(avg_confidence),
        avg_impact: round2(avg_impact),
        high_impact_count,
        materials_coverage,
    }
}

fn round2(x: f32) -> f32 {
    (x * 100.0).round() / 100.0
}
