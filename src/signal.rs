// src/signal.rs
//! # Signal Model
//! Core data types for the enrichment pipeline: signal/effect vocabularies,
//! raw (pre-scoring) signals as emitted by source clients, scored signals as
//! returned to callers, and the request/response/aggregate envelope.
//!
//! Invariants: all three scores live in `[0.0, 1.0]`; `signal_id` is a stable
//! content hash, unique within a response after deduplication.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of procurement signal a source emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Weather,
    TrafficInfra,
    FuelPrice,
    Logistics,
    Market,
    Other,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Weather => "weather",
            SignalType::TrafficInfra => "traffic_infra",
            SignalType::FuelPrice => "fuel_price",
            SignalType::Logistics => "logistics",
            SignalType::Market => "market",
            SignalType::Other => "other",
        }
    }
}

/// Categorical label for the procurement impact a signal implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectTag {
    PriceIncrease,
    PriceDecrease,
    LeadTimeIncreased,
    LeadTimeDecreased,
    DemandIncreased,
    DemandDecreased,
    AvailabilityRisk,
}

impl EffectTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectTag::PriceIncrease => "price_increase",
            EffectTag::PriceDecrease => "price_decrease",
            EffectTag::LeadTimeIncreased => "lead_time_increased",
            EffectTag::LeadTimeDecreased => "lead_time_decreased",
            EffectTag::DemandIncreased => "demand_increased",
            EffectTag::DemandDecreased => "demand_decreased",
            EffectTag::AvailabilityRisk => "availability_risk",
        }
    }
}

/// Origin of a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSource {
    pub name: String,
    /// Trustworthiness of the source itself, `[0, 1]`.
    pub reliability_score: f32,
}

/// A signal as parsed out of a source, before scoring.
///
/// This is also the cache payload: a successful fetch stores the parsed
/// candidates, not the raw page, so a cache hit skips parsing entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSignal {
    pub source: SignalSource,
    pub signal_type: SignalType,
    pub title: String,
    pub summary: String,
    pub region: Option<String>,
    pub materials_affected: Vec<String>,
    pub published_date: DateTime<Utc>,
    pub effects: Vec<EffectTag>,
    pub tags: Vec<String>,
    /// Numeric magnitude where one exists (e.g. a fuel price in INR/L).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<f32>,
}

/// A fully scored signal as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentSignal {
    pub signal_id: String,
    pub signal_type: SignalType,
    pub source: SignalSource,
    pub title: String,
    pub summary: String,
    pub region: Option<String>,
    pub materials_affected: Vec<String>,
    pub published_date: DateTime<Utc>,
    pub relevance_score: f32,
    pub confidence_score: f32,
    pub impact_score: f32,
    pub effects: Vec<EffectTag>,
    pub tags: Vec<String>,
}

/// Request envelope for one enrichment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub site: String,
    pub materials: Vec<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default = "default_time_window_days")]
    pub time_window_days: u32,
    #[serde(default = "default_true")]
    pub use_scrapers: bool,
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f32,
}

fn default_time_window_days() -> u32 {
    30
}
fn default_true() -> bool {
    true
}
fn default_min_relevance() -> f32 {
    0.5
}

/// Aggregate statistics over the returned (post-filter) signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalAggregate {
    pub total_signals: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_effect: BTreeMap<String, usize>,
    pub avg_relevance: f32,
    pub avg_confidence: f32,
    pub avg_impact: f32,
    /// Signals with `impact_score > 0.7`.
    pub high_impact_count: usize,
    pub materials_coverage: BTreeMap<String, usize>,
}

/// Response envelope. Built fresh per request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentResponse {
    pub request_id: String,
    pub site: String,
    pub region: Option<String>,
    pub materials: Vec<String>,
    pub signals: Vec<EnrichmentSignal>,
    pub aggregates: SignalAggregate,
    pub sources_used: Vec<String>,
    pub processing_time_ms: f64,
    pub generated_at: DateTime<Utc>,
}

/// Lowercase, whitespace-collapsed title used for dedup and stable ids.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stable id for a signal: hash of source + normalized title + published day.
/// The same underlying event hashes identically whether it arrived from the
/// cache or a live refetch.
pub fn signal_id(raw: &RawSignal) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(raw.source.name.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(normalize_title(&raw.title).as_bytes());
    hasher.update(b"\x1f");
    hasher.update(raw.published_date.format("%Y-%m-%d").to_string().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Clamp to [0.0, 1.0].
pub fn clamp01(x: f32) -> f32 {
    if x < 0.0 {
        0.0
    } else if x > 1.0 {
        1.0
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(title: &str, day: u32) -> RawSignal {
        RawSignal {
            source: SignalSource {
                name: "India Meteorological Department".into(),
                reliability_score: 0.95,
            },
            signal_type: SignalType::Weather,
            title: title.into(),
            summary: String::new(),
            region: None,
            materials_affected: vec![],
            published_date: Utc.with_ymd_and_hms(2025, 11, day, 10, 0, 0).unwrap(),
            effects: vec![],
            tags: vec![],
            magnitude: None,
        }
    }

    #[test]
    fn id_stable_across_title_case_and_time_of_day() {
        let a = raw("Heavy Rainfall  Warning", 7);
        let mut b = raw("heavy rainfall warning", 7);
        b.published_date = Utc.with_ymd_and_hms(2025, 11, 7, 23, 59, 0).unwrap();
        assert_eq!(signal_id(&a), signal_id(&b));
    }

    #[test]
    fn id_differs_across_days_and_sources() {
        let a = raw("Heavy rainfall warning", 7);
        let b = raw("Heavy rainfall warning", 8);
        assert_ne!(signal_id(&a), signal_id(&b));

        let mut c = raw("Heavy rainfall warning", 7);
        c.source.name = "Public Works Department".into();
        assert_ne!(signal_id(&a), signal_id(&c));
    }

    #[test]
    fn request_defaults_apply() {
        let req: EnrichmentRequest =
            serde_json::from_str(r#"{"site":"Mumbai Metro","materials":["Steel"]}"#).unwrap();
        assert_eq!(req.time_window_days, 30);
        assert!(req.use_scrapers);
        assert!(req.use_cache);
        assert!((req.min_relevance - 0.5).abs() < 1e-6);
        assert!(req.region.is_none());
    }
}
