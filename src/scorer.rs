// src/scorer.rs
//! # Scorer
//! Deterministic heuristic scoring of raw signals against a request.
//! No NLP, no ML: source reliability and freshness drive confidence,
//! region/material/type match drives relevance, and effect severity drives
//! impact. Everything lands in `[0, 1]`.
//!
//! The engine, not the scorer, applies the `min_relevance` filter, so
//! aggregation can still observe what was dropped.

use chrono::Utc;

use crate::signal::{
    clamp01, normalize_title, signal_id, EffectTag, EnrichmentRequest, EnrichmentSignal,
    RawSignal, SignalType,
};

// Relevance component weights.
const W_REGION: f32 = 0.35;
const W_MATERIALS: f32 = 0.35;
const W_TYPE_FIT: f32 = 0.30;

/// Relevance score a region mismatch still contributes (a cyclone next
/// door is not zero information).
const REGION_MISMATCH: f32 = 0.1;

/// Freshness floor for signals far older than the request window.
const FRESHNESS_FLOOR: f32 = 0.3;

/// Effects beyond the two strongest contribute at a quarter weight.
const DIMINISHED: f32 = 0.25;

/// Base severity of each effect on procurement.
fn effect_weight(effect: EffectTag) -> f32 {
    match effect {
        EffectTag::AvailabilityRisk => 0.9,
        EffectTag::PriceIncrease => 0.6,
        EffectTag::LeadTimeIncreased => 0.5,
        EffectTag::DemandIncreased => 0.5,
        EffectTag::PriceDecrease => 0.3,
        EffectTag::LeadTimeDecreased => 0.3,
        EffectTag::DemandDecreased => 0.3,
    }
}

/// How pertinent a signal type is to procurement requests in general.
fn type_fit(signal_type: SignalType) -> f32 {
    match signal_type {
        SignalType::FuelPrice | SignalType::Logistics => 0.7,
        SignalType::TrafficInfra => 0.6,
        SignalType::Weather | SignalType::Market => 0.5,
        SignalType::Other => 0.3,
    }
}

/// Score one raw signal into an `EnrichmentSignal`.
pub fn score(raw: &RawSignal, request: &EnrichmentRequest) -> EnrichmentSignal {
    let relevance = relevance_score(raw, request);
    let confidence = confidence_score(raw, request.time_window_days);
    let impact = impact_score(&raw.effects);

    EnrichmentSignal {
        signal_id: signal_id(raw),
        signal_type: raw.signal_type,
        source: raw.source.clone(),
        title: raw.title.clone(),
        summary: raw.summary.clone(),
        region: raw.region.clone(),
        materials_affected: raw.materials_affected.clone(),
        published_date: raw.published_date,
        relevance_score: relevance,
        confidence_score: confidence,
        impact_score: impact,
        effects: raw.effects.clone(),
        tags: raw.tags.clone(),
    }
}

/// `reliability × freshness`. Signals inside the request window are fully
/// fresh; older ones decay linearly down to a floor.
fn confidence_score(raw: &RawSignal, time_window_days: u32) -> f32 {
    let window = time_window_days.max(1) as f32;
    let age_days = (Utc::now() - raw.published_date).num_hours() as f32 / 24.0;
    let age_days = age_days.max(0.0);

    let freshness = if age_days <= window {
        1.0
    } else {
        FRESHNESS_FLOOR.max(1.0 - (age_days - window) / window)
    };
    clamp01(raw.source.reliability_score * freshness)
}

fn relevance_score(raw: &RawSignal, request: &EnrichmentRequest) -> f32 {
    let region_match = match (&request.region, &raw.region) {
        // Caller did not scope by region: everything matches.
        (None, _) => 1.0,
        (Some(want), Some(have)) => {
            if normalize_title(want) == normalize_title(have) {
                1.0
            } else {
                REGION_MISMATCH
            }
        }
        // Signal carries no region: treat as country-wide.
        (Some(_), None) => 0.5,
    };

    let material_overlap = if request.materials.is_empty() {
        1.0
    } else {
        let wanted: Vec<String> = request.materials.iter().map(|m| m.to_lowercase()).collect();
        let general = raw
            .materials_affected
            .iter()
            .any(|m| m.eq_ignore_ascii_case("General"));
        if general {
            1.0
        } else {
            let hits = raw
                .materials_affected
                .iter()
                .filter(|m| wanted.contains(&m.to_lowercase()))
                .count();
            hits as f32 / request.materials.len().max(1) as f32
        }
    };

    clamp01(
        W_REGION * region_match
            + W_MATERIALS * material_overlap.min(1.0)
            + W_TYPE_FIT * type_fit(raw.signal_type),
    )
}

/// Sum of effect severities with diminishing returns: the two strongest
/// effects count fully, the rest at a quarter weight.
fn impact_score(effects: &[EffectTag]) -> f32 {
    let mut weights: Vec<f32> = effects.iter().map(|e| effect_weight(*e)).collect();
    weights.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let mut total = 0.0;
    for (i, w) in weights.iter().enumerate() {
        total += if i < 2 { *w } else { *w * DIMINISHED };
    }
    clamp01(total)
}
