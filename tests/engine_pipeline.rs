// tests/engine_pipeline.rs
//! End-to-end engine behavior with stubbed source clients: partial source
//! failure, relevance filtering, dedup, ordering, aggregates.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use procurement_signal_enricher::cache::ResponseCache;
use procurement_signal_enricher::engine::EnrichmentEngine;
use procurement_signal_enricher::fetch::FetchError;
use procurement_signal_enricher::signal::{
    EffectTag, EnrichmentRequest, RawSignal, SignalSource, SignalType,
};
use procurement_signal_enricher::sources::{
    SourceClient, SourceDescriptor, SourceQuery, SourceRegistry,
};

struct StubSource {
    desc: SourceDescriptor,
    outcome: Result<Vec<RawSignal>, FetchError>,
}

#[async_trait::async_trait]
impl SourceClient for StubSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.desc
    }

    async fn fetch(&self, _query: &SourceQuery) -> Result<Vec<RawSignal>, FetchError> {
        match &self.outcome {
            Ok(v) => Ok(v.clone()),
            Err(FetchError::RateLimited) => Err(FetchError::RateLimited),
            Err(FetchError::RobotsDisallowed) => Err(FetchError::RobotsDisallowed),
            Err(FetchError::Transient(m)) => Err(FetchError::Transient(m.clone())),
            Err(FetchError::Parse(m)) => Err(FetchError::Parse(m.clone())),
        }
    }
}

fn desc(name: &str, signal_type: SignalType, reliability: f32) -> SourceDescriptor {
    SourceDescriptor {
        name: name.to_string(),
        signal_type,
        allowed_domains: vec!["example.invalid".into()],
        reliability_score: reliability,
        requests_per_minute: 10,
        cache_ttl_hours: 1,
        respects_robots: true,
    }
}

fn raw(
    source: &str,
    reliability: f32,
    signal_type: SignalType,
    title: &str,
    region: Option<&str>,
    materials: &[&str],
    effects: &[EffectTag],
) -> RawSignal {
    RawSignal {
        source: SignalSource {
            name: source.to_string(),
            reliability_score: reliability,
        },
        signal_type,
        title: title.to_string(),
        summary: String::new(),
        region: region.map(|r| r.to_string()),
        materials_affected: materials.iter().map(|m| m.to_string()).collect(),
        published_date: Utc::now() - ChronoDuration::hours(2),
        effects: effects.to_vec(),
        tags: vec![],
        magnitude: None,
    }
}

fn engine_with(clients: Vec<Arc<dyn SourceClient>>) -> (EnrichmentEngine, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(ResponseCache::new(dir.path()).unwrap());
    (
        EnrichmentEngine::new(SourceRegistry::from_clients(clients), cache),
        dir,
    )
}

fn request() -> EnrichmentRequest {
    serde_json::from_value(serde_json::json!({
        "site": "Pune Metro Line 3",
        "materials": ["Cement", "Steel"],
        "region": "Maharashtra"
    }))
    .unwrap()
}

#[tokio::test]
async fn failing_sources_degrade_instead_of_failing_the_request() {
    let good = raw(
        "IMD Weather",
        0.95,
        SignalType::Weather,
        "Heavy rainfall warning for Maharashtra",
        Some("Maharashtra"),
        &["Cement", "Steel"],
        &[EffectTag::AvailabilityRisk, EffectTag::LeadTimeIncreased],
    );
    let clients: Vec<Arc<dyn SourceClient>> = vec![
        Arc::new(StubSource {
            desc: desc("IMD Weather", SignalType::Weather, 0.95),
            outcome: Ok(vec![good]),
        }),
        Arc::new(StubSource {
            desc: desc("PWD Notices", SignalType::TrafficInfra, 0.80),
            outcome: Err(FetchError::Transient("connection refused".into())),
        }),
        Arc::new(StubSource {
            desc: desc("Fuel Prices", SignalType::FuelPrice, 0.85),
            outcome: Err(FetchError::RobotsDisallowed),
        }),
        Arc::new(StubSource {
            desc: desc("Port Updates", SignalType::Logistics, 0.80),
            outcome: Err(FetchError::RateLimited),
        }),
    ];
    let (engine, _dir) = engine_with(clients);

    let resp = engine.enrich(&request()).await;
    assert_eq!(resp.sources_used, vec!["IMD Weather".to_string()]);
    assert_eq!(resp.signals.len(), 1);
    assert_eq!(resp.aggregates.total_signals, 1);
    assert!(resp.processing_time_ms >= 0.0);
    assert!(resp.request_id.starts_with("req_"));
}

#[tokio::test]
async fn min_relevance_filters_off_region_noise() {
    let on_region = raw(
        "IMD Weather",
        0.95,
        SignalType::Weather,
        "Cyclone alert coastal Maharashtra",
        Some("Maharashtra"),
        &["Cement", "Steel"],
        &[EffectTag::AvailabilityRisk],
    );
    let off_region = raw(
        "IMD Weather",
        0.95,
        SignalType::Weather,
        "Heatwave advisory for Rajasthan",
        Some("Rajasthan"),
        &["Sand"],
        &[EffectTag::LeadTimeIncreased],
    );
    let clients: Vec<Arc<dyn SourceClient>> = vec![Arc::new(StubSource {
        desc: desc("IMD Weather", SignalType::Weather, 0.95),
        outcome: Ok(vec![on_region, off_region]),
    })];
    let (engine, _dir) = engine_with(clients);

    let resp = engine.enrich(&request()).await;
    // Wrong region plus no requested material lands well under the 0.5 default.
    assert_eq!(resp.signals.len(), 1);
    assert!(resp.signals[0].title.contains("Cyclone"));
    assert!(resp.signals[0].relevance_score >= 0.5);
}

#[tokio::test]
async fn strict_min_relevance_empties_signals_and_aggregates() {
    let good = raw(
        "IMD Weather",
        0.95,
        SignalType::Weather,
        "Heavy rainfall warning for Maharashtra",
        Some("Maharashtra"),
        &["Cement", "Steel"],
        &[EffectTag::AvailabilityRisk],
    );
    let clients: Vec<Arc<dyn SourceClient>> = vec![Arc::new(StubSource {
        desc: desc("IMD Weather", SignalType::Weather, 0.95),
        outcome: Ok(vec![good]),
    })];
    let (engine, _dir) = engine_with(clients);

    let mut req = request();
    req.min_relevance = 0.95;
    let resp = engine.enrich(&req).await;

    // The signal scores ~0.85 relevance: retained at 0.5, gone at 0.95.
    assert!(resp.signals.is_empty());
    assert_eq!(resp.aggregates.total_signals, 0);
    // Raw contribution still visible for degradation diagnostics.
    assert_eq!(resp.sources_used, vec!["IMD Weather".to_string()]);
}

#[tokio::test]
async fn duplicate_titles_from_one_source_collapse() {
    let a = raw(
        "PWD Notices",
        0.80,
        SignalType::TrafficInfra,
        "NH-48 closure near Pune",
        Some("Maharashtra"),
        &["Cement"],
        &[EffectTag::LeadTimeIncreased],
    );
    let mut b = a.clone();
    b.title = "  nh-48   CLOSURE near Pune ".to_string();
    let clients: Vec<Arc<dyn SourceClient>> = vec![Arc::new(StubSource {
        desc: desc("PWD Notices", SignalType::TrafficInfra, 0.80),
        outcome: Ok(vec![a, b]),
    })];
    let (engine, _dir) = engine_with(clients);

    let resp = engine.enrich(&request()).await;
    assert_eq!(resp.signals.len(), 1);
}

#[tokio::test]
async fn signals_come_back_sorted_by_relevance_then_impact() {
    let strong = raw(
        "IMD Weather",
        0.95,
        SignalType::Weather,
        "Severe cyclone warning Maharashtra coast",
        Some("Maharashtra"),
        &["Cement", "Steel"],
        &[EffectTag::AvailabilityRisk, EffectTag::LeadTimeIncreased],
    );
    let weaker = raw(
        "Port Updates",
        0.80,
        SignalType::Logistics,
        "Minor berthing delays at JNPT",
        None,
        &["Steel"],
        &[EffectTag::LeadTimeIncreased],
    );
    let clients: Vec<Arc<dyn SourceClient>> = vec![
        Arc::new(StubSource {
            desc: desc("IMD Weather", SignalType::Weather, 0.95),
            outcome: Ok(vec![strong]),
        }),
        Arc::new(StubSource {
            desc: desc("Port Updates", SignalType::Logistics, 0.80),
            outcome: Ok(vec![weaker]),
        }),
    ];
    let (engine, _dir) = engine_with(clients);

    let mut req = request();
    req.min_relevance = 0.0;
    let resp = engine.enrich(&req).await;

    assert_eq!(resp.signals.len(), 2);
    for pair in resp.signals.windows(2) {
        assert!(pair[0].relevance_score >= pair[1].relevance_score);
    }
    for s in &resp.signals {
        for v in [s.relevance_score, s.confidence_score, s.impact_score] {
            assert!((0.0..=1.0).contains(&v), "score out of range: {v}");
        }
    }
    assert_eq!(
        resp.sources_used,
        vec!["IMD Weather".to_string(), "Port Updates".to_string()]
    );
}

#[tokio::test]
async fn scrapers_disabled_yields_an_empty_but_well_formed_response() {
    let clients: Vec<Arc<dyn SourceClient>> = vec![Arc::new(StubSource {
        desc: desc("IMD Weather", SignalType::Weather, 0.95),
        outcome: Ok(vec![raw(
            "IMD Weather",
            0.95,
            SignalType::Weather,
            "should never be fetched",
            Some("Maharashtra"),
            &["Cement"],
            &[EffectTag::AvailabilityRisk],
        )]),
    })];
    let (engine, _dir) = engine_with(clients);

    let mut req = request();
    req.use_scrapers = false;
    let resp = engine.enrich(&req).await;

    assert!(resp.signals.is_empty());
    assert!(resp.sources_used.is_empty());
    assert_eq!(resp.aggregates.total_signals, 0);
    assert_eq!(resp.site, "Pune Metro Line 3");
}

#[tokio::test]
async fn aggregates_reflect_the_surviving_signals() {
    let weather = raw(
        "IMD Weather",
        0.95,
        SignalType::Weather,
        "Heavy rain warning Maharashtra",
        Some("Maharashtra"),
        &["Cement", "Steel"],
        &[EffectTag::AvailabilityRisk, EffectTag::LeadTimeIncreased],
    );
    let fuel = raw(
        "Fuel Prices",
        0.85,
        SignalType::FuelPrice,
        "Diesel price in Mumbai: ₹89.50/L",
        Some("Maharashtra"),
        &["General"],
        &[EffectTag::PriceIncrease],
    );
    let clients: Vec<Arc<dyn SourceClient>> = vec![
        Arc::new(StubSource {
            desc: desc("IMD Weather", SignalType::Weather, 0.95),
            outcome: Ok(vec![weather]),
        }),
        Arc::new(StubSource {
            desc: desc("Fuel Prices", SignalType::FuelPrice, 0.85),
            outcome: Ok(vec![fuel]),
        }),
    ];
    let (engine, _dir) = engine_with(clients);

    let resp = engine.enrich(&request()).await;
    let agg = &resp.aggregates;
    assert_eq!(agg.total_signals, resp.signals.len());
    assert_eq!(agg.by_type.values().sum::<usize>(), resp.signals.len());
    // "General" counts toward every requested material.
    assert!(agg.materials_coverage.get("Cement").copied().unwrap_or(0) >= 1);
    assert!(agg.materials_coverage.get("Steel").copied().unwrap_or(0) >= 1);
    assert!((0.0..=1.0).contains(&agg.avg_relevance));
}
