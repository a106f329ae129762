// src/sources/mod.rs
//! # Source Clients
//! The `SourceClient` contract, the per-source descriptors, the explicit
//! registry built at startup, and the shared fetch pipeline every concrete
//! source goes through: cache key → cache lookup → robots gate → rate limit
//! → whitelisted HTTP GETs → source-specific parse → cache write.

pub mod fuel;
pub mod infrastructure;
pub mod logistics;
pub mod weather;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::{cache_key, ResponseCache};
use crate::fetch::{FetchError, FetchSession};
use crate::ratelimit::RateLimiter;
use crate::robots::RobotsGate;
use crate::signal::{RawSignal, SignalType};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "enrich_source_outcomes_total",
            "Per-source fetch outcomes by kind."
        );
        describe_counter!("enrich_cache_hits_total", "Response cache hits.");
        describe_counter!("enrich_cache_misses_total", "Response cache misses.");
        describe_counter!(
            "enrich_cache_corrupt_total",
            "Cache entries dropped as unreadable."
        );
        describe_counter!("enrich_signals_total", "Raw signals parsed from sources.");
        describe_counter!(
            "enrich_filtered_total",
            "Signals dropped below min_relevance."
        );
        describe_counter!("enrich_dedup_total", "Signals removed by deduplication.");
        describe_histogram!("enrich_fetch_ms", "Per-source fetch time in milliseconds.");
        describe_gauge!("enrich_last_run_ts", "Unix ts of the last enrichment run.");
    });
}

/// Static facts about one source. Constructed once at startup, immutable for
/// the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub signal_type: SignalType,
    pub allowed_domains: Vec<String>,
    pub reliability_score: f32,
    /// Trailing-60s request budget; 0 disables the source's traffic.
    pub requests_per_minute: u32,
    pub cache_ttl_hours: u64,
    pub respects_robots: bool,
}

impl SourceDescriptor {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours * 3600)
    }
}

/// The per-request slice of an `EnrichmentRequest` a source needs.
#[derive(Debug, Clone)]
pub struct SourceQuery {
    pub region: Option<String>,
    pub materials: Vec<String>,
    pub time_window_days: u32,
    pub use_cache: bool,
}

/// Capability every source implements. Concrete sources differ only in
/// their descriptor and parsing rules; the fetch discipline is shared.
#[async_trait::async_trait]
pub trait SourceClient: Send + Sync {
    fn descriptor(&self) -> &SourceDescriptor;
    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<RawSignal>, FetchError>;
}

/// Shared infrastructure handed to every source client.
pub struct SourceContext {
    pub cache: Arc<ResponseCache>,
    pub limiter: Arc<RateLimiter>,
    pub robots: Arc<RobotsGate>,
    pub session: FetchSession,
}

impl SourceContext {
    pub fn new(cache: Arc<ResponseCache>) -> Self {
        let session = FetchSession::new();
        Self {
            cache,
            limiter: Arc::new(RateLimiter::new()),
            robots: Arc::new(RobotsGate::new(session.clone())),
            session,
        }
    }
}

/// Where a source pulls its page bodies from. `Fixture` feeds a canned body
/// straight into the parser; tests and offline runs use it.
#[derive(Debug, Clone)]
pub enum FetchMode {
    Live,
    Fixture(String),
}

/// Shared fetch discipline for live sources.
///
/// Robots is evaluated per URL; only if every candidate URL is disallowed
/// does the whole fetch come back `RobotsDisallowed`. A rate-limit denial
/// after some pages already parsed returns the partial candidates instead
/// of discarding them.
pub async fn run_pipeline<F>(
    ctx: &SourceContext,
    desc: &SourceDescriptor,
    query: &SourceQuery,
    urls: &[String],
    parse: F,
) -> Result<Vec<RawSignal>, FetchError>
where
    F: Fn(&str) -> Result<Vec<RawSignal>, FetchError>,
{
    let key = cache_key(
        &desc.name,
        query.region.as_deref(),
        &query.materials,
        query.time_window_days,
    );

    if query.use_cache {
        if let Some(payload) = ctx.cache.get(&key) {
            counter!("enrich_cache_hits_total").increment(1);
            debug!(source = %desc.name, signals = payload.len(), "cache hit");
            return Ok(payload);
        }
        counter!("enrich_cache_misses_total").increment(1);
    }

    let mut candidates: Vec<RawSignal> = Vec::new();
    let mut fetched_any = false;
    let mut robots_blocked = 0usize;
    let mut last_err: Option<FetchError> = None;

    for url in urls {
        if desc.respects_robots {
            let (domain, path) = split_url(url);
            if !ctx.robots.is_allowed(&domain, &path).await {
                robots_blocked += 1;
                continue;
            }
        }

        if !ctx.limiter.acquire(&desc.name, desc.requests_per_minute).await {
            if candidates.is_empty() && !fetched_any {
                return Err(FetchError::RateLimited);
            }
            break;
        }

        let body = match ctx.session.get_text(url, &desc.allowed_domains).await {
            Ok(b) => b,
            Err(e) => {
                debug!(source = %desc.name, url, error = %e, "page fetch failed");
                last_err = Some(e);
                continue;
            }
        };

        match parse(&body) {
            Ok(mut parsed) => {
                fetched_any = true;
                candidates.append(&mut parsed);
            }
            Err(e) => {
                debug!(source = %desc.name, url, error = %e, "page parse failed");
                last_err = Some(e);
            }
        }
    }

    if !fetched_any {
        if robots_blocked == urls.len() && !urls.is_empty() {
            return Err(FetchError::RobotsDisallowed);
        }
        if let Some(e) = last_err {
            return Err(e);
        }
    }

    counter!("enrich_signals_total").increment(candidates.len() as u64);

    // An empty parse is still a successful fetch; caching it keeps quiet
    // sources from being refetched on every request within TTL.
    if query.use_cache && fetched_any {
        if let Err(e) = ctx.cache.set(&key, &candidates, desc.cache_ttl()) {
            tracing::warn!(source = %desc.name, error = %e, "cache write failed");
        }
    }

    Ok(candidates)
}

fn split_url(url: &str) -> (String, String) {
    match reqwest::Url::parse(url) {
        Ok(u) => (
            u.host_str().unwrap_or_default().to_string(),
            u.path().to_string(),
        ),
        Err(_) => (String::new(), url.to_string()),
    }
}

/// Explicit set of source clients, constructed at startup and injected into
/// the engine. No ambient global registry.
pub struct SourceRegistry {
    clients: Vec<Arc<dyn SourceClient>>,
}

impl SourceRegistry {
    /// Build the four standard clients over a shared context.
    pub fn standard(ctx: Arc<SourceContext>, descriptors: &crate::config::SourceDescriptors) -> Self {
        let clients: Vec<Arc<dyn SourceClient>> = vec![
            Arc::new(weather::WeatherSource::new(
                ctx.clone(),
                descriptors.weather.clone(),
            )),
            Arc::new(infrastructure::InfrastructureSource::new(
                ctx.clone(),
                descriptors.infrastructure.clone(),
            )),
            Arc::new(fuel::FuelPriceSource::new(ctx.clone(), descriptors.fuel.clone())),
            Arc::new(logistics::LogisticsSource::new(
                ctx.clone(),
                descriptors.logistics.clone(),
            )),
        ];
        info!(count = clients.len(), "source registry built");
        Self { clients }
    }

    /// Registry over arbitrary clients. New sources register here
    /// explicitly; tests inject stubs the same way.
    pub fn from_clients(clients: Vec<Arc<dyn SourceClient>>) -> Self {
        Self { clients }
    }

    pub fn clients(&self) -> &[Arc<dyn SourceClient>] {
        &self.clients
    }

    pub fn descriptors(&self) -> Vec<SourceDescriptor> {
        self.clients.iter().map(|c| c.descriptor().clone()).collect()
    }
}

/// Normalize scraped text: decode entities, strip tags, collapse
/// whitespace, trim trailing punctuation, cap length.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    while let Some(last) = out.chars().last() {
        if matches!(last, '!' | '?' | '.' | ',') {
            out.pop();
        } else {
            break;
        }
    }

    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// First `max` chars of normalized text, for summaries.
pub fn summarize(s: &str, max: usize) -> String {
    let norm = normalize_text(s);
    if norm.chars().count() <= max {
        norm
    } else {
        norm.chars().take(max).collect()
    }
}

const INDIAN_STATES: [&str; 9] = [
    "Maharashtra",
    "Gujarat",
    "Karnataka",
    "Tamil Nadu",
    "Delhi",
    "Uttar Pradesh",
    "Rajasthan",
    "West Bengal",
    "Madhya Pradesh",
];

/// Best-effort region extraction from free text.
pub fn extract_region(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    INDIAN_STATES
        .iter()
        .find(|s| lower.contains(&s.to_lowercase()))
        .map(|s| s.to_string())
}

/// Parse a `dd-mm-yyyy` / `dd/mm/yy` style date out of free text;
/// unparseable dates fall back to `now` (pages rarely carry clean stamps).
pub fn extract_date(text: &str) -> DateTime<Utc> {
    static RE_DATE: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE_DATE.get_or_init(|| {
        regex::Regex::new(r"(\d{1,2})[-/](\d{1,2})[-/](\d{2,4})").unwrap()
    });

    if let Some(caps) = re.captures(text) {
        let day: u32 = caps[1].parse().unwrap_or(0);
        let month: u32 = caps[2].parse().unwrap_or(0);
        let mut year: i32 = caps[3].parse().unwrap_or(0);
        if year < 100 {
            year += 2000;
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Utc.from_utc_datetime(&dt);
            }
        }
    }
    Utc::now()
}

/// RFC2822 `pubDate` → UTC; feed items without a usable date get `now`.
pub fn parse_rfc2822(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc2822(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
