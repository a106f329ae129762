// src/sources/weather.rs
//! Weather authority client (India Meteorological Department). Regional
//! warning bulletins are published as RSS; each item becomes a candidate
//! signal with effects inferred from the warning text.

use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::fetch::FetchError;
use crate::signal::{EffectTag, RawSignal, SignalSource, SignalType};
use crate::sources::{
    extract_region, normalize_text, parse_rfc2822, run_pipeline, summarize, FetchMode,
    SourceClient, SourceContext, SourceDescriptor, SourceQuery,
};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

pub struct WeatherSource {
    ctx: Arc<SourceContext>,
    desc: SourceDescriptor,
    mode: FetchMode,
}

impl WeatherSource {
    pub fn new(ctx: Arc<SourceContext>, desc: SourceDescriptor) -> Self {
        Self {
            ctx,
            desc,
            mode: FetchMode::Live,
        }
    }

    pub fn from_fixture(ctx: Arc<SourceContext>, desc: SourceDescriptor, body: &str) -> Self {
        Self {
            ctx,
            desc,
            mode: FetchMode::Fixture(body.to_string()),
        }
    }

    /// Regional warning feed plus the national one as fallback.
    fn feed_urls(&self, region: Option<&str>) -> Vec<String> {
        let base = "https://mausam.imd.gov.in";
        let regional = match region {
            Some("Maharashtra") => Some(format!("{base}/mumbai/warnings.xml")),
            Some("Gujarat") => Some(format!("{base}/ahmedabad/warnings.xml")),
            Some("Karnataka") => Some(format!("{base}/bengaluru/warnings.xml")),
            Some("Tamil Nadu") => Some(format!("{base}/chennai/warnings.xml")),
            Some("Delhi") => Some(format!("{base}/delhi/warnings.xml")),
            _ => None,
        };
        let mut urls = vec![format!("{base}/warnings.xml")];
        if let Some(r) = regional {
            urls.insert(0, r);
        }
        urls
    }

    pub fn parse_feed(
        desc: &SourceDescriptor,
        body: &str,
        query: &SourceQuery,
    ) -> Result<Vec<RawSignal>, FetchError> {
        let rss: Rss = from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = normalize_text(it.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            let description = it.description.as_deref().unwrap_or_default();
            let text = format!("{title} {description}");
            let effects = weather_effects(&text);

            out.push(RawSignal {
                source: SignalSource {
                    name: desc.name.clone(),
                    reliability_score: desc.reliability_score,
                },
                signal_type: SignalType::Weather,
                title,
                summary: summarize(description, 500),
                region: extract_region(&text).or_else(|| query.region.clone()),
                materials_affected: affected_materials(&query.materials),
                published_date: it
                    .pub_date
                    .as_deref()
                    .map(parse_rfc2822)
                    .unwrap_or_else(chrono::Utc::now),
                effects,
                tags: vec!["weather".into(), "imd".into(), "official".into()],
                magnitude: None,
            });
        }
        Ok(out)
    }
}

/// Weather affects outdoor construction materials; without a requested
/// list, fall back to the usual suspects.
fn affected_materials(requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        ["Concrete", "Steel", "Cement", "Sand", "Aggregates"]
            .map(String::from)
            .to_vec()
    } else {
        requested.to_vec()
    }
}

fn weather_effects(text: &str) -> Vec<EffectTag> {
    let lower = text.to_lowercase();
    let mut effects = Vec::new();

    let heavy_rain = ["heavy rain", "very heavy", "extremely heavy", "torrential"]
        .iter()
        .any(|w| lower.contains(w));
    if heavy_rain {
        effects.push(EffectTag::LeadTimeIncreased);
        effects.push(EffectTag::AvailabilityRisk);
        // Pre-stocking ahead of sustained rain
        effects.push(EffectTag::DemandIncreased);
    }

    if ["cyclone", "storm", "hurricane", "depression"]
        .iter()
        .any(|w| lower.contains(w))
    {
        if !effects.contains(&EffectTag::AvailabilityRisk) {
            effects.push(EffectTag::AvailabilityRisk);
        }
        if !effects.contains(&EffectTag::LeadTimeIncreased) {
            effects.push(EffectTag::LeadTimeIncreased);
        }
    }

    if ["heat wave", "cold wave", "extreme temperature", "dense fog", "poor visibility"]
        .iter()
        .any(|w| lower.contains(w))
        && !effects.contains(&EffectTag::LeadTimeIncreased)
    {
        effects.push(EffectTag::LeadTimeIncreased);
    }

    if effects.is_empty() {
        effects.push(EffectTag::AvailabilityRisk);
    }
    effects
}

#[async_trait]
impl SourceClient for WeatherSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.desc
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<RawSignal>, FetchError> {
        match &self.mode {
            FetchMode::Fixture(body) => Self::parse_feed(&self.desc, body, query),
            FetchMode::Live => {
                let urls = self.feed_urls(query.region.as_deref());
                run_pipeline(&self.ctx, &self.desc, query, &urls, |body| {
                    Self::parse_feed(&self.desc, body, query)
                })
                .await
            }
        }
    }
}
