// src/sources/infrastructure.rs
//! Public-works / traffic disruption client (PWD state portals). Notice and
//! advisory blocks are lifted out of the HTML with class-based block
//! extraction, then classified by closure/diversion/maintenance keywords.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::fetch::FetchError;
use crate::signal::{EffectTag, RawSignal, SignalSource, SignalType};
use crate::sources::{
    extract_date, extract_region, normalize_text, run_pipeline, summarize, FetchMode,
    SourceClient, SourceContext, SourceDescriptor, SourceQuery,
};

/// Blocks whose class mentions a notice-ish word; matches the structure of
/// the PWD portals we whitelist.
fn notice_blocks(html: &str) -> Vec<String> {
    static RE_BLOCK: OnceCell<Regex> = OnceCell::new();
    let re = RE_BLOCK.get_or_init(|| {
        Regex::new(
            r#"(?is)<(?:div|li|article|section)[^>]*class="[^"]*(?:notice|advisory|alert|announcement)[^"]*"[^>]*>(.*?)</(?:div|li|article|section)>"#,
        )
        .unwrap()
    });
    re.captures_iter(html)
        .map(|c| normalize_text(&c[1]))
        .filter(|t| t.chars().count() >= 30)
        .collect()
}

pub struct InfrastructureSource {
    ctx: Arc<SourceContext>,
    desc: SourceDescriptor,
    mode: FetchMode,
}

impl InfrastructureSource {
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

    fn portal_urls(&self, region: Option<&str>) -> Vec<String> {
        let base = match region {
            Some("Gujarat") => "https://gujaratpwd.gov.in",
            Some("Karnataka") => "https://karnatakapwd.gov.in",
            // Maharashtra is the default portal
            _ => "https://pwd.maharashtra.gov.in",
        };
        vec![
            format!("{base}/notices"),
            format!("{base}/advisories"),
        ]
    }

    pub fn parse_page(
        desc: &SourceDescriptor,
        html: &str,
        query: &SourceQuery,
    ) -> Result<Vec<RawSignal>, FetchError> {
        let blocks = notice_blocks(html);
        if blocks.is_empty() && !html.to_lowercase().contains("<html") {
            return Err(FetchError::Parse("no notice markup found".into()));
        }

        let mut out = Vec::new();
        for text in blocks {
            let Some(effects) = traffic_effects(&text) else {
                // Not a disruption notice (tenders, recruitment, ...)
                continue;
            };
            out.push(RawSignal {
                source: SignalSource {
                    name: desc.name.clone(),
                    reliability_score: desc.reliability_score,
                },
                signal_type: SignalType::TrafficInfra,
                title: summarize(&text, 120),
                summary: summarize(&text, 400),
                region: extract_region(&text).or_else(|| query.region.clone()),
                materials_affected: query.materials.clone(),
                published_date: extract_date(&text),
                effects,
                tags: vec!["traffic".into(), "pwd".into()],
                magnitude: None,
            });
        }
        Ok(out)
    }
}

/// None for notices with no transport-disruption content.
fn traffic_effects(text: &str) -> Option<Vec<EffectTag>> {
    let lower = text.to_lowercase();
    let mut effects = Vec::new();

    if ["road closure", "closed for traffic", "bridge closed", "closure of"]
        .iter()
        .any(|w| lower.contains(w))
    {
        effects.push(EffectTag::LeadTimeIncreased);
        effects.push(EffectTag::AvailabilityRisk);
    }
    if ["diversion", "diverted", "alternate route"]
        .iter()
        .any(|w| lower.contains(w))
        && !effects.contains(&EffectTag::LeadTimeIncreased)
    {
        effects.push(EffectTag::LeadTimeIncreased);
    }
    if ["maintenance", "repair work", "resurfacing", "construction work"]
        .iter()
        .any(|w| lower.contains(w))
        && !effects.contains(&EffectTag::LeadTimeIncreased)
    {
        effects.push(EffectTag::LeadTimeIncreased);
    }

    if effects.is_empty() {
        None
    } else {
        Some(effects)
    }
}

#[async_trait]
impl SourceClient for InfrastructureSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.desc
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<RawSignal>, FetchError> {
        match &self.mode {
            FetchMode::Fixture(body) => Self::parse_page(&self.desc, body, query),
            FetchMode::Live => {
                let urls = self.portal_urls(query.region.as_deref());
                run_pipeline(&self.ctx, &self.desc, query, &urls, |body| {
                    Self::parse_page(&self.desc, body, query)
                })
                .await
            }
        }
    }
}
