// src/sources/logistics.rs
//! Port and logistics client. Scans port-authority notice blocks for
//! congestion, berthing delays, and customs holdups near the requesting
//! region's ports.

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

fn notice_blocks(html: &str) -> Vec<String> {
    static RE_BLOCK: OnceCell<Regex> = OnceCell::new();
    let re = RE_BLOCK.get_or_init(|| {
        Regex::new(
            r#"(?is)<(?:div|li|article|tr)[^>]*class="[^"]*(?:notice|alert|update|news|announcement)[^"]*"[^>]*>(.*?)</(?:div|li|article|tr)>"#,
        )
        .unwrap()
    });
    re.captures_iter(html)
        .map(|c| normalize_text(&c[1]))
        .filter(|t| t.chars().count() >= 30)
        .collect()
}

pub struct LogisticsSource {
    ctx: Arc<SourceContext>,
    desc: SourceDescriptor,
    mode: FetchMode,
}

impl LogisticsSource {
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

    /// Nearest major ports for the region; national portal as fallback.
    fn port_urls(&self, region: Option<&str>) -> Vec<String> {
        match region {
            Some("Maharashtra") => vec![
                "https://jnport.gov.in/notices".to_string(),
                "https://mumbaiport.gov.in/notices".to_string(),
            ],
            Some("Gujarat") | Some("Karnataka") | Some("Tamil Nadu") => {
                vec!["https://www.indianports.gov.in/updates".to_string()]
            }
            _ => vec![
                "https://jnport.gov.in/notices".to_string(),
                "https://www.indianports.gov.in/updates".to_string(),
            ],
        }
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
            let Some(effects) = logistics_effects(&text) else {
                continue;
            };
            out.push(RawSignal {
                source: SignalSource {
                    name: desc.name.clone(),
                    reliability_score: desc.reliability_score,
                },
                signal_type: SignalType::Logistics,
                title: summarize(&text, 120),
                summary: summarize(&text, 400),
                region: extract_region(&text).or_else(|| query.region.clone()),
                materials_affected: query.materials.clone(),
                published_date: extract_date(&text),
                effects,
                tags: vec!["logistics".into(), "port".into()],
                magnitude: None,
            });
        }
        Ok(out)
    }
}

fn logistics_effects(text: &str) -> Option<Vec<EffectTag>> {
    let lower = text.to_lowercase();
    let mut effects = Vec::new();

    if ["congestion", "backlog", "vessels waiting", "queue"]
        .iter()
        .any(|w| lower.contains(w))
    {
        effects.push(EffectTag::LeadTimeIncreased);
        effects.push(EffectTag::AvailabilityRisk);
    }
    if ["delay", "delayed", "berthing", "strike", "customs hold"]
        .iter()
        .any(|w| lower.contains(w))
        && !effects.contains(&EffectTag::LeadTimeIncreased)
    {
        effects.push(EffectTag::LeadTimeIncreased);
    }
    if ["normal operations", "resumed", "cleared"]
        .iter()
        .any(|w| lower.contains(w))
        && effects.is_empty()
    {
        effects.push(EffectTag::LeadTimeDecreased);
    }

    if effects.is_empty() {
        None
    } else {
        Some(effects)
    }
}

#[async_trait]
impl SourceClient for LogisticsSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.desc
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<RawSignal>, FetchError> {
        match &self.mode {
            FetchMode::Fixture(body) => Self::parse_page(&self.desc, body, query),
            FetchMode::Live => {
                let urls = self.port_urls(query.region.as_deref());
                run_pipeline(&self.ctx, &self.desc, query, &urls, |body| {
                    Self::parse_page(&self.desc, body, query)
                })
                .await
            }
        }
    }
}
