// src/sources/fuel.rs
//! Fuel price client. Extracts the current diesel/petrol price for the
//! region's major city and compares it against a reference level to decide
//! direction. This source only ever emits price effects.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::fetch::FetchError;
use crate::signal::{EffectTag, RawSignal, SignalSource, SignalType};
use crate::sources::{
    run_pipeline, FetchMode, SourceClient, SourceContext, SourceDescriptor, SourceQuery,
};

/// Reference price levels (INR/L). Prices above reference read as an
/// increase pressure on transport costs, below as relief.
const DIESEL_REFERENCE: f32 = 85.0;
const PETROL_REFERENCE: f32 = 100.0;

fn region_city(region: Option<&str>) -> &'static str {
    match region {
        Some("Gujarat") => "Ahmedabad",
        Some("Karnataka") => "Bangalore",
        Some("Tamil Nadu") => "Chennai",
        Some("Delhi") => "Delhi",
        _ => "Mumbai",
    }
}

/// Price figure near a fuel-type mention, e.g. `Diesel ₹ 89.50`.
fn extract_price(html: &str, fuel: &str) -> Option<f32> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)(diesel|petrol)[^0-9₹]{0,40}₹?\s*(\d+(?:\.\d+)?)").unwrap()
    });
    re.captures_iter(html)
        .find(|c| c[1].eq_ignore_ascii_case(fuel))
        .and_then(|c| c[2].parse::<f32>().ok())
}

pub struct FuelPriceSource {
    ctx: Arc<SourceContext>,
    desc: SourceDescriptor,
    mode: FetchMode,
}

impl FuelPriceSource {
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

    pub fn parse_page(
        desc: &SourceDescriptor,
        html: &str,
        query: &SourceQuery,
    ) -> Result<Vec<RawSignal>, FetchError> {
        let city = region_city(query.region.as_deref());
        let mut out = Vec::new();

        for fuel in ["Diesel", "Petrol"] {
            let Some(price) = extract_price(html, fuel) else {
                continue;
            };
            let reference = if fuel == "Diesel" {
                DIESEL_REFERENCE
            } else {
                PETROL_REFERENCE
            };
            let effect = if price >= reference {
                EffectTag::PriceIncrease
            } else {
                EffectTag::PriceDecrease
            };

            out.push(RawSignal {
                source: SignalSource {
                    name: desc.name.clone(),
                    reliability_score: desc.reliability_score,
                },
                signal_type: SignalType::FuelPrice,
                title: format!("{fuel} price in {city}: ₹{price:.2}/L"),
                summary: format!(
                    "Current {} price in {city} is ₹{price:.2} per litre, affecting \
                     transport and logistics costs for material delivery.",
                    fuel.to_lowercase()
                ),
                region: query.region.clone(),
                materials_affected: if query.materials.is_empty() {
                    vec!["General".into()]
                } else {
                    query.materials.clone()
                },
                published_date: chrono::Utc::now(),
                effects: vec![effect],
                tags: vec!["fuel".into(), fuel.to_lowercase(), "transport".into()],
                magnitude: Some(price),
            });
        }

        if out.is_empty() {
            return Err(FetchError::Parse("no fuel prices found".into()));
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceClient for FuelPriceSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.desc
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<RawSignal>, FetchError> {
        match &self.mode {
            FetchMode::Fixture(body) => Self::parse_page(&self.desc, body, query),
            FetchMode::Live => {
                let city = region_city(query.region.as_deref()).to_lowercase();
                let urls = vec![format!("https://www.mypetrolprice.com/{city}")];
                run_pipeline(&self.ctx, &self.desc, query, &urls, |body| {
                    Self::parse_page(&self.desc, body, query)
                })
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceDescriptors;

    const PAGE: &str = r#"<table class="price-table">
      <tr><td>Diesel</td><td>₹ 89.50</td></tr>
      <tr><td>Petrol</td><td>₹ 98.10</td></tr>
    </table>"#;

    fn query() -> SourceQuery {
        SourceQuery {
            region: Some("Maharashtra".into()),
            materials: vec![],
            time_window_days: 30,
            use_cache: true,
        }
    }

    #[test]
    fn prices_become_directional_signals() {
        let desc = SourceDescriptors::seed().fuel;
        let signals = FuelPriceSource::parse_page(&desc, PAGE, &query()).unwrap();
        assert_eq!(signals.len(), 2);

        let diesel = &signals[0];
        assert_eq!(diesel.signal_type, SignalType::FuelPrice);
        assert_eq!(diesel.effects, vec![EffectTag::PriceIncrease]); // 89.50 >= 85.0
        assert_eq!(diesel.magnitude, Some(89.50));
        assert!(diesel.title.contains("Mumbai"));
        assert_eq!(diesel.materials_affected, vec!["General".to_string()]);

        let petrol = &signals[1];
        assert_eq!(petrol.effects, vec![EffectTag::PriceDecrease]); // 98.10 < 100.0
    }

    /// The fuel source's vocabulary is price effects only.
    #[test]
    fn only_price_effects_are_emitted() {
        let desc = SourceDescriptors::seed().fuel;
        let signals = FuelPriceSource::parse_page(&desc, PAGE, &query()).unwrap();
        for s in &signals {
            for e in &s.effects {
                assert!(matches!(
                    e,
                    EffectTag::PriceIncrease | EffectTag::PriceDecrease
                ));
            }
        }
    }

    #[test]
    fn page_without_prices_is_a_parse_error() {
        let desc = SourceDescriptors::seed().fuel;
        let err = FuelPriceSource::parse_page(&desc, "<html>maintenance page</html>", &query());
        assert!(matches!(err, Err(FetchError::Parse(_))));
    }
}
