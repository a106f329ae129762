// src/config.rs
//! # Configuration
//! Source descriptors and cache location. Descriptors load from TOML via
//! `$SOURCES_CONFIG_PATH`, falling back to `config/sources.toml`, falling
//! back to the built-in seed. Whitelists live here and only here; requests
//! can never steer where the engine fetches from.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::signal::SignalType;
use crate::sources::SourceDescriptor;

pub const ENV_SOURCES_CONFIG_PATH: &str = "SOURCES_CONFIG_PATH";
pub const ENV_CACHE_DIR: &str = "ENRICH_CACHE_DIR";

const DEFAULT_CONFIG_PATH: &str = "config/sources.toml";
const DEFAULT_CACHE_DIR: &str = ".cache/enrichment";

/// The four standard descriptors.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDescriptors {
    #[serde(default = "seed_weather")]
    pub weather: SourceDescriptor,
    #[serde(default = "seed_infrastructure")]
    pub infrastructure: SourceDescriptor,
    #[serde(default = "seed_fuel")]
    pub fuel: SourceDescriptor,
    #[serde(default = "seed_logistics")]
    pub logistics: SourceDescriptor,
}

impl SourceDescriptors {
    /// Built-in defaults, used when no config file is present.
    pub fn seed() -> Self {
        Self {
            weather: seed_weather(),
            infrastructure: seed_infrastructure(),
            fuel: seed_fuel(),
            logistics: seed_logistics(),
        }
    }

    /// Load from a TOML file; malformed files fall back to the seed with a
    /// warning rather than refusing to start.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(s) => toml::from_str(&s).unwrap_or_else(|e| {
                warn!(path = %path.as_ref().display(), error = %e, "bad sources config; using seed");
                Self::seed()
            }),
            Err(_) => Self::seed(),
        }
    }

    /// Env var path → default path → seed.
    pub fn load_default() -> Self {
        if let Ok(p) = std::env::var(ENV_SOURCES_CONFIG_PATH) {
            return Self::load_from_file(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from_file(default);
        }
        Self::seed()
    }

    pub fn all(&self) -> [&SourceDescriptor; 4] {
        [&self.weather, &self.infrastructure, &self.fuel, &self.logistics]
    }
}

/// Cache directory: `$ENRICH_CACHE_DIR` or `.cache/enrichment`.
pub fn cache_dir() -> PathBuf {
    std::env::var(ENV_CACHE_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_DIR))
}

fn seed_weather() -> SourceDescriptor {
    SourceDescriptor {
        name: "India Meteorological Department".into(),
        signal_type: SignalType::Weather,
        allowed_domains: vec![
            "mausam.imd.gov.in".into(),
            "imd.gov.in".into(),
            "rmc.imd.gov.in".into(),
        ],
        reliability_score: 0.95,
        // Conservative: weather pages change often but the authority is slow
        requests_per_minute: 6,
        cache_ttl_hours: 6,
        respects_robots: true,
    }
}

fn seed_infrastructure() -> SourceDescriptor {
    SourceDescriptor {
        name: "Public Works Department".into(),
        signal_type: SignalType::TrafficInfra,
        allowed_domains: vec![
            "pwd.maharashtra.gov.in".into(),
            "mahapwd.com".into(),
            "gujaratpwd.gov.in".into(),
            "karnatakapwd.gov.in".into(),
        ],
        reliability_score: 0.80,
        requests_per_minute: 8,
        cache_ttl_hours: 12,
        respects_robots: true,
    }
}

fn seed_fuel() -> SourceDescriptor {
    SourceDescriptor {
        name: "Fuel Price Tracker".into(),
        signal_type: SignalType::FuelPrice,
        allowed_domains: vec![
            "mypetrolprice.com".into(),
            "goodreturns.in".into(),
            "iocl.com".into(),
        ],
        reliability_score: 0.85,
        requests_per_minute: 10,
        cache_ttl_hours: 24,
        respects_robots: true,
    }
}

fn seed_logistics() -> SourceDescriptor {
    SourceDescriptor {
        name: "Port & Logistics Tracker".into(),
        signal_type: SignalType::Logistics,
        allowed_domains: vec![
            "indianports.gov.in".into(),
            "jnport.gov.in".into(),
            "mumbaiport.gov.in".into(),
            "shipmin.gov.in".into(),
        ],
        reliability_score: 0.80,
        requests_per_minute: 8,
        cache_ttl_hours: 12,
        respects_robots: true,
    }
}
