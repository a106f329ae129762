// src/cache.rs
//! # Response Cache
//! File-backed key → payload store with TTL, bounding external traffic.
//! One JSON file per key under the cache directory; the payload is the
//! pre-scoring `Vec<RawSignal>` a source parsed out of its last successful
//! fetch.
//!
//! Expiry is lazy: checked at read time, no background sweep. Corrupted
//! entries are treated as misses and deleted, so the next successful fetch
//! overwrites them. Writes are last-writer-wins; re-fetching the same key is
//! idempotent within TTL, so concurrent writers are safe.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::signal::RawSignal;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    /// Original key, kept for debugging.
    key: String,
    /// Unix seconds at write time.
    cached_at: i64,
    ttl_secs: u64,
    payload: Vec<RawSignal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
}

/// Shared, partitioned-by-key file cache. Sources never interfere because
/// every key embeds the source name.
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hash_hex(key)))
    }

    /// Payload for `key` if present and within TTL; expired or unreadable
    /// entries are removed and reported as misses.
    pub fn get(&self, key: &str) -> Option<Vec<RawSignal>> {
        let path = self.path_for(key);
        let bytes = fs::read(&path).ok()?;

        let envelope: CacheEnvelope = match serde_json::from_slice(&bytes) {
            Ok(e) => e,
            Err(e) => {
                warn!(key, error = %e, "corrupted cache entry; treating as miss");
                metrics::counter!("enrich_cache_corrupt_total").increment(1);
                let _ = fs::remove_file(&path);
                return None;
            }
        };

        let age = Utc::now().timestamp().saturating_sub(envelope.cached_at);
        if age < 0 || age as u64 > envelope.ttl_secs {
            let _ = fs::remove_file(&path);
            return None;
        }
        Some(envelope.payload)
    }

    pub fn set(&self, key: &str, payload: &[RawSignal], ttl: Duration) -> anyhow::Result<()> {
        let envelope = CacheEnvelope {
            key: key.to_string(),
            cached_at: Utc::now().timestamp(),
            ttl_secs: ttl.as_secs(),
            payload: payload.to_vec(),
        };
        let bytes = serde_json::to_vec(&envelope)?;
        fs::write(self.path_for(key), bytes)?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> bool {
        fs::remove_file(self.path_for(key)).is_ok()
    }

    /// Remove every entry; returns how many files were deleted.
    pub fn clear(&self) -> usize {
        let mut count = 0;
        if let Ok(entries) = fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json")
                    && fs::remove_file(&path).is_ok()
                {
                    count += 1;
                }
            }
        }
        count
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        if let Ok(entries) = fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    stats.entries += 1;
                    if let Ok(meta) = entry.metadata() {
                        stats.total_bytes += meta.len();
                    }
                }
            }
        }
        stats
    }
}

/// Cache key for one (source, normalized query) pair. Materials are sorted
/// and lowercased so semantically equal queries share an entry.
pub fn cache_key(
    source_name: &str,
    region: Option<&str>,
    materials: &[String],
    time_window_days: u32,
) -> String {
    let mut mats: Vec<String> = materials.iter().map(|m| m.trim().to_lowercase()).collect();
    mats.sort();
    mats.dedup();
    format!(
        "{}|{}|{}|{}",
        source_name,
        region.map(|r| r.trim().to_lowercase()).unwrap_or_default(),
        mats.join(","),
        time_window_days
    )
}

fn hash_hex(key: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
