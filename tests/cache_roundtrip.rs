// tests/cache_roundtrip.rs
//! File-backed cache behavior: roundtrip, expiry, corruption, clearing.

use std::time::Duration;

use chrono::Utc;
use procurement_signal_enricher::cache::{cache_key, ResponseCache};
use procurement_signal_enricher::signal::{EffectTag, RawSignal, SignalSource, SignalType};

fn sample_signal(title: &str) -> RawSignal {
    RawSignal {
        source: SignalSource {
            name: "IMD Weather".into(),
            reliability_score: 0.95,
        },
        signal_type: SignalType::Weather,
        title: title.to_string(),
        summary: "heavy rainfall warning".into(),
        region: Some("Maharashtra".into()),
        materials_affected: vec!["Cement".into()],
        published_date: Utc::now(),
        effects: vec![EffectTag::AvailabilityRisk],
        tags: vec!["weather".into()],
        magnitude: None,
    }
}

#[test]
fn set_then_get_returns_the_same_payload() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::new(dir.path()).unwrap();

    let key = cache_key("IMD Weather", Some("Maharashtra"), &["Cement".into()], 30);
    let payload = vec![sample_signal("Heavy rainfall warning")];
    cache
        .set(&key, &payload, Duration::from_secs(3600))
        .unwrap();

    let got = cache.get(&key).expect("fresh entry should hit");
    assert_eq!(got, payload);
}

#[test]
fn expired_entries_miss_and_are_removed() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::new(dir.path()).unwrap();

    let key = cache_key("IMD Weather", None, &[], 30);
    cache
        .set(&key, &[sample_signal("old warning")], Duration::from_secs(0))
        .unwrap();

    // ttl of zero means any nonzero age is stale
    std::thread::sleep(Duration::from_millis(1100));
    assert!(cache.get(&key).is_none());
    assert_eq!(cache.stats().entries, 0);
}

#[test]
fn corrupted_entry_is_a_miss_not_a_panic() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::new(dir.path()).unwrap();

    let key = cache_key("PWD Notices", Some("Gujarat"), &["Steel".into()], 7);
    cache
        .set(&key, &[sample_signal("roadwork")], Duration::from_secs(3600))
        .unwrap();

    // Clobber the single entry on disk.
    let entry = std::fs::read_dir(dir.path())
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();
    std::fs::write(&entry, b"{ not json").unwrap();

    assert!(cache.get(&key).is_none());
    // The unreadable file is gone, so a retry would be a clean miss.
    assert!(!entry.exists());
}

#[test]
fn clear_reports_removed_count_and_empties_stats() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::new(dir.path()).unwrap();

    for i in 0..3 {
        let key = cache_key("Fuel Prices", Some("Maharashtra"), &[], i);
        cache
            .set(&key, &[sample_signal("diesel")], Duration::from_secs(3600))
            .unwrap();
    }
    assert_eq!(cache.stats().entries, 3);
    assert_eq!(cache.clear(), 3);

    let stats = cache.stats();
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.total_bytes, 0);
}

#[test]
fn keys_ignore_material_order_case_and_duplicates() {
    let a = cache_key(
        "Port Updates",
        Some("Maharashtra"),
        &["Steel".into(), "cement".into(), "STEEL".into()],
        30,
    );
    let b = cache_key(
        "Port Updates",
        Some("Maharashtra"),
        &["Cement".into(), "steel".into()],
        30,
    );
    assert_eq!(a, b);

    let c = cache_key("Port Updates", Some("Gujarat"), &["steel".into()], 30);
    assert_ne!(a, c);
}
