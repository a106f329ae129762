// src/ratelimit.rs
//! # Rate Limiter
//! Per-source sliding window over a trailing 60s budget. Each source gets its
//! own window keyed by name; `requests_per_minute = 0` means the source is
//! permanently rate-limited (disabled).
//!
//! No cross-restart persistence. Windows are pruned lazily on access.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// Longest we are willing to wait for a slot before denying outright.
/// Keeps `acquire` bounded so a starved source never stalls its worker.
const MAX_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Windows {
    stamps: HashMap<String, VecDeque<Instant>>,
}

/// Thread-safe per-source request budget.
#[derive(Debug, Default)]
pub struct RateLimiter {
    inner: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking check: record and allow if the trailing window holds
    /// fewer than `requests_per_minute` stamps.
    pub fn try_acquire(&self, source: &str, requests_per_minute: u32) -> bool {
        self.try_acquire_at(source, requests_per_minute, Instant::now())
    }

    /// Acquire with a bounded wait. If the window is full but the oldest
    /// stamp expires within `MAX_WAIT`, sleep until it does and retry once.
    pub async fn acquire(&self, source: &str, requests_per_minute: u32) -> bool {
        if requests_per_minute == 0 {
            return false;
        }
        if self.try_acquire(source, requests_per_minute) {
            return true;
        }
        let wait = self.time_until_slot(source);
        match wait {
            Some(d) if d <= MAX_WAIT => {
                tokio::time::sleep(d).await;
                self.try_acquire(source, requests_per_minute)
            }
            _ => false,
        }
    }

    fn try_acquire_at(&self, source: &str, requests_per_minute: u32, now: Instant) -> bool {
        if requests_per_minute == 0 {
            return false;
        }
        let mut inner = self.inner.lock().expect("rate limiter mutex poisoned");
        let window = inner.stamps.entry(source.to_string()).or_default();

        while let Some(front) = window.front() {
            if now.duration_since(*front) >= WINDOW {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() < requests_per_minute as usize {
            window.push_back(now);
            true
        } else {
            false
        }
    }

    /// Time until the oldest stamp in the window ages out, if any.
    fn time_until_slot(&self, source: &str) -> Option<Duration> {
        let inner = self.inner.lock().expect("rate limiter mutex poisoned");
        let front = inner.stamps.get(source)?.front()?;
        let age = front.elapsed();
        if age >= WINDOW {
            Some(Duration::ZERO)
        } else {
            Some(WINDOW - age)
        }
    }
}
