// src/fetch.rs
//! # Fetch Session
//! One HTTP client per process, shared by all source clients. Carries the
//! fixed identifying user agent and the 10s per-request timeout, and refuses
//! to fetch anything outside a source's whitelisted domains. Whitelists are
//! static configuration, never request-controllable.

use std::time::Duration;

use reqwest::Url;

/// Fixed user agent for every outbound request, including robots.txt.
pub const USER_AGENT: &str = "ProcureSignalsBot/1.0 (+procurement-intelligence)";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Typed per-source outcome. None of these are fatal to an enrichment
/// request; the engine logs them distinctly and moves on.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transient fetch failure: {0}")]
    Transient(String),
    #[error("rate limited")]
    RateLimited,
    #[error("disallowed by robots.txt")]
    RobotsDisallowed,
    #[error("parse failure: {0}")]
    Parse(String),
}

impl FetchError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transient(_) => "transient",
            FetchError::RateLimited => "rate_limited",
            FetchError::RobotsDisallowed => "robots_disallowed",
            FetchError::Parse(_) => "parse",
        }
    }
}

/// Shared HTTP client with the engine's identity baked in.
#[derive(Debug, Clone)]
pub struct FetchSession {
    client: reqwest::Client,
}

impl FetchSession {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// GET a page as text, enforcing the domain whitelist.
    pub async fn get_text(&self, url: &str, allowed_domains: &[String]) -> Result<String, FetchError> {
        if !url_is_whitelisted(url, allowed_domains) {
            // A non-whitelisted URL is a programming error in a source
            // client, not an external failure; refuse rather than fetch.
            return Err(FetchError::Transient(format!(
                "url not in source whitelist: {url}"
            )));
        }
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;
        let resp = resp
            .error_for_status()
            .map_err(|e| FetchError::Transient(e.to_string()))?;
        resp.text()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))
    }

    /// GET without whitelist enforcement; only the robots gate uses this,
    /// and only for `<domain>/robots.txt` URLs it builds itself.
    pub(crate) async fn get_text_unchecked(&self, url: &str) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;
        let resp = resp
            .error_for_status()
            .map_err(|e| FetchError::Transient(e.to_string()))?;
        resp.text()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))
    }
}

impl Default for FetchSession {
    fn default() -> Self {
        Self::new()
    }
}

/// True if the URL's host is one of the whitelisted domains or a subdomain
/// of one (`mausam.imd.gov.in` matches whitelist entry `imd.gov.in`).
pub fn url_is_whitelisted(url: &str, allowed_domains: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    allowed_domains.iter().any(|d| {
        let d = d.trim().trim_start_matches("www.");
        let host = host.trim_start_matches("www.");
        host == d || host.ends_with(&format!(".{d}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_matches_exact_and_subdomains() {
        let wl = vec!["imd.gov.in".to_string(), "mypetrolprice.com".to_string()];
        assert!(url_is_whitelisted("https://imd.gov.in/warnings", &wl));
        assert!(url_is_whitelisted("https://mausam.imd.gov.in/mumbai", &wl));
        assert!(url_is_whitelisted("https://www.mypetrolprice.com/mumbai", &wl));
        assert!(!url_is_whitelisted("https://evil-imd.gov.in.example.com/", &wl));
        assert!(!url_is_whitelisted("https://example.com/imd.gov.in", &wl));
        assert!(!url_is_whitelisted("not a url", &wl));
    }

    #[test]
    fn error_kinds_are_stable_labels() {
        assert_eq!(FetchError::RateLimited.kind(), "rate_limited");
        assert_eq!(FetchError::RobotsDisallowed.kind(), "robots_disallowed");
        assert_eq!(FetchError::Transient("x".into()).kind(), "transient");
        assert_eq!(FetchError::Parse("x".into()).kind(), "parse");
    }
}
