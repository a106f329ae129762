// src/robots.rs
//! # Robots Gate
//! Per-domain robots.txt fetch, cache, and decision. The ruleset for a
//! domain is fetched at most once per TTL and evaluated against the engine's
//! fixed user agent.
//!
//! Policy: on a failed robots.txt fetch the gate fails OPEN. Sources are
//! pre-vetted whitelisted public domains, so an unreachable robots.txt
//! should not silence a source; the fail-open is logged so it stays visible.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::fetch::{FetchSession, USER_AGENT};

const ROBOTS_TTL: Duration = Duration::from_secs(24 * 3600);

/// Agent token we match against `User-agent:` groups.
fn agent_token() -> String {
    USER_AGENT
        .split('/')
        .next()
        .unwrap_or(USER_AGENT)
        .to_ascii_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
enum RuleKind {
    Allow,
    Disallow,
}

#[derive(Debug, Clone)]
struct Rule {
    kind: RuleKind,
    prefix: String,
}

/// Parsed ruleset for one domain. `rules` holds the most specific matching
/// user-agent group (ours if present, else `*`).
#[derive(Debug, Clone, Default)]
struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Longest-prefix match; Allow wins ties. Empty prefix rules are
    /// ignored per robots convention (`Disallow:` alone allows all).
    fn allows(&self, path: &str) -> bool {
        let mut best: Option<(&Rule, usize)> = None;
        for rule in &self.rules {
            if rule.prefix.is_empty() {
                continue;
            }
            if path.starts_with(&rule.prefix) {
                let len = rule.prefix.len();
                match best {
                    Some((b, blen)) if blen > len || (blen == len && b.kind == RuleKind::Allow) => {}
                    _ => best = Some((rule, len)),
                }
            }
        }
        match best {
            Some((rule, _)) => rule.kind == RuleKind::Allow,
            None => true,
        }
    }
}

/// Two group kinds we care about: a group naming our agent, and `*`.
fn parse_rules(body: &str, agent: &str) -> RuleSet {
    let mut for_us: Vec<Rule> = Vec::new();
    let mut for_all: Vec<Rule> = Vec::new();
    let mut current_agents: Vec<String> = Vec::new();
    let mut in_group_body = false;

    for line in body.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let field = field.trim().to_ascii_lowercase();
        let value = value.trim();

        match field.as_str() {
            "user-agent" => {
                if in_group_body {
                    current_agents.clear();
                    in_group_body = false;
                }
                current_agents.push(value.to_ascii_lowercase());
            }
            "allow" | "disallow" => {
                in_group_body = true;
                let kind = if field == "allow" {
                    RuleKind::Allow
                } else {
                    RuleKind::Disallow
                };
                let rule = Rule {
                    kind,
                    prefix: value.to_string(),
                };
                for a in &current_agents {
                    if a == "*" {
                        for_all.push(rule.clone());
                    } else if agent.contains(a.as_str()) || a.contains(agent) {
                        for_us.push(rule.clone());
                    }
                }
            }
            _ => {}
        }
    }

    RuleSet {
        rules: if for_us.is_empty() { for_all } else { for_us },
    }
}

#[derive(Debug)]
struct CachedRules {
    rules: RuleSet,
    fetched_at: Instant,
}

/// Per-domain robots.txt decisions, shared across all source clients.
pub struct RobotsGate {
    session: FetchSession,
    cache: Mutex<HashMap<String, CachedRules>>,
}

impl RobotsGate {
    pub fn new(session: FetchSession) -> Self {
        Self {
            session,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// May a request for `path` on `domain` proceed?
    pub async fn is_allowed(&self, domain: &str, path: &str) -> bool {
        let rules = self.rules_for(domain).await;
        let allowed = rules.allows(path);
        if !allowed {
            debug!(domain, path, "robots.txt disallows fetch");
        }
        allowed
    }

    async fn rules_for(&self, domain: &str) -> RuleSet {
        {
            let cache = self.cache.lock().expect("robots cache mutex poisoned");
            if let Some(entry) = cache.get(domain) {
                if entry.fetched_at.elapsed() < ROBOTS_TTL {
                    return entry.rules.clone();
                }
            }
        }

        let url = format!("https://{domain}/robots.txt");
        let rules = match self.session.get_text_unchecked(&url).await {
            Ok(body) => parse_rules(&body, &agent_token()),
            Err(e) => {
                // Deliberate fail-open: whitelisted sources, logged policy.
                warn!(domain, error = %e, "robots.txt fetch failed; failing open");
                RuleSet::default()
            }
        };

        let mut cache = self.cache.lock().expect("robots cache mutex poisoned");
        cache.insert(
            domain.to_string(),
            CachedRules {
                rules: rules.clone(),
                fetched_at: Instant::now(),
            },
        );
        rules
    }

    /// Seed a parsed ruleset directly, bypassing the network. Test hook.
    pub fn seed_rules(&self, domain: &str, robots_body: &str) {
        let rules = parse_rules(robots_body, &agent_token());
        let mut cache = self.cache.lock().expect("robots cache mutex poisoned");
        cache.insert(
            domain.to_string(),
            CachedRules {
                rules,
                fetched_at: Instant::now(),
            },
        );
    }
}
