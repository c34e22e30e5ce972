use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

/// Turns a URL into the canonical key used for dedup.
///
/// The key is `scheme://host<path>` with query, fragment, port and every
/// trailing slash removed. Unparsable URLs and URLs without a host produce an
/// empty string, which is never admitted.
pub fn normalize_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return String::new();
    };
    let Some(host) = parsed.host_str() else {
        return String::new();
    };
    format!(
        "{}://{}{}",
        parsed.scheme(),
        host,
        parsed.path().trim_end_matches('/')
    )
}

/// Exact host membership test. No wildcard or subdomain matching.
pub fn is_domain_allowed(url: &str, allowed_hosts: &HashSet<String>) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .host_str()
            .is_some_and(|host| allowed_hosts.contains(host)),
        Err(_) => false,
    }
}

/// Configuration for crawl admission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlFilterConfig {
    /// Deepest hop count a page may be discovered at
    pub max_depth: usize,

    /// Hosts a page must live on to be crawled
    pub allowed_hosts: HashSet<String>,

    /// Regex patterns for URLs to reject even when the host is allowed
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

/// Decides which discovered links become crawl tasks
#[derive(Debug)]
pub struct UrlFilter {
    config: UrlFilterConfig,
    exclude_regexes: Vec<Regex>,
}

impl UrlFilter {
    /// Create a new URL filter from configuration
    pub fn new(config: UrlFilterConfig) -> Result<Self, regex::Error> {
        let mut exclude_regexes = Vec::with_capacity(config.exclude_patterns.len());
        for pattern in &config.exclude_patterns {
            exclude_regexes.push(Regex::new(pattern)?);
        }

        Ok(Self {
            config,
            exclude_regexes,
        })
    }

    /// True when a page discovered at `depth` may be fetched
    pub fn within_depth(&self, depth: usize) -> bool {
        depth <= self.config.max_depth
    }

    /// Returns the normalized key when `url` passes every check except depth.
    ///
    /// Neither depth nor dedup is checked here. A candidate past the depth
    /// limit can still attribute its root to a page another root already
    /// claimed, so the caller needs its key.
    pub fn admit_url(&self, url: &str) -> Option<String> {
        if url.is_empty() {
            return None;
        }

        let key = normalize_url(url);
        if key.is_empty() {
            ::log::trace!("Malformed URL rejected: {}", url);
            return None;
        }

        if !is_domain_allowed(&key, &self.config.allowed_hosts) {
            ::log::trace!("Host not allowed: {}", url);
            return None;
        }

        if self.exclude_regexes.iter().any(|regex| regex.is_match(url)) {
            ::log::trace!("Exclude pattern matched: {}", url);
            return None;
        }

        Some(key)
    }
}
