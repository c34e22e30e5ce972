use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::filter::UrlFilterConfig;

/// Number of crawl workers when not overridden
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Per-request timeout used by the HTTP fetcher
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5000;

/// Rejected configuration. Nothing is crawled when one of these is returned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one valid start URL is required")]
    NoStartUrls,

    #[error("invalid start URL {url:?}: {reason}")]
    InvalidStartUrl { url: String, reason: String },

    #[error("invalid depth {0:?}: depth must be a non-negative integer")]
    InvalidDepth(String),

    #[error("received invalid domain for allowed domains {domain:?}: {source}")]
    InvalidDomain {
        domain: String,
        #[source]
        source: url::ParseError,
    },

    #[error("allowed domains must contain at least one valid domain")]
    NoValidDomains,

    #[error("max concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("invalid exclude pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk form of the crawler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// URLs to start crawling from
    pub start_urls: Vec<String>,

    /// Maximum hop count from a start URL
    pub max_depth: i64,

    /// Hosts that may be crawled
    pub allowed_domains: Vec<String>,

    /// Number of concurrent crawl workers
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Timeout for a single page fetch, in milliseconds
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Regex patterns for URLs to exclude
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

/// Default value for max_concurrency
fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

/// Default value for fetch_timeout_ms
fn default_fetch_timeout_ms() -> u64 {
    DEFAULT_FETCH_TIMEOUT_MS
}

/// Validated crawler configuration
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    start_urls: Vec<Url>,
    max_depth: usize,
    allowed_domains: HashSet<String>,
    max_concurrency: usize,
    fetch_timeout: Duration,
    exclude_patterns: Vec<String>,
}

impl CrawlerConfig {
    /// Create a configuration, normalizing the allowed domains down to hosts
    pub fn new<I, S>(start_urls: Vec<Url>, max_depth: usize, domains: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let start_urls: Vec<Url> = start_urls
            .into_iter()
            .filter(|url| seen.insert(url.as_str().to_string()))
            .collect();
        if start_urls.is_empty() {
            return Err(ConfigError::NoStartUrls);
        }

        Ok(Self {
            start_urls,
            max_depth,
            allowed_domains: normalize_domains(domains)?,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            exclude_patterns: Vec::new(),
        })
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(json)?;
        Self::try_from(file)
    }

    /// Set the number of concurrent crawl workers
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Result<Self, ConfigError> {
        if max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        self.max_concurrency = max_concurrency;
        Ok(self)
    }

    /// Set the timeout applied to every page fetch
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set regex patterns for URLs that are never crawled
    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    pub fn start_urls(&self) -> &[Url] {
        &self.start_urls
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn allowed_domains(&self) -> &HashSet<String> {
        &self.allowed_domains
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Admission settings for the crawl engine
    pub fn filter_config(&self) -> UrlFilterConfig {
        UrlFilterConfig {
            max_depth: self.max_depth,
            allowed_hosts: self.allowed_domains.clone(),
            exclude_patterns: self.exclude_patterns.clone(),
        }
    }
}

impl TryFrom<ConfigFile> for CrawlerConfig {
    type Error = ConfigError;

    fn try_from(file: ConfigFile) -> Result<Self, Self::Error> {
        let max_depth = usize::try_from(file.max_depth)
            .map_err(|_| ConfigError::InvalidDepth(file.max_depth.to_string()))?;

        let start_urls = file
            .start_urls
            .iter()
            .map(|raw| parse_start_url(raw))
            .collect::<Result<Vec<_>, _>>()?;

        let config = Self::new(start_urls, max_depth, &file.allowed_domains)?
            .with_max_concurrency(file.max_concurrency)?
            .with_fetch_timeout(Duration::from_millis(file.fetch_timeout_ms))
            .with_exclude_patterns(file.exclude_patterns);
        Ok(config)
    }
}

/// Parses a single start URL, accepting only http and https
pub fn parse_start_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|e| ConfigError::InvalidStartUrl {
        url: trimmed.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidStartUrl {
            url: trimmed.to_string(),
            reason: format!("unsupported scheme {:?}", other),
        }),
    }
}

/// Reduces each allowed-domain entry to its lower-cased host
fn normalize_domains<I, S>(domains: I) -> Result<HashSet<String>, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized = HashSet::new();
    for domain in domains {
        let cleaned = domain.as_ref().trim().to_lowercase();
        if cleaned.is_empty() {
            continue;
        }

        let with_scheme = if cleaned.contains("://") {
            cleaned.clone()
        } else {
            format!("http://{}", cleaned)
        };

        let url = Url::parse(&with_scheme).map_err(|source| ConfigError::InvalidDomain {
            domain: cleaned.clone(),
            source,
        })?;
        match url.host_str() {
            Some(host) => {
                normalized.insert(host.to_string());
            }
            None => {
                return Err(ConfigError::InvalidDomain {
                    domain: cleaned,
                    source: url::ParseError::EmptyHost,
                });
            }
        }
    }

    if normalized.is_empty() {
        return Err(ConfigError::NoValidDomains);
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> Vec<Url> {
        vec![Url::parse("https://test.com").unwrap()]
    }

    #[test]
    fn test_valid_config() {
        let config = CrawlerConfig::new(start(), 2, ["https://example.com"]).unwrap();
        assert_eq!(config.start_urls(), start().as_slice());
        assert_eq!(config.max_depth(), 2);
        assert!(config.allowed_domains().contains("example.com"));
        assert_eq!(config.max_concurrency(), DEFAULT_MAX_CONCURRENCY);
    }

    #[test]
    fn test_domains_are_normalized() {
        let config =
            CrawlerConfig::new(start(), 1, ["  https://Example.COM/path  ", "docs.rs"]).unwrap();
        assert!(config.allowed_domains().contains("example.com"));
        assert!(config.allowed_domains().contains("docs.rs"));
        assert_eq!(config.allowed_domains().len(), 2);
    }

    #[test]
    fn test_invalid_domain() {
        let err = CrawlerConfig::new(start(), 1, ["bad:url"]).unwrap_err();
        assert!(err.to_string().contains("invalid domain"));

        let err = CrawlerConfig::new(start(), 1, ["https://example.com", "not a url"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDomain { .. }));
    }

    #[test]
    fn test_blank_domain_list() {
        let err = CrawlerConfig::new(start(), 1, ["   "]).unwrap_err();
        assert!(err.to_string().contains("at least one valid domain"));
    }

    #[test]
    fn test_empty_start_urls() {
        let err = CrawlerConfig::new(Vec::new(), 1, ["example.com"]).unwrap_err();
        assert!(matches!(err, ConfigError::NoStartUrls));
    }

    #[test]
    fn test_duplicate_start_urls_collapse() {
        let urls = vec![
            Url::parse("https://a.test/").unwrap(),
            Url::parse("https://b.test/").unwrap(),
            Url::parse("https://a.test").unwrap(),
        ];
        let config = CrawlerConfig::new(urls, 1, ["a.test"]).unwrap();
        assert_eq!(config.start_urls().len(), 2);
        assert_eq!(config.start_urls()[0].as_str(), "https://a.test/");
        assert_eq!(config.start_urls()[1].as_str(), "https://b.test/");
    }

    #[test]
    fn test_zero_concurrency() {
        let config = CrawlerConfig::new(start(), 1, ["test.com"]).unwrap();
        assert!(matches!(
            config.with_max_concurrency(0),
            Err(ConfigError::ZeroConcurrency)
        ));
    }

    #[test]
    fn test_from_json() {
        let config = CrawlerConfig::from_json(
            r#"{
                "start_urls": ["https://a.test", "https://b.test/docs"],
                "max_depth": 3,
                "allowed_domains": ["a.test", "B.TEST"],
                "max_concurrency": 2,
                "exclude_patterns": ["\\.pdf$"]
            }"#,
        )
        .unwrap();
        assert_eq!(config.start_urls().len(), 2);
        assert_eq!(config.max_depth(), 3);
        assert_eq!(config.max_concurrency(), 2);
        assert_eq!(
            config.fetch_timeout(),
            Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS)
        );
        assert!(config.allowed_domains().contains("b.test"));
        assert_eq!(config.filter_config().exclude_patterns, vec!["\\.pdf$"]);
    }

    #[test]
    fn test_from_json_negative_depth() {
        let err = CrawlerConfig::from_json(
            r#"{"start_urls": ["https://a.test"], "max_depth": -1, "allowed_domains": ["a.test"]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDepth(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"{"start_urls": ["https://a.test"], "max_depth": 0, "allowed_domains": ["a.test"]}"#,
        )
        .unwrap();

        let config = CrawlerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_depth(), 0);
        assert!(config.allowed_domains().contains("a.test"));
    }

    #[test]
    fn test_start_url_scheme() {
        assert!(parse_start_url("https://example.com").is_ok());
        assert!(parse_start_url("ftp://example.com").is_err());
        assert!(parse_start_url("not_a_url").is_err());
    }
}
