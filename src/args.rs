use clap::Parser;
use multicrawl::config::{ConfigError, CrawlerConfig, parse_start_url};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "multicrawl")]
#[command(about = "Crawls websites from several start URLs and writes a markdown report")]
#[command(version)]
pub struct Args {
    /// Comma-separated start URLs
    #[arg(required_unless_present = "config")]
    pub urls: Option<String>,

    /// Maximum number of hops from a start URL
    #[arg(required_unless_present = "config", allow_negative_numbers = true)]
    pub depth: Option<String>,

    /// Comma-separated domains the crawl may visit
    #[arg(required_unless_present = "config")]
    pub domains: Option<String>,

    /// JSON configuration file, used instead of the positional arguments
    #[arg(long, conflicts_with_all = ["urls", "depth", "domains"])]
    pub config: Option<PathBuf>,

    /// Number of concurrent crawl workers
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Timeout for a single page fetch, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Where to write the markdown report
    #[arg(short, long, default_value = "report.md")]
    pub output: PathBuf,

    /// Print the crawl outcome as JSON instead of writing a report
    #[arg(long)]
    pub json: bool,

    /// Exit with status 1 when any crawled page is broken
    #[arg(long)]
    pub fail_on_broken: bool,
}

/// Parses comma-separated start URLs, skipping entries that are not valid http(s) URLs
pub fn parse_start_urls(raw: &str) -> Result<Vec<Url>, ConfigError> {
    let mut urls = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match parse_start_url(entry) {
            Ok(url) => urls.push(url),
            Err(e) => ::log::warn!("Skipping start URL: {}", e),
        }
    }

    if urls.is_empty() {
        return Err(ConfigError::NoStartUrls);
    }
    Ok(urls)
}

pub fn parse_depth(raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidDepth(raw.to_string()))
}

/// Trims and lower-cases comma-separated domains, dropping blanks
pub fn parse_allowed_domains(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

/// Builds the crawler configuration from either the config file or the positional arguments
pub fn build_config(args: &Args) -> Result<CrawlerConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => {
            ::log::info!("Loading configuration from {}", path.display());
            CrawlerConfig::from_file(path)?
        }
        None => {
            let start_urls = parse_start_urls(args.urls.as_deref().unwrap_or_default())?;
            let max_depth = parse_depth(args.depth.as_deref().unwrap_or_default())?;
            let domains = parse_allowed_domains(args.domains.as_deref().unwrap_or_default());
            CrawlerConfig::new(start_urls, max_depth, domains)?
        }
    };

    if let Some(concurrency) = args.concurrency {
        config = config.with_max_concurrency(concurrency)?;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config = config.with_fetch_timeout(Duration::from_millis(timeout_ms));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        let mut full = vec!["multicrawl"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_parse_start_urls() {
        let urls = parse_start_urls(" https://a.test , ftp://b.test,,not a url, http://c.test/x").unwrap();
        let urls: Vec<&str> = urls.iter().map(Url::as_str).collect();
        assert_eq!(urls, vec!["https://a.test/", "http://c.test/x"]);

        assert!(matches!(
            parse_start_urls("ftp://only.test, ,"),
            Err(ConfigError::NoStartUrls)
        ));
    }

    #[test]
    fn test_parse_depth() {
        assert_eq!(parse_depth("3").unwrap(), 3);
        assert_eq!(parse_depth(" 0 ").unwrap(), 0);
        assert!(matches!(parse_depth("-1"), Err(ConfigError::InvalidDepth(_))));
        assert!(matches!(parse_depth("deep"), Err(ConfigError::InvalidDepth(_))));
    }

    #[test]
    fn test_parse_allowed_domains() {
        assert_eq!(
            parse_allowed_domains(" A.test, ,b.TEST "),
            vec!["a.test".to_string(), "b.test".to_string()]
        );
        assert!(parse_allowed_domains(" , ").is_empty());
    }

    #[test]
    fn test_build_config_from_positionals() {
        let args = args(&[
            "https://a.test,https://b.test",
            "2",
            "a.test,b.test",
            "--concurrency",
            "3",
            "--timeout-ms",
            "250",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.start_urls().len(), 2);
        assert_eq!(config.max_depth(), 2);
        assert_eq!(config.max_concurrency(), 3);
        assert_eq!(config.fetch_timeout(), Duration::from_millis(250));
        assert_eq!(args.output, PathBuf::from("report.md"));
        assert!(!args.json);
        assert!(!args.fail_on_broken);
    }

    #[test]
    fn test_build_config_rejects_bad_input() {
        let err = build_config(&args(&["https://a.test", "-2", "a.test"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDepth(_)));

        let err = build_config(&args(&["https://a.test", "1", " , "])).unwrap_err();
        assert!(matches!(err, ConfigError::NoValidDomains));

        let err = build_config(&args(&["https://a.test", "1", "a.test", "-c", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroConcurrency));
    }

    #[test]
    fn test_build_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"{"start_urls": ["https://a.test"], "max_depth": 1, "allowed_domains": ["a.test"]}"#,
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let args = args(&["--config", &path, "--json", "--fail-on-broken"]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.max_depth(), 1);
        assert!(args.json);
        assert!(args.fail_on_broken);
    }

    #[test]
    fn test_positionals_required_without_config() {
        assert!(Args::try_parse_from(["multicrawl", "https://a.test"]).is_err());
    }
}
