pub mod config;
pub mod crawlers;
pub mod filter;
pub mod parsers;
pub mod report;
pub mod results;

// Re-export commonly used types for convenience
pub use config::{ConfigError, CrawlerConfig};
pub use crawlers::{CrawlOutcome, Crawler, PageProcessor, ProcessedPage, TaskFailure, crawl};
pub use filter::{is_domain_allowed, normalize_url};
pub use results::PageRecord;

use crawlers::{HtmlPageProcessor, HttpFetcher};
use std::sync::Arc;
use thiserror::Error;

/// Reasons an HTTP crawl could not be started
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Crawls the web over HTTP using `config`
pub async fn run(config: &CrawlerConfig) -> Result<CrawlOutcome, RunError> {
    let fetcher = HttpFetcher::new(config.fetch_timeout())?;
    let processor: Arc<dyn PageProcessor> = Arc::new(HtmlPageProcessor::new(fetcher));

    let crawler = Crawler::new(config.clone(), processor)?;
    Ok(crawler.crawl().await)
}
