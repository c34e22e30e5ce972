use crate::crawlers::fetch::HtmlFetcher;
use crate::parsers::html;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of loading a single page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedPage {
    pub headings: Vec<String>,
    pub links: Vec<String>,
    pub is_broken: bool,
}

impl ProcessedPage {
    pub fn loaded(headings: Vec<String>, links: Vec<String>) -> Self {
        Self {
            headings,
            links,
            is_broken: false,
        }
    }

    /// A page that could not be fetched or parsed. Carries no headings or links.
    pub fn broken() -> Self {
        Self {
            headings: Vec::new(),
            links: Vec::new(),
            is_broken: true,
        }
    }
}

/// Turns a URL into a page's headings and outbound links.
///
/// Implementations never fail: every error becomes a broken page.
#[async_trait]
pub trait PageProcessor: Send + Sync {
    async fn process_page(&self, url: &str, depth: usize) -> ProcessedPage;
}

/// Page processor that fetches a document and parses it as HTML
#[derive(Debug, Clone)]
pub struct HtmlPageProcessor<F> {
    fetcher: F,
}

impl<F: HtmlFetcher> HtmlPageProcessor<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl<F: HtmlFetcher> PageProcessor for HtmlPageProcessor<F> {
    async fn process_page(&self, url: &str, depth: usize) -> ProcessedPage {
        ::log::info!("Crawling {} at depth {}", url, depth);

        match self.fetcher.fetch(url).await {
            Ok(document) => {
                let parsed = html::parse(&document.body, &document.url);
                ProcessedPage::loaded(parsed.headings, parsed.links)
            }
            Err(e) => {
                ::log::warn!("Marking {} as broken: {}", url, e);
                ProcessedPage::broken()
            }
        }
    }
}
