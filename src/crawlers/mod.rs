pub mod crawler;
pub mod engine;
pub mod fetch;


pub use crawler::{HtmlPageProcessor, PageProcessor, ProcessedPage};
pub use engine::{CrawlOutcome, Crawler, TaskFailure, crawl};
pub use fetch::{FetchError, FetchedDocument, HtmlFetcher, HttpFetcher};
