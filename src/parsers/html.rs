use crate::parsers::ParseResult;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

static HEADING_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    (1..=6)
        .filter_map(|level| Selector::parse(&format!("h{}", level)).ok())
        .collect()
});

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector is valid"));

/// Parses an HTML document to extract headings and absolute links
///
/// Relative hrefs are resolved against `base_url`, the URL the document was
/// actually served from.
pub fn parse(html: &str, base_url: &Url) -> ParseResult {
    let doc = Html::parse_document(html);

    let headings = parse_headings(&doc);
    let links = parse_links(&doc, base_url);

    ::log::debug!(
        "HTML parser found {} headings and {} links",
        headings.len(),
        links.len()
    );

    ParseResult::new(headings, links)
}

/// All h1 elements first, then h2, down to h6
fn parse_headings(doc: &Html) -> Vec<String> {
    HEADING_SELECTORS
        .iter()
        .flat_map(|selector| doc.select(selector))
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect()
}

fn parse_links(doc: &Html, base_url: &Url) -> Vec<String> {
    doc.select(&LINK_SELECTOR)
        .filter_map(|e| e.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter_map(|href| match base_url.join(href) {
            Ok(resolved) => Some(resolved.to_string()),
            Err(e) => {
                ::log::trace!("Skipping unresolvable href {:?}: {}", href, e);
                None
            }
        })
        .collect()
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
