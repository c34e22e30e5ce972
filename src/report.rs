use crate::filter::normalize_url;
use crate::results::PageRecord;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use url::Url;

/// Renders crawl results as a markdown report, one section per seed
pub fn render(pages: &[PageRecord], seeds: &[Url]) -> String {
    let mut out = String::from("# Crawled Website Report\n\n");

    for seed in seeds {
        out.push_str(&format!("## Results for: {}\n\n", seed));

        let mut for_seed: Vec<&PageRecord> = pages
            .iter()
            .filter(|page| page.is_reached_from(seed.as_str()))
            .collect();
        for_seed.sort_by_key(|page| page.depth);

        for page in &for_seed {
            write_page(&mut out, page, pages);
            out.push('\n');
        }
    }

    out
}

/// Renders the report and writes it to `path`
pub fn write_report<P: AsRef<Path>>(path: P, pages: &[PageRecord], seeds: &[Url]) -> io::Result<()> {
    let path = path.as_ref();
    fs::write(path, render(pages, seeds))?;
    ::log::info!("Report written to {}", path.display());
    Ok(())
}

fn write_page(out: &mut String, page: &PageRecord, all_pages: &[PageRecord]) {
    let indent = indent(page.depth);
    let arrows = "→".repeat(page.depth.max(1));

    let (mark, status) = if page.is_broken {
        ("✗", "could not be loaded")
    } else {
        ("✓", "loaded successfully")
    };
    out.push_str(&format!("{}### {} {}\n", indent, arrows, page.url));
    out.push_str(&format!("{}- [{}] Page {}\n", indent, mark, status));

    if !page.headings.is_empty() {
        out.push_str(&format!("{}- Headings:\n", indent));
        for heading in &page.headings {
            out.push_str(&format!("{}  - {}\n", indent, heading));
        }
    }

    let links = unique_links(page);
    if !links.is_empty() {
        out.push_str(&format!("{}- Links:\n", indent));
        for link in links {
            let marker = if is_link_broken(&link, all_pages) {
                " ❌ broken"
            } else {
                ""
            };
            out.push_str(&format!("{}  - [{}]({}){}\n", indent, link, link, marker));
        }
    }
}

/// A page's links in display form, first occurrence kept, self-links dropped
fn unique_links(page: &PageRecord) -> Vec<String> {
    let own = display_url(&page.url);
    let mut seen = HashSet::new();

    page.links
        .iter()
        .filter(|link| !link.trim().is_empty())
        .map(|link| display_url(link))
        .filter(|link| *link != own && seen.insert(link.clone()))
        .collect()
}

/// True when a crawled page with the same normalized URL is broken.
///
/// Links that were never crawled are not reported as broken.
fn is_link_broken(link: &str, pages: &[PageRecord]) -> bool {
    let key = normalize_url(link);
    if key.is_empty() {
        return false;
    }
    pages
        .iter()
        .any(|page| page.is_broken && normalize_url(&page.url) == key)
}

fn display_url(url: &str) -> String {
    let without_fragment = match url.find('#') {
        Some(idx) => &url[..idx],
        None => url,
    };
    without_fragment
        .strip_suffix('/')
        .unwrap_or(without_fragment)
        .to_string()
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}
