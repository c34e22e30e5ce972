use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::Mutex;

/// One crawled page, produced once per distinct normalized URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// URL of the page as it was discovered
    pub url: String,

    /// Hop count at which the page was first discovered
    pub depth: usize,

    /// Non-empty heading texts, h1 through h6
    pub headings: Vec<String>,

    /// Absolute outbound links as found on the page
    pub links: Vec<String>,

    /// Whether fetching or parsing the page failed
    pub is_broken: bool,

    /// Seeds whose crawl tree reached this page
    pub from_start_urls: BTreeSet<String>,
}

impl PageRecord {
    pub fn is_reached_from(&self, seed: &str) -> bool {
        self.from_start_urls.contains(seed)
    }
}

/// The set of roots that reached a page, shared between every task that
/// discovers the same normalized URL.
///
/// Roots can only be added, never removed.
#[derive(Debug)]
pub struct Attribution {
    roots: Mutex<BTreeSet<String>>,
}

impl Attribution {
    pub fn new(root: &str) -> Self {
        Self {
            roots: Mutex::new(BTreeSet::from([root.to_string()])),
        }
    }

    /// Records that `root` reached the page. Returns `false` if it already had.
    pub async fn add_root(&self, root: &str) -> bool {
        self.roots.lock().await.insert(root.to_string())
    }

    pub async fn roots(&self) -> BTreeSet<String> {
        self.roots.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_attribution_grows_monotonically() {
        let attribution = Attribution::new("https://a.test/");
        assert!(attribution.add_root("https://b.test/").await);
        assert!(!attribution.add_root("https://a.test/").await);

        let roots = attribution.roots().await;
        assert_eq!(roots.len(), 2);
        assert!(roots.contains("https://a.test/"));
        assert!(roots.contains("https://b.test/"));
    }

    #[tokio::test]
    async fn test_concurrent_attribution() {
        let attribution = Arc::new(Attribution::new("seed-0"));
        let mut handles = Vec::new();
        for i in 0..32 {
            let attribution = Arc::clone(&attribution);
            handles.push(tokio::spawn(async move {
                attribution.add_root(&format!("seed-{}", i % 8)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(attribution.roots().await.len(), 8);
    }
}
