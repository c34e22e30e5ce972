use crate::config::{ConfigError, CrawlerConfig};
use crate::crawlers::crawler::PageProcessor;
use crate::filter::UrlFilter;
use crate::results::{Attribution, PageRecord};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};
use url::Url;

/// A unit of crawl work: one candidate link reached from one seed
#[derive(Debug, Clone)]
struct CrawlTask {
    url: String,
    depth: usize,
    root: Arc<str>,
}

/// A task that died for a reason other than a failed fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub url: String,
    pub depth: usize,
    pub root: String,
    pub reason: String,
}

/// Everything a finished crawl produced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlOutcome {
    /// One record per distinct normalized URL, in the order pages finished
    pub pages: Vec<PageRecord>,
    /// Diagnostics for tasks that failed unexpectedly
    pub failures: Vec<TaskFailure>,
}

impl CrawlOutcome {
    pub fn broken_count(&self) -> usize {
        self.pages.iter().filter(|page| page.is_broken).count()
    }
}

/// Shared queue of crawl tasks plus the count of tasks not yet finished.
///
/// The count goes up before a task is sent and down only after the task and
/// all of its child submissions are done, so it reaches zero exactly once:
/// when no task is queued or running. At that point the sender is dropped and
/// every worker sees the channel close.
struct TaskQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<CrawlTask>>>,
    receiver: Mutex<mpsc::UnboundedReceiver<CrawlTask>>,
    pending: AtomicUsize,
}

impl TaskQueue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(rx),
            pending: AtomicUsize::new(0),
        }
    }

    async fn submit(&self, task: CrawlTask) {
        self.pending.fetch_add(1, Ordering::AcqRel);

        let sender = self.sender.lock().await;
        let sent = match sender.as_ref() {
            Some(tx) => tx.send(task).is_ok(),
            None => false,
        };
        drop(sender);

        if !sent {
            ::log::error!("Task queue closed while submitting a task");
            self.complete().await;
        }
    }

    async fn next(&self) -> Option<CrawlTask> {
        let mut rx = self.receiver.lock().await;
        rx.recv().await
    }

    async fn complete(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.close().await;
        }
    }

    async fn close_if_idle(&self) {
        if self.pending.load(Ordering::Acquire) == 0 {
            self.close().await;
        }
    }

    async fn close(&self) {
        if self.sender.lock().await.take().is_some() {
            ::log::debug!("No crawl tasks left, closing task queue");
        }
    }
}

/// A page whose attribution may still grow while the crawl runs
struct CrawledPage {
    url: String,
    depth: usize,
    headings: Vec<String>,
    links: Vec<String>,
    is_broken: bool,
    attribution: Arc<Attribution>,
}

/// State shared by every worker for the duration of one crawl
struct CrawlState {
    filter: Arc<UrlFilter>,
    processor: Arc<dyn PageProcessor>,
    queue: TaskQueue,
    visited: Mutex<HashMap<String, Arc<Attribution>>>,
    results: Mutex<Vec<CrawledPage>>,
    failures: Mutex<Vec<TaskFailure>>,
}

impl CrawlState {
    /// Inserts `key` into the visited map if absent.
    ///
    /// Returns the new attribution when this task won the insertion. When the
    /// key was already known, `root` is attributed to the existing entry and
    /// `None` is returned.
    async fn claim(&self, key: String, root: &str) -> Option<Arc<Attribution>> {
        let mut visited = self.visited.lock().await;
        let existing = match visited.entry(key) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let attribution = Arc::new(Attribution::new(root));
                entry.insert(Arc::clone(&attribution));
                return Some(attribution);
            }
        };
        drop(visited);

        if existing.add_root(root).await {
            ::log::debug!("Attributed already visited page to {}", root);
        }
        None
    }

    /// Adds `root` to the page at `key` if some task already claimed it.
    ///
    /// Never inserts: a candidate past the depth limit must not be fetched.
    async fn attribute_if_known(&self, key: &str, root: &str) {
        let existing = self.visited.lock().await.get(key).map(Arc::clone);
        if let Some(attribution) = existing {
            if attribution.add_root(root).await {
                ::log::debug!("Attributed page beyond depth limit to {}", root);
            }
        }
    }
}

/// Crawls from a set of seeds with a fixed pool of workers
pub struct Crawler {
    config: CrawlerConfig,
    filter: Arc<UrlFilter>,
    processor: Arc<dyn PageProcessor>,
}

impl Crawler {
    pub fn new(config: CrawlerConfig, processor: Arc<dyn PageProcessor>) -> Result<Self, ConfigError> {
        let filter = Arc::new(UrlFilter::new(config.filter_config())?);
        Ok(Self {
            config,
            filter,
            processor,
        })
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Runs the crawl to completion.
    ///
    /// Returns once every task, including tasks spawned by other tasks, has
    /// finished.
    pub async fn crawl(&self) -> CrawlOutcome {
        let state = Arc::new(CrawlState {
            filter: Arc::clone(&self.filter),
            processor: Arc::clone(&self.processor),
            queue: TaskQueue::new(),
            visited: Mutex::new(HashMap::new()),
            results: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        });

        ::log::info!(
            "Starting crawl of {} seed(s), max depth {}, {} worker(s)",
            self.config.start_urls().len(),
            self.config.max_depth(),
            self.config.max_concurrency()
        );

        for seed in self.config.start_urls() {
            state
                .queue
                .submit(CrawlTask {
                    url: seed.to_string(),
                    depth: 0,
                    root: Arc::from(seed.as_str()),
                })
                .await;
        }
        state.queue.close_if_idle().await;

        let workers: Vec<_> = (0..self.config.max_concurrency())
            .map(|worker_id| spawn_worker(worker_id, Arc::clone(&state)))
            .collect();

        for worker in workers {
            if let Err(e) = worker.await {
                ::log::error!("Crawl worker terminated abnormally: {}", e);
            }
        }

        collect_outcome(&state).await
    }
}

/// Validates the inputs and crawls from `seeds`.
///
/// Configuration problems are returned before any page is fetched.
pub async fn crawl<I, S>(
    seeds: &[Url],
    max_depth: usize,
    allowed_hosts: I,
    processor: Arc<dyn PageProcessor>,
) -> Result<CrawlOutcome, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let config = CrawlerConfig::new(seeds.to_vec(), max_depth, allowed_hosts)?;
    let crawler = Crawler::new(config, processor)?;
    Ok(crawler.crawl().await)
}

/// Spawns a single worker
///
/// The worker pulls tasks until the queue closes. Each task runs in its own
/// tokio task so a panic is contained and reported as a `TaskFailure`.
fn spawn_worker(worker_id: usize, state: Arc<CrawlState>) -> tokio::task::JoinHandle<()> {
    ::log::trace!("Spawning worker {}", worker_id);

    tokio::spawn(async move {
        while let Some(task) = state.queue.next().await {
            ::log::trace!("Worker {} processing: {}", worker_id, task.url);

            let handle = tokio::spawn(process_task(Arc::clone(&state), task.clone()));
            if let Err(e) = handle.await {
                let reason = if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    e.to_string()
                };
                ::log::error!(
                    "Worker {} task for {} failed: {}",
                    worker_id,
                    task.url,
                    reason
                );
                state.failures.lock().await.push(TaskFailure {
                    url: task.url,
                    depth: task.depth,
                    root: task.root.to_string(),
                    reason,
                });
            }

            state.queue.complete().await;
        }

        ::log::debug!("Worker {} finished - no more tasks", worker_id);
    })
}

async fn process_task(state: Arc<CrawlState>, task: CrawlTask) {
    let Some(key) = state.filter.admit_url(&task.url) else {
        return;
    };

    if !state.filter.within_depth(task.depth) {
        state.attribute_if_known(&key, &task.root).await;
        return;
    }

    let Some(attribution) = state.claim(key, &task.root).await else {
        ::log::trace!("Skipping already visited: {}", task.url);
        return;
    };

    let page = state.processor.process_page(&task.url, task.depth).await;

    // Children of a page at the depth limit are still queued; they can only
    // attribute their root to pages that are already known.
    let children = if page.is_broken {
        Vec::new()
    } else {
        let mut seen = HashSet::new();
        page.links
            .iter()
            .filter(|link| seen.insert(link.as_str()))
            .cloned()
            .collect()
    };

    state.results.lock().await.push(CrawledPage {
        url: task.url,
        depth: task.depth,
        headings: page.headings,
        links: page.links,
        is_broken: page.is_broken,
        attribution,
    });

    for link in children {
        state
            .queue
            .submit(CrawlTask {
                url: link,
                depth: task.depth + 1,
                root: Arc::clone(&task.root),
            })
            .await;
    }
}

async fn collect_outcome(state: &CrawlState) -> CrawlOutcome {
    let mut results = state.results.lock().await;
    let mut pages = Vec::with_capacity(results.len());
    for page in results.drain(..) {
        pages.push(PageRecord {
            url: page.url,
            depth: page.depth,
            headings: page.headings,
            links: page.links,
            is_broken: page.is_broken,
            from_start_urls: page.attribution.roots().await,
        });
    }
    drop(results);

    let failures = std::mem::take(&mut *state.failures.lock().await);

    ::log::info!(
        "Crawl complete - {} page(s), {} task failure(s)",
        pages.len(),
        failures.len()
    );

    CrawlOutcome { pages, failures }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("task panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("task panicked: {}", message)
    } else {
        "task panicked".to_string()
    }
}
