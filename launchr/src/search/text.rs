use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::matcher::PatternMatcher;
use super::{EmptyIterator, Polled, QueryIterator, Searcher};
use crate::cancel::{lock, CancellationToken, WorkerSet};
use crate::context::LauncherContext;
use crate::metrics::ScanMetrics;
use crate::mmap::MappedFile;
use crate::results::{Record, SearchItem};
use crate::walker::walk;

/// Longest a content worker waits for a file before rechecking cancellation
pub const WAKE_TIMEOUT: Duration = Duration::from_millis(100);

/// Live file content search over the working directory.
///
/// One thread walks the tree and feeds regular files to a pool of workers;
/// each worker maps a file and looks for the query's UTF-8 bytes with
/// Boyer-Moore. When `max_scan` is set only that many leading bytes of a
/// file are searched, so a match past the limit is not reported.
#[derive(Debug, Clone)]
pub struct TextSearcher {
    root: PathBuf,
    max_scan: Option<usize>,
    worker_count: usize,
}

impl TextSearcher {
    pub fn new(context: &LauncherContext) -> Self {
        let config = context.config();
        Self {
            root: context.working_dir().to_path_buf(),
            max_scan: config.text_limit(),
            worker_count: config.text_worker_count(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}

impl Searcher for TextSearcher {
    fn name(&self) -> &'static str {
        "text"
    }

    fn query(&self, query: &str) -> Box<dyn QueryIterator> {
        if query.is_empty() {
            return Box::new(EmptyIterator);
        }
        Box::new(TextIter::start(self, PatternMatcher::new(query.as_bytes())))
    }
}

struct Shared {
    results: Mutex<VecDeque<SearchItem>>,
    exited: AtomicUsize,
    metrics: ScanMetrics,
}

struct TextIter {
    shared: Arc<Shared>,
    worker_count: usize,
    workers: WorkerSet,
}

impl TextIter {
    fn start(searcher: &TextSearcher, matcher: PatternMatcher) -> Self {
        let shared = Arc::new(Shared {
            results: Mutex::new(VecDeque::new()),
            exited: AtomicUsize::new(0),
            metrics: ScanMetrics::new(),
        });
        let token = CancellationToken::new();
        let mut workers = WorkerSet::new(token.clone());
        let (files_tx, files_rx) = crossbeam_channel::unbounded::<Record>();

        let root = searcher.root.clone();
        let walk_token = token.clone();
        let walk_metrics = shared.metrics.clone();
        if let Err(e) = workers.spawn("launchr-text-walk", move || {
            traverse(&root, &walk_token, &files_tx, &walk_metrics);
        }) {
            // The sender went down with the closure, so workers see a
            // finished traversal and exit on their own.
            warn!("Text search traversal not started: {}", e);
        }

        let mut worker_count = 0;
        for i in 0..searcher.worker_count.max(1) {
            let ctx = WorkerContext {
                files: files_rx.clone(),
                matcher: matcher.clone(),
                max_scan: searcher.max_scan,
                token: token.clone(),
                shared: shared.clone(),
            };
            match workers.spawn(format!("launchr-text-{i}"), move || ctx.run()) {
                Ok(()) => worker_count += 1,
                Err(e) => {
                    warn!("Text search worker not started: {}", e);
                    break;
                }
            }
        }
        debug!("Text search started with {} workers", worker_count);

        Self {
            shared,
            worker_count,
            workers,
        }
    }
}

fn traverse(
    root: &std::path::Path,
    token: &CancellationToken,
    files: &Sender<Record>,
    metrics: &ScanMetrics,
) {
    let summary = walk(root, usize::MAX, |record| {
        if token.is_cancelled() {
            return false;
        }
        if record.is_file {
            metrics.record_queued();
            // Every receiver is gone only if all workers have exited
            if files.send(record.clone()).is_err() {
                return false;
            }
        }
        true
    });
    debug!(
        "Text search traversal of {} done: {} entries, stopped early: {}",
        root.display(),
        summary.visited,
        summary.stopped
    );
}

struct WorkerContext {
    files: Receiver<Record>,
    matcher: PatternMatcher,
    max_scan: Option<usize>,
    token: CancellationToken,
    shared: Arc<Shared>,
}

impl WorkerContext {
    fn run(self) {
        while !self.token.is_cancelled() {
            match self.files.recv_timeout(WAKE_TIMEOUT) {
                Ok(record) => {
                    if self.token.is_cancelled() {
                        break;
                    }
                    self.scan(&record);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                // Traversal finished and the queue is drained
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.shared.exited.fetch_add(1, Ordering::SeqCst);
    }

    fn scan(&self, record: &Record) {
        let mapped = match MappedFile::open(&record.path) {
            Ok(mapped) => mapped,
            Err(e) => {
                trace!("Skipping {}: {}", record.path.display(), e);
                self.shared.metrics.record_unavailable();
                return;
            }
        };

        let bytes = mapped.prefix(self.max_scan);
        self.shared
            .metrics
            .record_scan(mapped.len() as u64, bytes.len() as u64);

        if self.matcher.is_match(bytes) {
            self.shared.metrics.record_match();
            lock(&self.shared.results).push_back(record.to_item());
        }
    }
}

impl QueryIterator for TextIter {
    fn next(&mut self) -> Polled {
        // Read the exit count first: workers push before they count
        // themselves out, so a full count means the queue is complete.
        let all_exited = self.shared.exited.load(Ordering::SeqCst) >= self.worker_count;
        if let Some(item) = lock(&self.shared.results).pop_front() {
            return Polled::Item(item);
        }
        if all_exited {
            Polled::End
        } else {
            Polled::TryAgain
        }
    }
}

impl Drop for TextIter {
    fn drop(&mut self) {
        self.workers.shutdown();
        self.shared.metrics.log_stats();
    }
}
