use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::{Polled, QueryIterator, Searcher};
use crate::cancel::{lock, CancellationToken, WorkerSet};
use crate::context::LauncherContext;
use crate::results::SearchItem;
use crate::walker::walk;

/// `FooPortable.exe` style launchers; the capture is the title.
static LAUNCHER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*Portable)\.exe$").expect("launcher pattern is valid"));

#[derive(Debug, Default)]
struct IndexState {
    entries: Vec<SearchItem>,
    finished: bool,
}

/// Portable application launchers found one level below the working
/// directory.
///
/// The scan runs once, in the background, when the searcher is created.
/// It is not repeated; launchers added later show up after a restart.
pub struct PortableAppSearcher {
    index: Arc<Mutex<IndexState>>,
    _scanner: WorkerSet,
}

impl PortableAppSearcher {
    pub fn new(context: &LauncherContext) -> Self {
        Self::scan(context.working_dir().to_path_buf())
    }

    /// Starts the background scan of `root`
    pub fn scan(root: PathBuf) -> Self {
        let index = Arc::new(Mutex::new(IndexState::default()));
        let token = CancellationToken::new();
        let mut scanner = WorkerSet::new(token.clone());

        let shared = index.clone();
        let spawned = scanner.spawn("launchr-portable-scan", move || {
            scan_launchers(&root, &token, &shared);
            let mut state = lock(&shared);
            state.finished = true;
            info!("Portable app index ready: {} launchers", state.entries.len());
        });

        if let Err(e) = spawned {
            warn!("Portable app scan not started: {}", e);
            lock(&index).finished = true;
        }

        Self {
            index,
            _scanner: scanner,
        }
    }

    /// A searcher over an already built index
    pub fn with_entries(entries: Vec<SearchItem>) -> Self {
        let index = IndexState {
            entries,
            finished: true,
        };
        Self {
            index: Arc::new(Mutex::new(index)),
            _scanner: WorkerSet::new(CancellationToken::new()),
        }
    }

    pub fn is_ready(&self) -> bool {
        lock(&self.index).finished
    }
}

fn scan_launchers(root: &Path, token: &CancellationToken, index: &Mutex<IndexState>) {
    let summary = walk(root, 1, |record| {
        if token.is_cancelled() {
            return false;
        }
        if record.depth != 1 || !record.is_file {
            return true;
        }
        if let Some(caps) = LAUNCHER_NAME.captures(&record.name) {
            let title = caps[1].to_string();
            debug!("Found portable launcher {} at {}", title, record.path.display());
            lock(index)
                .entries
                .push(SearchItem::new(title, Some(record.path.clone())));
        }
        true
    });

    if summary.stopped {
        debug!("Portable app scan of {} cancelled", root.display());
    }
}

impl Searcher for PortableAppSearcher {
    fn name(&self) -> &'static str {
        "portable-apps"
    }

    fn query(&self, query: &str) -> Box<dyn QueryIterator> {
        Box::new(PortableAppIter {
            index: self.index.clone(),
            needle: query.to_lowercase(),
            matches: None,
        })
    }
}

struct PortableAppIter {
    index: Arc<Mutex<IndexState>>,
    needle: String,
    /// Filled once the index is ready
    matches: Option<VecDeque<SearchItem>>,
}

impl QueryIterator for PortableAppIter {
    fn next(&mut self) -> Polled {
        if self.matches.is_none() {
            let state = lock(&self.index);
            if !state.finished {
                return Polled::TryAgain;
            }
            let needle = self.needle.as_str();
            let filtered = state
                .entries
                .iter()
                .filter(|item| needle.is_empty() || item.title.to_lowercase().contains(needle))
                .cloned()
                .collect();
            self.matches = Some(filtered);
        }

        match self.matches.as_mut().and_then(VecDeque::pop_front) {
            Some(item) => Polled::Item(item),
            None => Polled::End,
        }
    }
}
