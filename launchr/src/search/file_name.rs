use glob::Pattern;
use regex::Regex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::{EmptyIterator, Polled, QueryIterator, Searcher};
use crate::cancel::{lock, CancellationToken, WorkerSet};
use crate::context::LauncherContext;
use crate::errors::{SearchError, SearchResult};
use crate::results::SearchItem;
use crate::walker::walk;

/// How a query is matched against file names
#[derive(Debug, Clone)]
pub enum NameMatcher {
    /// Unanchored regular expression search
    Regex(Regex),
    /// Shell-style wildcard matched against the whole name
    Wildcard(Pattern),
}

impl NameMatcher {
    /// Compiles `query` as a regular expression, falling back to a wildcard
    /// pattern for inputs such as `*.txt` that are not valid regexes.
    pub fn compile(query: &str) -> SearchResult<Self> {
        match Regex::new(query) {
            Ok(regex) => Ok(Self::Regex(regex)),
            Err(regex_err) => match Pattern::new(query) {
                Ok(pattern) => {
                    debug!("Query '{}' treated as wildcard pattern", query);
                    Ok(Self::Wildcard(pattern))
                }
                Err(_) => Err(SearchError::invalid_pattern(regex_err.to_string())),
            },
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(name),
            Self::Wildcard(pattern) => pattern.matches(name),
        }
    }
}

/// Live file name search over the working directory
#[derive(Debug, Clone)]
pub struct FileNameSearcher {
    root: PathBuf,
    max_depth: usize,
}

impl FileNameSearcher {
    pub fn new(context: &LauncherContext) -> Self {
        Self {
            root: context.working_dir().to_path_buf(),
            max_depth: context.config().file_name_max_depth.unwrap_or(usize::MAX),
        }
    }
}

impl Searcher for FileNameSearcher {
    fn name(&self) -> &'static str {
        "file-name"
    }

    fn query(&self, query: &str) -> Box<dyn QueryIterator> {
        let matcher = match NameMatcher::compile(query) {
            Ok(matcher) => matcher,
            Err(e) => {
                warn!("File name search skipped: {}", e);
                return Box::new(EmptyIterator);
            }
        };
        Box::new(FileNameIter::start(self.root.clone(), self.max_depth, matcher))
    }
}

#[derive(Debug, Default)]
struct Pending {
    items: VecDeque<SearchItem>,
    done: bool,
}

struct FileNameIter {
    pending: Arc<Mutex<Pending>>,
    _workers: WorkerSet,
}

impl FileNameIter {
    fn start(root: PathBuf, max_depth: usize, matcher: NameMatcher) -> Self {
        let pending = Arc::new(Mutex::new(Pending::default()));
        let token = CancellationToken::new();
        let mut workers = WorkerSet::new(token.clone());

        let shared = pending.clone();
        let spawned = workers.spawn("launchr-file-name", move || {
            let summary = walk(&root, max_depth, |record| {
                if token.is_cancelled() {
                    return false;
                }
                if record.is_file && matcher.matches(&record.name) {
                    lock(&shared).items.push_back(record.to_item());
                }
                true
            });
            debug!(
                "File name walk of {} finished: {} entries, {} unreadable directories",
                root.display(),
                summary.visited,
                summary.skipped_dirs
            );
            lock(&shared).done = true;
        });

        if let Err(e) = spawned {
            warn!("File name search not started: {}", e);
            lock(&pending).done = true;
        }

        Self {
            pending,
            _workers: workers,
        }
    }
}

impl QueryIterator for FileNameIter {
    fn next(&mut self) -> Polled {
        let mut pending = lock(&self.pending);
        match pending.items.pop_front() {
            Some(item) => Polled::Item(item),
            None if pending.done => Polled::End,
            None => Polled::TryAgain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LauncherConfig;
    use crate::search::drain_blocking;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn searcher_for(dir: &std::path::Path) -> FileNameSearcher {
        let config = LauncherConfig {
            working_dir: Some(dir.to_path_buf()),
            ..LauncherConfig::default()
        };
        FileNameSearcher::new(&LauncherContext::new(config).unwrap())
    }

    fn titles(searcher: &FileNameSearcher, query: &str) -> Vec<String> {
        let mut it = searcher.query(query);
        let mut titles: Vec<String> = drain_blocking(it.as_mut(), Duration::from_secs(10))
            .expect("file name search timed out")
            .into_iter()
            .map(|item| item.title)
            .collect();
        titles.sort();
        titles
    }

    #[test]
    fn test_wildcard_query() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        fs::write(dir.path().join("b.log"), "").unwrap();

        assert_eq!(titles(&searcher_for(dir.path()), "*.txt"), vec!["a.txt"]);
    }

    #[test]
    fn test_regex_query_searches_subdirectories() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
        fs::write(dir.path().join("report.pdf"), "").unwrap();
        fs::write(dir.path().join("nested/report-2023.pdf"), "").unwrap();
        fs::write(dir.path().join("nested/deeper/summary.pdf"), "").unwrap();
        fs::write(dir.path().join("nested/report.doc"), "").unwrap();

        assert_eq!(
            titles(&searcher_for(dir.path()), r"^report.*\.pdf$"),
            vec!["report-2023.pdf", "report.pdf"]
        );
    }

    #[test]
    fn test_directories_are_not_results() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("music")).unwrap();
        fs::write(dir.path().join("music/music.mp3"), "").unwrap();

        let found = titles(&searcher_for(dir.path()), "music");
        assert_eq!(found, vec!["music.mp3"]);
    }

    #[test]
    fn test_result_paths_point_at_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let searcher = searcher_for(dir.path());
        let mut it = searcher.query("notes");
        let items = drain_blocking(it.as_mut(), Duration::from_secs(10)).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].path.as_deref(), Some(dir.path().join("notes.txt").as_path()));
    }

    #[test]
    fn test_invalid_query_ends_immediately() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();

        let mut it = searcher_for(dir.path()).query("[unclosed");
        assert_eq!(it.next(), Polled::End);
        assert_eq!(it.next(), Polled::End);
    }

    #[test]
    fn test_end_is_terminal() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("one.txt"), "").unwrap();

        let mut it = searcher_for(dir.path()).query("one");
        drain_blocking(it.as_mut(), Duration::from_secs(10)).unwrap();
        for _ in 0..5 {
            assert_eq!(it.next(), Polled::End);
        }
    }

    #[test]
    fn test_drop_mid_walk_joins_worker() {
        let dir = tempdir().unwrap();
        for i in 0..50 {
            let sub = dir.path().join(format!("dir{i}"));
            fs::create_dir(&sub).unwrap();
            for j in 0..20 {
                fs::write(sub.join(format!("file{j}.dat")), "").unwrap();
            }
        }

        let it = searcher_for(dir.path()).query("file");
        // Dropping must return only after the worker exits
        drop(it);
    }

    #[cfg(unix)]
    #[test]
    fn test_linked_files_are_found() {
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("real.txt"), "").unwrap();

        let dir = tempdir().unwrap();
        fs::write(dir.path().join("plain.txt"), "").unwrap();
        std::os::unix::fs::symlink(outside.path().join("real.txt"), dir.path().join("linked.txt"))
            .unwrap();

        assert_eq!(
            titles(&searcher_for(dir.path()), "txt"),
            vec!["linked.txt", "plain.txt"]
        );
    }

    #[test]
    fn test_name_matcher_compile() {
        assert!(matches!(NameMatcher::compile("a.c"), Ok(NameMatcher::Regex(_))));
        assert!(matches!(
            NameMatcher::compile("*.rs"),
            Ok(NameMatcher::Wildcard(_))
        ));
        assert!(NameMatcher::compile("[").is_err());

        let wildcard = NameMatcher::compile("?ain.*").unwrap();
        assert!(wildcard.matches("main.rs"));
        assert!(!wildcard.matches("domain.rs"));
    }
}
