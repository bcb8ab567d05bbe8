//! Search backends and the orchestrator that merges them.
//!
//! Every backend implements [`Searcher`]. A query produces a
//! [`QueryIterator`] that the orchestrator polls without blocking:
//!
//! ```rust,ignore
//! let mut it = searcher.query("report");
//! loop {
//!     match it.next() {
//!         Polled::Item(item) => show(item),
//!         Polled::TryAgain => continue, // backend still working
//!         Polled::End => break,         // never yields again
//!     }
//! }
//! ```
//!
//! Creating the iterator is cheap. Any threads a backend needs are owned by
//! the iterator and are cancelled and joined when it drops, so discarding an
//! iterator for a superseded query leaves nothing running.
pub mod engine;
pub mod file_name;
pub mod matcher;
pub mod portable_apps;
pub mod text;

pub use engine::{OrchestratorOptions, QueryOrchestrator};
pub use file_name::FileNameSearcher;
pub use matcher::PatternMatcher;
pub use portable_apps::PortableAppSearcher;
pub use text::TextSearcher;

use crate::results::SearchItem;

/// Outcome of one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Polled {
    /// A result is ready
    Item(SearchItem),
    /// Nothing ready yet, the backend is still working
    TryAgain,
    /// The backend will never produce another result for this query
    End,
}

/// Per query cursor over a backend's results
pub trait QueryIterator: Send {
    /// Returns immediately. Once `End` is returned every later call returns
    /// `End` as well.
    fn next(&mut self) -> Polled;
}

/// A pluggable search backend
pub trait Searcher: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Starts a query. Must not block; expensive work belongs to the iterator.
    fn query(&self, query: &str) -> Box<dyn QueryIterator>;
}

/// Iterator that is finished before it starts
#[derive(Debug, Default)]
pub struct EmptyIterator;

impl QueryIterator for EmptyIterator {
    fn next(&mut self) -> Polled {
        Polled::End
    }
}

/// Placeholder backend that never finds anything
#[derive(Debug, Default)]
pub struct NullSearcher;

impl Searcher for NullSearcher {
    fn name(&self) -> &'static str {
        "null"
    }

    fn query(&self, _query: &str) -> Box<dyn QueryIterator> {
        Box::new(EmptyIterator)
    }
}

/// Wraps an iterator so that `End` stays `End` and the inner iterator (with
/// any threads it owns) is released as soon as it ends.
pub struct Fused {
    inner: Option<Box<dyn QueryIterator>>,
}

impl Fused {
    pub fn new(inner: Box<dyn QueryIterator>) -> Self {
        Self { inner: Some(inner) }
    }

    pub fn is_done(&self) -> bool {
        self.inner.is_none()
    }
}

impl QueryIterator for Fused {
    fn next(&mut self) -> Polled {
        let Some(inner) = self.inner.as_mut() else {
            return Polled::End;
        };
        match inner.next() {
            Polled::End => {
                self.inner = None;
                Polled::End
            }
            other => other,
        }
    }
}

/// Polls `iter` until it ends or `timeout` elapses, collecting items.
/// Returns `None` on timeout. Intended for callers without an event loop.
pub fn drain_blocking(
    iter: &mut dyn QueryIterator,
    timeout: std::time::Duration,
) -> Option<Vec<SearchItem>> {
    let deadline = std::time::Instant::now() + timeout;
    let mut items = Vec::new();
    loop {
        match iter.next() {
            Polled::Item(item) => items.push(item),
            Polled::TryAgain => {
                if std::time::Instant::now() >= deadline {
                    return None;
                }
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            Polled::End => return Some(items),
        }
    }
}
