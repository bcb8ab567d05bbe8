//! Values that flow out of the search core.
//!
//! `SearchItem` is what a backend yields and what the UI lists. `Record` is
//! the walker's view of a directory entry, richer than an item and never
//! handed to the UI directly. `SearchEvent` is the orchestrator's message to
//! its sink.
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// One matched item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchItem {
    /// Display name
    pub title: String,
    /// Filesystem location, absent for items that are not files
    pub path: Option<PathBuf>,
}

impl SearchItem {
    pub fn new(title: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self {
            title: title.into(),
            path,
        }
    }
}

/// A directory entry visited by the walker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Seconds since the Unix epoch, when the platform reports it
    pub created: Option<i64>,
    pub modified: Option<i64>,
    pub is_file: bool,
    /// 0 for entries directly under the walk root
    pub depth: usize,
}

impl Record {
    pub fn to_item(&self) -> SearchItem {
        SearchItem::new(self.name.clone(), Some(self.path.clone()))
    }
}

/// Converts a platform timestamp to whole seconds since the Unix epoch.
pub(crate) fn unix_seconds(time: std::io::Result<SystemTime>) -> Option<i64> {
    let time = time.ok()?;
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_secs()).ok(),
        Err(before) => i64::try_from(before.duration().as_secs()).ok().map(|s| -s),
    }
}

/// Messages the orchestrator sends to its sink.
///
/// Every event carries the generation of the query that produced it, so a
/// consumer that reads lazily can tell stale events from current ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    /// A backend produced a result
    Item { generation: u64, item: SearchItem },
    /// Periodic status while the query is running
    Progress {
        generation: u64,
        status: String,
        count: usize,
    },
    /// The query stopped producing results
    Finished {
        generation: u64,
        count: usize,
        cancelled: bool,
    },
}

impl SearchEvent {
    pub fn generation(&self) -> u64 {
        match self {
            SearchEvent::Item { generation, .. }
            | SearchEvent::Progress { generation, .. }
            | SearchEvent::Finished { generation, .. } => *generation,
        }
    }
}
