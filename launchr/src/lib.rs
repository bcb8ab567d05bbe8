pub mod cancel;
pub mod config;
pub mod context;
pub mod errors;
pub mod metrics;
pub mod mmap;
pub mod results;
pub mod search;
pub mod walker;

pub use cancel::{CancellationToken, WorkerSet};
pub use config::{CliOverrides, LauncherConfig};
pub use context::LauncherContext;
pub use errors::{SearchError, SearchResult};
pub use metrics::{ScanMetrics, ScanStats};
pub use mmap::MappedFile;
pub use results::{Record, SearchEvent, SearchItem};
pub use search::{
    OrchestratorOptions, PatternMatcher, Polled, QueryIterator, QueryOrchestrator, Searcher,
};
pub use walker::{walk, WalkSummary};
