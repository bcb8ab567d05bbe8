use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Counters shared by the content search workers of one query
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    files_queued: Arc<AtomicU64>,
    files_scanned: Arc<AtomicU64>,
    files_unavailable: Arc<AtomicU64>,
    bytes_mapped: Arc<AtomicU64>,
    bytes_scanned: Arc<AtomicU64>,
    matches: Arc<AtomicU64>,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            files_queued: Arc::new(AtomicU64::new(0)),
            files_scanned: Arc::new(AtomicU64::new(0)),
            files_unavailable: Arc::new(AtomicU64::new(0)),
            bytes_mapped: Arc::new(AtomicU64::new(0)),
            bytes_scanned: Arc::new(AtomicU64::new(0)),
            matches: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a file handed to the workers by the traversal
    pub fn record_queued(&self) {
        self.files_queued.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a scanned file; `scanned` may be less than `mapped` when a
    /// size limit is configured
    pub fn record_scan(&self, mapped: u64, scanned: u64) {
        self.files_scanned.fetch_add(1, Ordering::Relaxed);
        self.bytes_mapped.fetch_add(mapped, Ordering::Relaxed);
        let total = self.bytes_scanned.fetch_add(scanned, Ordering::Relaxed) + scanned;
        debug!(
            "Scanned {} of {} mapped bytes, total scanned: {} bytes",
            scanned, mapped, total
        );
    }

    /// Records a file that could not be opened or mapped
    pub fn record_unavailable(&self) {
        self.files_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_match(&self) {
        self.matches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            files_queued: self.files_queued.load(Ordering::Relaxed),
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            files_unavailable: self.files_unavailable.load(Ordering::Relaxed),
            bytes_mapped: self.bytes_mapped.load(Ordering::Relaxed),
            bytes_scanned: self.bytes_scanned.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Content scan stats:\n\
             Files queued/scanned/unavailable: {}/{}/{}\n\
             Bytes mapped: {}\n\
             Bytes scanned: {}\n\
             Matches: {}",
            stats.files_queued,
            stats.files_scanned,
            stats.files_unavailable,
            stats.bytes_mapped,
            stats.bytes_scanned,
            stats.matches
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of `ScanMetrics`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files_queued: u64,
    pub files_scanned: u64,
    pub files_unavailable: u64,
    pub bytes_mapped: u64,
    pub bytes_scanned: u64,
    pub matches: u64,
}
