//! Breadth-first directory enumeration.
//!
//! Entries are reported level by level: everything directly under the root
//! (depth 0) before anything in a subdirectory (depth 1), and so on. Shallow
//! matches therefore reach the UI first even if a query is cancelled early.
//!
//! A symbolic link to a regular file is reported as that file. Links to
//! directories are skipped, so a link cycle cannot trap a query.
use std::collections::VecDeque;
use std::fs::{self, DirEntry};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::results::{unix_seconds, Record};

/// Counters describing one walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Entries handed to the visitor
    pub visited: usize,
    /// Directories that could not be read
    pub skipped_dirs: usize,
    /// Whether the visitor ended the walk early
    pub stopped: bool,
}

/// Walks `root` breadth first, calling `visit` for every file and directory
/// up to `max_depth` (0 lists only the root's own entries).
///
/// `visit` returns `false` to stop the walk immediately. A directory that
/// cannot be read is logged and skipped; its siblings are still walked.
pub fn walk<F>(root: &Path, max_depth: usize, mut visit: F) -> WalkSummary
where
    F: FnMut(&Record) -> bool,
{
    let mut summary = WalkSummary::default();
    let mut pending: VecDeque<(PathBuf, usize)> = VecDeque::new();
    pending.push_back((root.to_path_buf(), 0));

    while let Some((dir, depth)) = pending.pop_front() {
        if depth > max_depth {
            break;
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping unreadable directory {}: {}", dir.display(), e);
                summary.skipped_dirs += 1;
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Failed to read entry in {}: {}", dir.display(), e);
                    continue;
                }
            };

            let Some(record) = record_for(&entry, depth) else {
                continue;
            };

            summary.visited += 1;
            if !visit(&record) {
                trace!("Walk of {} stopped by visitor", root.display());
                summary.stopped = true;
                return summary;
            }

            if !record.is_file && depth < max_depth {
                pending.push_back((record.path, depth + 1));
            }
        }
    }

    summary
}

/// Builds a record for a regular file or directory, `None` for anything else.
/// Links are resolved only when they point at a regular file.
fn record_for(entry: &DirEntry, depth: usize) -> Option<Record> {
    let path = entry.path();
    let file_type = match entry.file_type() {
        Ok(file_type) => file_type,
        Err(e) => {
            debug!("Cannot stat {}: {}", path.display(), e);
            return None;
        }
    };

    let (is_file, metadata) = if file_type.is_symlink() {
        match fs::metadata(&path) {
            Ok(target) if target.is_file() => (true, Some(target)),
            Ok(_) => {
                trace!("Not following link {}", path.display());
                return None;
            }
            Err(e) => {
                debug!("Dangling link {}: {}", path.display(), e);
                return None;
            }
        }
    } else if file_type.is_file() || file_type.is_dir() {
        (file_type.is_file(), entry.metadata().ok())
    } else {
        return None;
    };

    Some(Record {
        name: entry.file_name().to_string_lossy().into_owned(),
        path,
        size: metadata.as_ref().map_or(0, |m| m.len()),
        created: metadata.as_ref().and_then(|m| unix_seconds(m.created())),
        modified: metadata.as_ref().and_then(|m| unix_seconds(m.modified())),
        is_file,
        depth,
    })
}
