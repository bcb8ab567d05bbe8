use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use tracing::trace;

use crate::errors::{SearchError, SearchResult};

/// Read-only view of a whole file.
///
/// The mapping and the file handle are released when the value drops. A
/// zero-length file has no OS mapping and yields an empty slice.
#[derive(Debug)]
pub struct MappedFile {
    map: Option<Mmap>,
}

impl MappedFile {
    pub fn open(path: &Path) -> SearchResult<Self> {
        let file = File::open(path).map_err(|e| SearchError::from_open(path, e))?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Ok(Self { map: None });
        }

        // SAFETY: the map is read-only and never outlives this value. Another
        // process truncating the file while it is mapped is outside our
        // control, which is the usual caveat of memmap2.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| SearchError::map_failed(path, e))?;
        trace!("Mapped {} ({} bytes)", path.display(), map.len());
        Ok(Self { map: Some(map) })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first `limit` bytes, or the whole file when `limit` is `None` or
    /// larger than the file.
    pub fn prefix(&self, limit: Option<usize>) -> &[u8] {
        let bytes = self.as_bytes();
        match limit {
            Some(limit) if bytes.len() > limit => &bytes[..limit],
            _ => bytes,
        }
    }
}
