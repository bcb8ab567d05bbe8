use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{trace, warn};

use crate::errors::{SearchError, SearchResult};

/// Cooperative cancellation flag shared between an owner and its workers.
///
/// Workers check `is_cancelled` at every loop boundary and after every timed
/// wait. Cloning shares the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A set of named threads that are cancelled and joined when the set drops.
///
/// Whatever spawns work for a query owns one of these, so dropping the owner
/// cannot return while a worker still touches its shared state.
#[derive(Debug)]
pub struct WorkerSet {
    token: CancellationToken,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl WorkerSet {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            handles: Vec::new(),
        }
    }

    /// Spawns a named worker
    pub fn spawn<F>(&mut self, name: impl Into<String>, work: F) -> SearchResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(work)
            .map_err(|e| SearchError::thread_spawn(format!("{name}: {e}")))?;
        self.handles.push((name, handle));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Whether every worker has returned
    pub fn all_finished(&self) -> bool {
        self.handles.iter().all(|(_, handle)| handle.is_finished())
    }

    /// Requests cancellation and waits for every worker to exit
    pub fn shutdown(&mut self) {
        self.token.cancel();
        for (name, handle) in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("Worker thread {} panicked", name);
            } else {
                trace!("Joined worker thread {}", name);
            }
        }
    }
}

impl Drop for WorkerSet {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Locks a mutex, recovering the data if a worker panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
