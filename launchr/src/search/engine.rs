use crossbeam_channel::Sender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use super::{Fused, Polled, QueryIterator, Searcher};
use crate::cancel::{CancellationToken, WorkerSet};
use crate::config::LauncherConfig;
use crate::errors::SearchResult;
use crate::results::SearchEvent;

/// Status text sent with progress events
pub const SEARCHING_STATUS: &str = "Searching...";

/// Tuning for the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Sleep after a tick in which no backend produced anything
    pub idle_interval: Duration,
    /// Minimum time between two progress events
    pub progress_interval: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_millis(10),
            progress_interval: Duration::from_millis(100),
        }
    }
}

impl From<&LauncherConfig> for OrchestratorOptions {
    fn from(config: &LauncherConfig) -> Self {
        Self {
            idle_interval: config.poll_idle(),
            progress_interval: config.progress_interval(),
        }
    }
}

/// Fans each query out to every searcher and streams the merged results to
/// a sink.
///
/// At most one query generation is alive. `submit` cancels the previous one
/// and waits for all of its threads, backends included, before starting the
/// next, so the sink never receives an item from a superseded query after
/// `submit` returns.
pub struct QueryOrchestrator {
    searchers: Vec<Arc<dyn Searcher>>,
    options: OrchestratorOptions,
    sink: Sender<SearchEvent>,
    generation: u64,
    active: Option<WorkerSet>,
}

impl QueryOrchestrator {
    pub fn new(
        searchers: Vec<Arc<dyn Searcher>>,
        options: OrchestratorOptions,
        sink: Sender<SearchEvent>,
    ) -> Self {
        Self {
            searchers,
            options,
            sink,
            generation: 0,
            active: None,
        }
    }

    /// Starts `query`, superseding any running one. Returns its generation.
    pub fn submit(&mut self, query: &str) -> SearchResult<u64> {
        self.cancel();

        self.generation += 1;
        let generation = self.generation;
        debug!("Starting query generation {}: '{}'", generation, query);

        let token = CancellationToken::new();
        let mut poller = WorkerSet::new(token.clone());
        let run = QueryRun {
            generation,
            query: query.to_string(),
            searchers: self.searchers.clone(),
            options: self.options,
            sink: self.sink.clone(),
            token,
        };
        poller.spawn(format!("launchr-query-{generation}"), move || run.poll())?;
        self.active = Some(poller);
        Ok(generation)
    }

    /// Cancels the running query, if any, and waits for it to wind down
    pub fn cancel(&mut self) {
        if let Some(mut poller) = self.active.take() {
            trace!("Cancelling query generation {}", self.generation);
            poller.shutdown();
        }
    }

    /// Whether the current generation is still producing results
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|poller| !poller.all_finished())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn searcher_count(&self) -> usize {
        self.searchers.len()
    }
}

impl Drop for QueryOrchestrator {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// State moved onto the poll thread of one generation
struct QueryRun {
    generation: u64,
    query: String,
    searchers: Vec<Arc<dyn Searcher>>,
    options: OrchestratorOptions,
    sink: Sender<SearchEvent>,
    token: CancellationToken,
}

impl QueryRun {
    fn poll(self) {
        let started = Instant::now();
        let mut active: Vec<(&'static str, Fused)> = self
            .searchers
            .iter()
            .map(|searcher| (searcher.name(), Fused::new(searcher.query(&self.query))))
            .collect();

        let mut count = 0usize;
        let mut last_progress = Instant::now();
        let mut cancelled = false;

        while !active.is_empty() {
            if self.token.is_cancelled() {
                cancelled = true;
                break;
            }

            let mut produced = false;
            let mut sink_closed = false;
            active.retain_mut(|(name, iter)| {
                if sink_closed {
                    return true;
                }
                match iter.next() {
                    Polled::Item(item) => {
                        produced = true;
                        count += 1;
                        let event = SearchEvent::Item {
                            generation: self.generation,
                            item,
                        };
                        if self.sink.send(event).is_err() {
                            sink_closed = true;
                        }
                        true
                    }
                    Polled::TryAgain => true,
                    Polled::End => {
                        trace!("Searcher {} finished generation {}", name, self.generation);
                        false
                    }
                }
            });

            if sink_closed {
                warn!("Result sink closed, abandoning generation {}", self.generation);
                return;
            }

            if last_progress.elapsed() >= self.options.progress_interval {
                last_progress = Instant::now();
                let progress = SearchEvent::Progress {
                    generation: self.generation,
                    status: SEARCHING_STATUS.to_string(),
                    count,
                };
                if self.sink.send(progress).is_err() {
                    return;
                }
            }

            if !produced && !active.is_empty() {
                thread::sleep(self.options.idle_interval);
            }
        }

        // Dropping the iterators joins their threads before we report
        drop(active);

        info!(
            "Query generation {} {} with {} results in {:?}",
            self.generation,
            if cancelled { "cancelled" } else { "finished" },
            count,
            started.elapsed()
        );
        let _ = self.sink.send(SearchEvent::Finished {
            generation: self.generation,
            count,
            cancelled,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::SearchItem;
    use crate::search::{EmptyIterator, NullSearcher};
    use crossbeam_channel::{unbounded, Receiver};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Yields `total` items, one every other poll, and tracks liveness
    struct CountingSearcher {
        label: &'static str,
        total: usize,
        live: Arc<AtomicUsize>,
    }

    struct CountingIter {
        label: &'static str,
        remaining: usize,
        ready: bool,
        live: Arc<AtomicUsize>,
    }

    impl Searcher for CountingSearcher {
        fn name(&self) -> &'static str {
            self.label
        }

        fn query(&self, query: &str) -> Box<dyn QueryIterator> {
            self.live.fetch_add(1, Ordering::SeqCst);
            Box::new(CountingIter {
                label: if query.is_empty() { "" } else { self.label },
                remaining: self.total,
                ready: false,
                live: self.live.clone(),
            })
        }
    }

    impl QueryIterator for CountingIter {
        fn next(&mut self) -> Polled {
            if self.remaining == 0 {
                return Polled::End;
            }
            self.ready = !self.ready;
            if !self.ready {
                return Polled::TryAgain;
            }
            self.remaining -= 1;
            Polled::Item(SearchItem::new(
                format!("{}-{}", self.label, self.remaining),
                None,
            ))
        }
    }

    impl Drop for CountingIter {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Never ends until dropped; every other poll yields an item
    struct EndlessSearcher {
        dropped: Arc<AtomicBool>,
    }

    struct EndlessIter {
        dropped: Arc<AtomicBool>,
        ready: bool,
    }

    impl Searcher for EndlessSearcher {
        fn name(&self) -> &'static str {
            "endless"
        }

        fn query(&self, _query: &str) -> Box<dyn QueryIterator> {
            self.dropped.store(false, Ordering::SeqCst);
            Box::new(EndlessIter {
                dropped: self.dropped.clone(),
                ready: false,
            })
        }
    }

    impl QueryIterator for EndlessIter {
        fn next(&mut self) -> Polled {
            self.ready = !self.ready;
            if self.ready {
                Polled::Item(SearchItem::new("tick", None))
            } else {
                Polled::TryAgain
            }
        }
    }

    impl Drop for EndlessIter {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    fn fast_options() -> OrchestratorOptions {
        OrchestratorOptions {
            idle_interval: Duration::from_millis(1),
            progress_interval: Duration::from_millis(5),
        }
    }

    fn collect_until_finished(rx: &Receiver<SearchEvent>, generation: u64) -> (Vec<SearchItem>, bool) {
        let mut items = Vec::new();
        loop {
            match rx.recv_timeout(Duration::from_secs(10)).expect("query never finished") {
                SearchEvent::Item { generation: g, item } if g == generation => items.push(item),
                SearchEvent::Finished {
                    generation: g,
                    count,
                    cancelled,
                } if g == generation => {
                    assert_eq!(count, items.len());
                    return (items, cancelled);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_merges_all_searchers() {
        let live = Arc::new(AtomicUsize::new(0));
        let searchers: Vec<Arc<dyn Searcher>> = vec![
            Arc::new(CountingSearcher {
                label: "a",
                total: 3,
                live: live.clone(),
            }),
            Arc::new(NullSearcher),
            Arc::new(CountingSearcher {
                label: "b",
                total: 5,
                live: live.clone(),
            }),
        ];
        let (tx, rx) = unbounded();
        let mut orchestrator = QueryOrchestrator::new(searchers, fast_options(), tx);

        let generation = orchestrator.submit("q").unwrap();
        let (items, cancelled) = collect_until_finished(&rx, generation);

        assert!(!cancelled);
        assert_eq!(items.len(), 8);
        assert_eq!(items.iter().filter(|i| i.title.starts_with("a-")).count(), 3);
        // Per backend discovery order is preserved
        let b_titles: Vec<_> = items
            .iter()
            .filter(|i| i.title.starts_with("b-"))
            .map(|i| i.title.as_str())
            .collect();
        assert_eq!(b_titles, vec!["b-4", "b-3", "b-2", "b-1", "b-0"]);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_searchers_finishes_immediately() {
        let (tx, rx) = unbounded();
        let mut orchestrator = QueryOrchestrator::new(Vec::new(), fast_options(), tx);
        let generation = orchestrator.submit("anything").unwrap();
        let (items, cancelled) = collect_until_finished(&rx, generation);
        assert!(items.is_empty());
        assert!(!cancelled);
    }

    #[test]
    fn test_new_query_supersedes_old() {
        let dropped = Arc::new(AtomicBool::new(false));
        let searchers: Vec<Arc<dyn Searcher>> = vec![Arc::new(EndlessSearcher {
            dropped: dropped.clone(),
        })];
        let (tx, rx) = unbounded();
        let mut orchestrator = QueryOrchestrator::new(searchers, fast_options(), tx);

        let first = orchestrator.submit("one").unwrap();
        thread::sleep(Duration::from_millis(20));
        let second = orchestrator.submit("two").unwrap();
        assert!(second > first);

        thread::sleep(Duration::from_millis(20));
        orchestrator.cancel();

        // The first generation is fully reported, cancellation notice last,
        // before anything from the second one
        let events: Vec<SearchEvent> = rx.try_iter().collect();
        let finished_at = events
            .iter()
            .position(|e| matches!(e, SearchEvent::Finished { generation, .. } if *generation == first))
            .expect("first generation never finished");
        assert!(matches!(
            events[finished_at],
            SearchEvent::Finished { cancelled: true, .. }
        ));
        assert!(events[..finished_at].iter().all(|e| e.generation() == first));
        assert!(events[finished_at + 1..].iter().all(|e| e.generation() == second));
        assert!(events[finished_at + 1..]
            .iter()
            .any(|e| matches!(e, SearchEvent::Item { .. })));

        assert!(dropped.load(Ordering::SeqCst));
        assert!(!orchestrator.is_running());

        // Cancelling again is a no-op
        orchestrator.cancel();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cancel_drops_backend_iterators() {
        let dropped = Arc::new(AtomicBool::new(false));
        let searchers: Vec<Arc<dyn Searcher>> = vec![Arc::new(EndlessSearcher {
            dropped: dropped.clone(),
        })];
        let (tx, rx) = unbounded();
        let mut orchestrator = QueryOrchestrator::new(searchers, fast_options(), tx);

        let generation = orchestrator.submit("x").unwrap();
        assert!(orchestrator.is_running());
        orchestrator.cancel();
        assert!(dropped.load(Ordering::SeqCst));

        let (_, cancelled) = collect_until_finished(&rx, generation);
        assert!(cancelled);
    }

    #[test]
    fn test_progress_is_reported_while_running() {
        let dropped = Arc::new(AtomicBool::new(false));
        let searchers: Vec<Arc<dyn Searcher>> = vec![Arc::new(EndlessSearcher { dropped })];
        let (tx, rx) = unbounded();
        let mut orchestrator = QueryOrchestrator::new(searchers, fast_options(), tx);

        orchestrator.submit("x").unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut progress = None;
        while progress.is_none() && Instant::now() < deadline {
            if let Ok(SearchEvent::Progress { status, count, .. }) =
                rx.recv_timeout(Duration::from_millis(50))
            {
                progress = Some((status, count));
            }
        }
        orchestrator.cancel();

        let (status, count) = progress.expect("no progress event");
        assert_eq!(status, SEARCHING_STATUS);
        assert!(count > 0);
    }

    #[test]
    fn test_closed_sink_stops_polling() {
        let dropped = Arc::new(AtomicBool::new(false));
        let searchers: Vec<Arc<dyn Searcher>> = vec![Arc::new(EndlessSearcher {
            dropped: dropped.clone(),
        })];
        let (tx, rx) = unbounded();
        let mut orchestrator = QueryOrchestrator::new(searchers, fast_options(), tx);
        drop(rx);

        orchestrator.submit("x").unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while orchestrator.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!orchestrator.is_running());
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_empty_iterator_backend() {
        struct Empty;
        impl Searcher for Empty {
            fn name(&self) -> &'static str {
                "empty"
            }
            fn query(&self, _query: &str) -> Box<dyn QueryIterator> {
                Box::new(EmptyIterator)
            }
        }

        let (tx, rx) = unbounded();
        let mut orchestrator = QueryOrchestrator::new(vec![Arc::new(Empty)], fast_options(), tx);
        let generation = orchestrator.submit("").unwrap();
        let (items, _) = collect_until_finished(&rx, generation);
        assert!(items.is_empty());
        assert_eq!(orchestrator.generation(), generation);
        assert_eq!(orchestrator.searcher_count(), 1);
    }
}
