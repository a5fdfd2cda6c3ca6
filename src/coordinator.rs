use crate::client::PageSource;
use crate::config::FetchConfig;
use crate::record::AttributeRecord;
use crossbeam_channel::{bounded, Receiver, Sender};
use indicatif::ProgressBar;
use log::{debug, error, info};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

struct FetchStats {
    pages_ok: AtomicUsize,
    pages_empty: AtomicUsize,
    pages_failed: AtomicUsize,
    records: AtomicUsize,
}

impl FetchStats {
    fn new() -> Self {
        Self {
            pages_ok: AtomicUsize::new(0),
            pages_empty: AtomicUsize::new(0),
            pages_failed: AtomicUsize::new(0),
            records: AtomicUsize::new(0),
        }
    }

    fn record_page(&self, count: usize) {
        self.pages_ok.fetch_add(1, Ordering::Relaxed);
        self.records.fetch_add(count, Ordering::Relaxed);
        if count == 0 {
            self.pages_empty.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_failure(&self) {
        self.pages_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn finish(&self, pages_requested: usize) -> FetchSummary {
        FetchSummary {
            pages_requested,
            pages_ok: self.pages_ok.load(Ordering::Relaxed),
            pages_empty: self.pages_empty.load(Ordering::Relaxed),
            pages_failed: self.pages_failed.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    pub pages_requested: usize,
    /// Includes empty pages.
    pub pages_ok: usize,
    pub pages_empty: usize,
    pub pages_failed: usize,
    pub records: usize,
}

/// Everything the fetch phase produced. `records` is in arrival order, which
/// differs between runs.
#[derive(Debug)]
pub struct FetchOutcome {
    pub records: Vec<AttributeRecord>,
    pub summary: FetchSummary,
}

/// Fans page offsets out to a fixed pool of worker threads and gathers the
/// returned records.
///
/// Failed pages are logged and dropped. Empty pages do not end the run; only
/// `max_batches` bounds the number of requests.
pub struct FetchCoordinator {
    config: FetchConfig,
    progress: ProgressBar,
}

impl FetchCoordinator {
    pub fn new(config: FetchConfig) -> Self {
        Self { config, progress: ProgressBar::hidden() }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Blocks until every worker has drained the offset queue.
    pub fn run<S: PageSource + ?Sized>(&self, source: &S) -> FetchOutcome {
        let accumulator: Mutex<Vec<AttributeRecord>> = Mutex::new(Vec::new());
        let stats = FetchStats::new();
        let (offset_sender, offset_receiver): (Sender<usize>, Receiver<usize>) = bounded(self.config.workers);
        let mut pages_requested = 0;

        info!(
            "Fetching up to {} pages of {} records with {} workers",
            self.config.max_batches, self.config.page_size, self.config.workers
        );

        thread::scope(|scope| {
            for worker_id in 0..self.config.workers {
                let receiver = offset_receiver.clone();
                let accumulator = &accumulator;
                let stats = &stats;
                let progress = &self.progress;
                let page_size = self.config.page_size;

                scope.spawn(move || {
                    debug!("Worker {} started.", worker_id);
                    for offset in receiver {
                        match source.fetch_page(offset, page_size) {
                            Ok(records) if records.is_empty() => {
                                debug!("Offset {} returned no records.", offset);
                                stats.record_page(0);
                            }
                            Ok(records) => {
                                stats.record_page(records.len());
                                accumulator
                                    .lock()
                                    .unwrap_or_else(PoisonError::into_inner)
                                    .extend(records);
                            }
                            Err(e) => {
                                error!("Error fetching offset {}: {}", e.offset(), e);
                                stats.record_failure();
                            }
                        }
                        progress.inc(1);
                    }
                    debug!("Worker {} finished.", worker_id);
                });
            }
            drop(offset_receiver);

            for offset in self.config.offsets() {
                if offset_sender.send(offset).is_err() {
                    error!("All workers exited before offset {} could be dispatched.", offset);
                    break;
                }
                pages_requested += 1;
            }
            drop(offset_sender);
        });

        let summary = stats.finish(pages_requested);
        self.progress.finish_with_message(format!(
            "{} pages ok, {} failed, {} records",
            summary.pages_ok, summary.pages_failed, summary.records
        ));

        let records = accumulator.into_inner().unwrap_or_else(PoisonError::into_inner);
        FetchOutcome { records, summary }
    }
}
