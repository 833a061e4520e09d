//! Scrape orchestration across all configured queries.
//!
//! Every query gets its own pagination loop; the loops run concurrently and
//! their results are only published once all of them have finished.
//! Published state lives in a caller-owned [`ScraperState`], so a failed run
//! leaves the previous snapshot and history untouched.

use crate::locale::{Clock, SystemClock};
use crate::model::{
    ListingRecord, ScanError, ScrapeError, ScrapeHistoryEntry, ScrapeSnapshot, StorageError,
};
use crate::parser::Parser;
use crate::query::{DEFAULT_ORIGIN, QueryDescriptor};
use crate::scanner::QueryScanner;
use crate::scraper::PageFetcher;
use crate::storage::{HistoryStore, ScrapeHistory};
use chrono::{DateTime, FixedOffset};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Receives the overall completion percentage (0..=100).
pub type ProgressCallback<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// Everything a scrape publishes; owned by the caller between runs.
#[derive(Debug, Clone, Default)]
pub struct ScraperState {
    pub snapshot: Option<ScrapeSnapshot>,
    pub history: ScrapeHistory,
}

impl ScraperState {
    /// Starts with no snapshot and the stored history.
    pub fn load(store: &dyn HistoryStore) -> Self {
        Self {
            snapshot: None,
            history: ScrapeHistory::load_from(store),
        }
    }

    pub fn last_scrape(&self) -> Option<DateTime<FixedOffset>> {
        self.history.last_scrape()
    }
}

/// Result of [`ScrapeOrchestrator::run`].
#[derive(Debug)]
pub struct Published<'s> {
    pub snapshot: &'s ScrapeSnapshot,
    /// Set when the run was published but its history entry could not be
    /// stored; the in-memory history still has it.
    pub history_error: Option<StorageError>,
}

/// A query that failed during a partial run.
#[derive(Debug)]
pub struct QueryFailure {
    pub label: String,
    pub error: ScanError,
}

/// Result of [`ScrapeOrchestrator::run_partial`].
#[derive(Debug)]
pub struct PartialScrape<'s> {
    pub snapshot: &'s ScrapeSnapshot,
    pub failures: Vec<QueryFailure>,
    pub history_error: Option<StorageError>,
}

pub struct ScrapeOrchestrator {
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn Parser>,
    history_store: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    origin: String,
    debug_html_dir: Option<PathBuf>,
    max_concurrency: Option<usize>,
    cancel: CancellationToken,
}

impl ScrapeOrchestrator {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        parser: Arc<dyn Parser>,
        history_store: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            fetcher,
            parser,
            history_store,
            clock: Arc::new(SystemClock),
            origin: DEFAULT_ORIGIN.to_string(),
            debug_html_dir: None,
            max_concurrency: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Clock used for history timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    #[must_use]
    pub fn with_debug_html_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_html_dir = Some(dir.into());
        self
    }

    /// Caps how many queries are scanned at once. Without a cap every query
    /// starts immediately.
    #[must_use]
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    /// Cancelling the token fails every scan that has not finished.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Scrapes every query; publishes only if all of them succeed.
    ///
    /// A history write failure does not fail the run; it is returned in
    /// [`Published::history_error`].
    ///
    /// # Errors
    /// The first failing query (in configuration order) is reported; `state`
    /// is left unchanged.
    pub async fn run<'s>(
        &self,
        state: &'s mut ScraperState,
        queries: &[QueryDescriptor],
        page_limit: u32,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<Published<'s>, ScrapeError> {
        let outcomes = self.scan_all(queries, page_limit, on_progress).await;
        let total_queries = outcomes.len();

        let mut snapshot = ScrapeSnapshot::new();
        let mut first_failure: Option<(String, ScanError)> = None;
        let mut failed_queries = 0;
        for (label, outcome) in outcomes {
            match outcome {
                Ok(listings) => snapshot.insert(label, listings),
                Err(e) => {
                    failed_queries += 1;
                    if first_failure.is_none() {
                        first_failure = Some((label, e));
                    }
                }
            }
        }

        if let Some((label, source)) = first_failure {
            let err = ScrapeError {
                label,
                failed_queries,
                total_queries,
                source,
            };
            error!("Scrape failed, keeping previous snapshot: {}", err);
            return Err(err);
        }

        let (snapshot, history_error) = self.publish(state, snapshot).await;
        Ok(Published {
            snapshot,
            history_error,
        })
    }

    /// Like [`run`](Self::run), but publishes the queries that succeeded and
    /// returns the failed ones alongside. Fails only when every query failed.
    ///
    /// # Errors
    /// Returned when no query succeeded; `state` is left unchanged.
    pub async fn run_partial<'s>(
        &self,
        state: &'s mut ScraperState,
        queries: &[QueryDescriptor],
        page_limit: u32,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<PartialScrape<'s>, ScrapeError> {
        let outcomes = self.scan_all(queries, page_limit, on_progress).await;
        let total_queries = outcomes.len();

        let mut snapshot = ScrapeSnapshot::new();
        let mut failures = Vec::new();
        for (label, outcome) in outcomes {
            match outcome {
                Ok(listings) => snapshot.insert(label, listings),
                Err(error) => {
                    warn!("Query \"{}\" failed, leaving it out: {}", label, error);
                    failures.push(QueryFailure { label, error });
                }
            }
        }

        if total_queries > 0 && failures.len() == total_queries {
            let failed_queries = failures.len();
            let first = failures.remove(0);
            let err = ScrapeError {
                label: first.label,
                failed_queries,
                total_queries,
                source: first.error,
            };
            error!("Every query failed, keeping previous snapshot: {}", err);
            return Err(err);
        }

        let (snapshot, history_error) = self.publish(state, snapshot).await;
        Ok(PartialScrape {
            snapshot,
            failures,
            history_error,
        })
    }

    async fn scan_all(
        &self,
        queries: &[QueryDescriptor],
        page_limit: u32,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Vec<(String, Result<Vec<ListingRecord>, ScanError>)> {
        info!("Scraping {} queries, up to {} page(s) each", queries.len(), page_limit);

        let mut scanner = QueryScanner::new(self.fetcher.clone(), self.parser.clone(), page_limit)
            .with_origin(self.origin.clone());
        if let Some(dir) = &self.debug_html_dir {
            scanner = scanner.with_debug_html_dir(dir.clone());
        }
        let progress = Progress::new(queries.len(), on_progress);

        let tasks = queries.iter().map(|query| {
            let scanner = &scanner;
            let progress = &progress;
            async move {
                progress.started();
                let result = scanner.scan(query, &self.cancel).await;
                progress.finished();
                (query.label(), result)
            }
        });

        let outcomes = match self.max_concurrency {
            None => join_all(tasks).await,
            Some(limit) => stream::iter(tasks).buffered(limit).collect().await,
        };
        progress.complete();
        outcomes
    }

    /// Swaps in the new snapshot and records the run in the history. The
    /// store write runs on the blocking pool.
    async fn publish<'s>(
        &self,
        state: &'s mut ScraperState,
        snapshot: ScrapeSnapshot,
    ) -> (&'s ScrapeSnapshot, Option<StorageError>) {
        let entry = ScrapeHistoryEntry {
            scrape_date: self.clock.now(),
        };
        let store = self.history_store.clone();
        let stored = entry.clone();
        let history_error = match tokio::task::spawn_blocking(move || store.append(&stored)).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(e) => Some(StorageError::Task(e)),
        };
        if let Some(e) = &history_error {
            warn!("Failed to persist scrape history: {}", e);
        }
        info!(
            "Scrape finished at {}: {} queries, {} listings",
            entry.scrape_date.to_rfc3339(),
            snapshot.len(),
            snapshot.total_listings()
        );

        state.history.push(entry);
        (state.snapshot.insert(snapshot), history_error)
    }
}

/// Progress as `(started + finished) * 50 / total`: half the range for
/// starting every query, half for finishing them. Emissions are serialized,
/// so the reported value never decreases.
struct Progress<'a> {
    total: usize,
    counts: Mutex<(usize, usize)>,
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> Progress<'a> {
    fn new(total: usize, callback: Option<ProgressCallback<'a>>) -> Self {
        Self {
            total,
            counts: Mutex::new((0, 0)),
            callback,
        }
    }

    fn started(&self) {
        self.bump(|counts| counts.0 += 1);
    }

    fn finished(&self) {
        self.bump(|counts| counts.1 += 1);
    }

    /// Reports 100 for a run without queries.
    fn complete(&self) {
        if self.total == 0 {
            if let Some(callback) = self.callback {
                callback(100);
            }
        }
    }

    fn bump(&self, update: impl FnOnce(&mut (usize, usize))) {
        let Ok(mut counts) = self.counts.lock() else {
            return;
        };
        update(&mut *counts);
        let percent = ((counts.0 + counts.1) * 50 / self.total.max(1)).min(100) as u8;
        if let Some(callback) = self.callback {
            callback(percent);
        }
    }
}
