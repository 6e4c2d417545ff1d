//! Collection import pipeline
//!
//! An import walks the expected entry numbers of a collection, skips the ones
//! already stored, fetches the rest through a bounded worker pool, normalizes
//! and categorizes each payload, and hands the results to a single
//! [`BatchWriter`]. Per-entry failures are counted and logged; only storage
//! failures or an unknown collection abort the run.

pub mod plan;

pub use plan::{plan_books, BookWork, PLACEHOLDER_BOOK_NAME, PLACEHOLDER_BOOK_NUMBER};

use crate::categorize::Categorizer;
use crate::config::ImportConfig;
use crate::error::{Error, Result};
use crate::meta::{BatchWriter, Collection, MetaDb, RunStatus, WriteReport};
use crate::normalize::{CanonicalEntry, EntryContext, Normalizer};
use crate::progress::ImportProgress;
use crate::source::{BookListing, CorpusSource, FetchOutcome};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Log a progress line every this many processed entries
const PROGRESS_LOG_INTERVAL: usize = 100;

/// Cap on error messages kept per run
const MAX_RECORDED_ERRORS: usize = 100;

/// Where an import currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Idle,
    Enumerating,
    FetchingBook(u32),
    Draining,
    Completed,
    Aborted,
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportPhase::Idle => write!(f, "idle"),
            ImportPhase::Enumerating => write!(f, "enumerating"),
            ImportPhase::FetchingBook(n) => write!(f, "fetching book {}", n),
            ImportPhase::Draining => write!(f, "draining"),
            ImportPhase::Completed => write!(f, "completed"),
            ImportPhase::Aborted => write!(f, "aborted"),
        }
    }
}

/// Import options
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Fetch at most this many pending entries
    pub limit: Option<usize>,
    /// Delete the collection's stored entries before importing
    pub clear_first: bool,
}

/// Import statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    /// Entries newly stored
    pub imported: usize,
    /// Entries already stored, whether known before the run or found at write time
    pub skipped: usize,
    /// Entries that could not be fetched, normalized or stored
    pub failed: usize,
    /// Subset of `failed` whose payload was rejected by the normalizer
    pub rejected: usize,
    /// Numbers the upstream reported as absent
    pub missing: usize,
    pub total_processed: usize,
    pub errors: Vec<String>,
}

impl ImportStats {
    fn record_checkpoint(&mut self, count: usize) {
        self.skipped += count;
        self.total_processed += count;
    }

    fn record_write(&mut self, report: &WriteReport) {
        self.imported += report.inserted.len();
        self.skipped += report.ignored.len();
        self.failed += report.failed.len();
        self.total_processed += report.inserted.len() + report.ignored.len() + report.failed.len();
        for failure in &report.failed {
            self.push_error(format!("#{}: {}", failure.entry_number, failure.reason));
        }
    }

    fn record_missing(&mut self) {
        self.missing += 1;
        self.total_processed += 1;
    }

    fn record_failure(&mut self, number: u32, err: &Error) {
        self.failed += 1;
        if matches!(err, Error::Rejected(_)) {
            self.rejected += 1;
        }
        self.total_processed += 1;
        self.push_error(format!("#{}: {}", number, err));
    }

    fn push_error(&mut self, message: String) {
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(message);
        }
    }
}

/// Result of importing one collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub collection: String,
    pub run_id: String,
    pub status: RunStatus,
    /// The run stopped early on cancellation or deadline
    pub interrupted: bool,
    pub stats: ImportStats,
}

enum EntryOutcome {
    Ready(Box<CanonicalEntry>),
    Missing(u32),
    Failed(u32, Error),
    Cancelled,
}

/// Aborts the deadline timer when the run ends, however it ends
struct DeadlineGuard(Option<JoinHandle<()>>);

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

/// Drives the import of collections from a [`CorpusSource`] into the store
pub struct ImportOrchestrator {
    db: MetaDb,
    source: Arc<dyn CorpusSource>,
    normalizer: Normalizer,
    categorizer: Categorizer,
    config: ImportConfig,
    cancel: CancellationToken,
    phase: ImportPhase,
    show_progress: bool,
}

impl ImportOrchestrator {
    pub fn new(
        db: MetaDb,
        source: Arc<dyn CorpusSource>,
        normalizer: Normalizer,
        categorizer: Categorizer,
        config: ImportConfig,
    ) -> Self {
        Self {
            db,
            source,
            normalizer,
            categorizer,
            config,
            cancel: CancellationToken::new(),
            phase: ImportPhase::Idle,
            show_progress: false,
        }
    }

    /// Stop dispatching new fetches once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress(mut self, visible: bool) -> Self {
        self.show_progress = visible;
        self
    }

    pub fn phase(&self) -> ImportPhase {
        self.phase
    }

    fn transition(&mut self, next: ImportPhase) {
        debug!(from = %self.phase, to = %next, "Import phase");
        self.phase = next;
    }

    /// Import one collection by key
    pub async fn run(&mut self, collection_key: &str, options: &ImportOptions) -> Result<ImportReport> {
        self.phase = ImportPhase::Idle;
        let mut run_id = None;
        let mut stats = ImportStats::default();

        let result = self.execute(collection_key, options, &mut run_id, &mut stats).await;

        if let Err(e) = &result {
            self.transition(ImportPhase::Aborted);
            error!(collection = collection_key, error = %e, "Import aborted");
            if let Some(id) = run_id {
                // Keep the counts of what was committed before the abort
                stats.push_error(e.to_string());
                if let Err(close_err) = self.db.complete_import_run(&id, RunStatus::Failed, &stats).await {
                    warn!(run_id = %id, error = %close_err, "Could not record failed run");
                }
            }
        }

        result
    }

    async fn execute(
        &mut self,
        collection_key: &str,
        options: &ImportOptions,
        run_id: &mut Option<String>,
        stats: &mut ImportStats,
    ) -> Result<ImportReport> {
        self.transition(ImportPhase::Enumerating);

        let collection = self
            .db
            .get_collection(collection_key)
            .await?
            .ok_or_else(|| Error::CollectionNotFound(collection_key.to_string()))?;

        if options.clear_first {
            let removed = self.db.clear_collection(collection.id).await?;
            info!(collection = collection_key, removed, "Cleared stored entries");
        }

        let run = self.db.start_import_run(collection.id).await?;
        *run_id = Some(run.id.clone());

        let existing = self.db.imported_entry_numbers(collection.id).await?;
        let expected = u32::try_from(collection.total_expected_entries).unwrap_or(0);

        let mut pending: Vec<u32> = Vec::new();
        for number in 1..=expected {
            if existing.contains(&number) {
                stats.record_checkpoint(1);
            } else {
                pending.push(number);
            }
        }
        if let Some(limit) = options.limit {
            pending.truncate(limit);
        }

        info!(
            collection = collection_key,
            expected,
            already_stored = stats.skipped,
            pending = pending.len(),
            "Starting import"
        );

        let plan = if pending.is_empty() {
            Vec::new()
        } else {
            let listing = self.book_listing(&collection).await;
            plan_books(&pending, listing.as_deref())
        };

        let cancel = self.cancel.child_token();
        let _deadline = self.arm_deadline(&cancel);
        let progress = ImportProgress::new(collection_key, pending.len() as u64, self.show_progress);
        let mut writer = BatchWriter::new(
            self.db.clone(),
            self.config.batch_size,
            self.config.retry_batch_size,
        );

        let mut interrupted = false;
        for work in &plan {
            if cancel.is_cancelled() {
                interrupted = true;
                break;
            }
            self.transition(ImportPhase::FetchingBook(work.book_number));
            let dropped = self
                .fetch_book(&collection, work, &cancel, &mut writer, stats, &progress)
                .await?;
            interrupted |= dropped > 0;
        }

        self.transition(ImportPhase::Draining);
        let report = writer.flush().await?;
        stats.record_write(&report);
        self.db.refresh_counts(collection.id).await?;

        let status = if interrupted || stats.failed > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Completed
        };
        self.db.complete_import_run(&run.id, status, stats).await?;
        progress.finish(&status.to_string());
        self.transition(ImportPhase::Completed);

        info!(
            collection = collection_key,
            %status,
            imported = stats.imported,
            skipped = stats.skipped,
            failed = stats.failed,
            missing = stats.missing,
            total_processed = stats.total_processed,
            "Import finished"
        );

        Ok(ImportReport {
            collection: collection_key.to_string(),
            run_id: run.id,
            status,
            interrupted,
            stats: std::mem::take(stats),
        })
    }

    fn arm_deadline(&self, cancel: &CancellationToken) -> DeadlineGuard {
        let Some(secs) = self.config.deadline_secs else {
            return DeadlineGuard(None);
        };
        let token = cancel.clone();
        DeadlineGuard(Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!(deadline_secs = secs, "Import deadline reached, stopping new fetches");
            token.cancel();
        })))
    }

    async fn book_listing(&self, collection: &Collection) -> Option<Vec<BookListing>> {
        if !self.config.use_book_listing {
            return None;
        }
        match self.source.list_books(&collection.api_name).await {
            Ok(books) if !books.is_empty() => Some(books),
            Ok(_) => {
                warn!(collection = %collection.collection_key, "Empty book listing, importing as one range");
                None
            }
            Err(e) => {
                warn!(
                    collection = %collection.collection_key,
                    error = %e,
                    "Book listing unavailable, importing as one range"
                );
                None
            }
        }
    }

    /// Fetch one book's entries; returns how many were dropped by cancellation
    async fn fetch_book(
        &self,
        collection: &Collection,
        work: &BookWork,
        cancel: &CancellationToken,
        writer: &mut BatchWriter,
        stats: &mut ImportStats,
        progress: &ImportProgress,
    ) -> Result<usize> {
        debug!(
            collection = %collection.collection_key,
            book = work.book_number,
            entries = work.numbers.len(),
            "Fetching book"
        );

        let ctx = EntryContext {
            collection_id: collection.id,
            display_name: &collection.display_name,
            book_number: work.book_number,
            book_name: &work.name,
            requested_number: 0,
        };

        let outcomes = stream::iter(work.numbers.iter().copied())
            .map(|number| {
                let ctx = EntryContext {
                    requested_number: number,
                    ..ctx
                };
                self.process_entry(&collection.api_name, ctx, cancel)
            })
            .buffer_unordered(self.config.workers.max(1));
        let mut outcomes = std::pin::pin!(outcomes);

        let mut dropped = 0;
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                EntryOutcome::Ready(entry) => {
                    if let Some(report) = writer.push(*entry).await? {
                        stats.record_write(&report);
                    }
                }
                EntryOutcome::Missing(number) => {
                    debug!(collection = %collection.collection_key, entry_number = number, "Entry not found upstream");
                    stats.record_missing();
                }
                EntryOutcome::Failed(number, err) => {
                    warn!(
                        collection = %collection.collection_key,
                        entry_number = number,
                        error = %err,
                        "Entry failed"
                    );
                    stats.record_failure(number, &err);
                }
                EntryOutcome::Cancelled => {
                    dropped += 1;
                    continue;
                }
            }

            let handled = progress.advance(&work.name);
            if handled % PROGRESS_LOG_INTERVAL == 0 {
                info!(
                    collection = %collection.collection_key,
                    processed = handled,
                    imported = stats.imported,
                    failed = stats.failed,
                    "Import progress"
                );
            }
        }

        Ok(dropped)
    }

    async fn process_entry(
        &self,
        api_name: &str,
        ctx: EntryContext<'_>,
        cancel: &CancellationToken,
    ) -> EntryOutcome {
        let number = ctx.requested_number;
        if cancel.is_cancelled() {
            return EntryOutcome::Cancelled;
        }

        let payload = match self.source.fetch_entry(api_name, number).await {
            Ok(FetchOutcome::Found(payload)) => payload,
            Ok(FetchOutcome::NotFound) => return EntryOutcome::Missing(number),
            Err(e) => return EntryOutcome::Failed(number, e),
        };

        let mut entry = match self.normalizer.normalize(&payload, &ctx) {
            Ok(entry) => entry,
            Err(e) => return EntryOutcome::Failed(number, e),
        };
        entry.categories = self
            .categorizer
            .categorize(entry.secondary_text.as_deref().unwrap_or_default(), &entry.book_name);

        EntryOutcome::Ready(Box::new(entry))
    }
}
