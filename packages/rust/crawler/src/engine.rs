//! Sequential filesystem crawler engine.
//!
//! The crawler walks a root directory, keeps the files the classifier accepts,
//! builds a document for each and hands full batches to the index writer. A
//! final flush covers whatever is left once the walk ends.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, trace, warn};
use walkdir::WalkDir;

use trawl_shared::{ConfigSource, CrawlConfig, IndexBackend, Result};

use crate::batch::BatchAccumulator;
use crate::builder::build_document;
use crate::classify::PathClassifier;
use crate::writer::{IndexWriter, RetryPolicy, WriteOutcome};

// ---------------------------------------------------------------------------
// CrawlSummary
// ---------------------------------------------------------------------------

/// Whether the crawler is currently walking a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Running,
}

/// How a crawl ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlStatus {
    /// The whole tree was walked.
    Completed,
    /// The crawl stopped early; buffered documents were still flushed.
    Aborted { reason: String },
    /// Another crawl was already running on this crawler.
    Rejected,
}

/// Summary of a finished crawl.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    /// Root directory that was walked.
    pub root: PathBuf,
    pub status: CrawlStatus,
    /// Regular files encountered.
    pub files_seen: usize,
    /// Files the classifier kept.
    pub files_accepted: usize,
    /// Files skipped because they could not be read.
    pub files_skipped: usize,
    /// Documents built and buffered.
    pub documents_built: usize,
    /// Bulk writes issued.
    pub batches_flushed: usize,
    /// Documents the backend accepted.
    pub documents_written: usize,
    /// Documents the backend rejected individually.
    pub failed_documents: usize,
    /// Documents lost to whole-batch failures.
    pub dropped_documents: usize,
    pub duration: Duration,
}

impl CrawlSummary {
    fn empty(root: &Path, status: CrawlStatus) -> Self {
        Self {
            root: root.to_path_buf(),
            status,
            files_seen: 0,
            files_accepted: 0,
            files_skipped: 0,
            documents_built: 0,
            batches_flushed: 0,
            documents_written: 0,
            failed_documents: 0,
            dropped_documents: 0,
            duration: Duration::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting crawl status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a document has been built and buffered.
    fn file_indexed(&self, path: &str, built: usize);
    /// Called after each bulk write.
    fn batch_flushed(&self, documents: usize, total_written: usize);
    /// Called when the crawl finishes.
    fn done(&self, summary: &CrawlSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn file_indexed(&self, _path: &str, _built: usize) {}
    fn batch_flushed(&self, _documents: usize, _total_written: usize) {}
    fn done(&self, _summary: &CrawlSummary) {}
}

// ---------------------------------------------------------------------------
// CrawlSession
// ---------------------------------------------------------------------------

/// Working state of one crawl. Built fresh per call and never shared.
struct CrawlSession {
    config: CrawlConfig,
    batch: BatchAccumulator,
    summary: CrawlSummary,
}

impl CrawlSession {
    fn new(root: &Path, config: CrawlConfig) -> Self {
        let batch = BatchAccumulator::new(config.batch_size);
        Self {
            config,
            batch,
            summary: CrawlSummary::empty(root, CrawlStatus::Completed),
        }
    }

    fn record(&mut self, outcome: &WriteOutcome) {
        if !matches!(outcome, WriteOutcome::Empty) {
            self.summary.batches_flushed += 1;
        }
        self.summary.documents_written += outcome.written();
        self.summary.failed_documents += outcome.failed();
        self.summary.dropped_documents += outcome.dropped();
    }
}

/// Marks the crawler as running until dropped.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Walks source trees and indexes their files into a search backend.
pub struct Crawler {
    backend: Arc<dyn IndexBackend>,
    config_source: Arc<dyn ConfigSource>,
    writer: IndexWriter,
    running: AtomicBool,
}

impl Crawler {
    /// Create a crawler with the default retry policy.
    pub fn new(backend: Arc<dyn IndexBackend>, config_source: Arc<dyn ConfigSource>) -> Self {
        let writer = IndexWriter::new(backend.clone(), RetryPolicy::default());
        Self {
            backend,
            config_source,
            writer,
            running: AtomicBool::new(false),
        }
    }

    /// Replace the policy applied while the backend is unavailable.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.writer = IndexWriter::new(self.backend.clone(), retry);
        self
    }

    pub fn state(&self) -> CrawlState {
        if self.running.load(Ordering::Acquire) {
            CrawlState::Running
        } else {
            CrawlState::Idle
        }
    }

    /// Crawl `root` and index every accepted file.
    ///
    /// Never fails: per-file and per-batch problems are logged and counted in
    /// the returned summary. Only one crawl runs at a time per crawler.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub async fn crawl(&self, root: &Path, progress: &dyn ProgressReporter) -> CrawlSummary {
        let start_time = Instant::now();

        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            warn!("a crawl is already running on this crawler, rejecting");
            return CrawlSummary::empty(root, CrawlStatus::Rejected);
        };

        progress.phase("Loading configuration");
        let config = match self.config_source.crawl_config() {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "failed to load crawl configuration");
                let mut summary = CrawlSummary::empty(
                    root,
                    CrawlStatus::Aborted {
                        reason: e.to_string(),
                    },
                );
                summary.duration = start_time.elapsed();
                progress.done(&summary);
                return summary;
            }
        };

        debug!(directories = ?config.directories_to_exclude, "exclude directories");
        debug!(files = ?config.files_to_exclude, "exclude files");
        debug!(files = ?config.files_to_include, "include files");
        debug!(extensions = ?config.extensions_to_exclude, "exclude extensions");
        debug!(extensions = ?config.extensions_to_read, "readable extensions");

        info!(
            batch_size = config.batch_size,
            max_content_bytes = config.max_content_bytes,
            backend = self.backend.name(),
            "starting crawl"
        );

        let mut session = CrawlSession::new(root, config);

        progress.phase("Crawling files");
        let status = self.walk(root, &mut session, progress).await;
        session.summary.status = status;

        progress.phase("Flushing remaining documents");
        self.flush(&mut session, progress).await;

        let mut summary = session.summary;
        summary.duration = start_time.elapsed();

        if summary.failed_documents > 0 {
            error!(
                failed = summary.failed_documents,
                "files with indexing errors"
            );
        }

        info!(
            files_seen = summary.files_seen,
            files_accepted = summary.files_accepted,
            files_skipped = summary.files_skipped,
            documents_written = summary.documents_written,
            failed = summary.failed_documents,
            dropped = summary.dropped_documents,
            batches = summary.batches_flushed,
            duration_ms = summary.duration.as_millis(),
            "crawl finished"
        );

        progress.done(&summary);
        summary
    }

    /// Drop and recreate the backend index.
    #[instrument(skip_all, fields(backend = self.backend.name()))]
    pub async fn clear_index(&self) -> Result<()> {
        match self.backend.reset().await {
            Ok(()) => {
                info!("index cleared");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to clear index");
                Err(e.into())
            }
        }
    }

    /// Walk the tree; an enumeration error ends the walk.
    async fn walk(
        &self,
        root: &Path,
        session: &mut CrawlSession,
        progress: &dyn ProgressReporter,
    ) -> CrawlStatus {
        let root = match std::path::absolute(root) {
            Ok(root) => root,
            Err(e) => {
                error!(error = %e, "cannot resolve crawl root, aborting crawl");
                return CrawlStatus::Aborted {
                    reason: e.to_string(),
                };
            }
        };

        for entry in WalkDir::new(&root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    error!(error = %e, "failed to enumerate files, aborting crawl");
                    return CrawlStatus::Aborted {
                        reason: e.to_string(),
                    };
                }
            };

            // Follows symlinks for the file test; the walk itself does not.
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            session.summary.files_seen += 1;

            if !PathClassifier::new(&session.config).accepts(path) {
                trace!(path = %path.display(), "excluded");
                continue;
            }
            session.summary.files_accepted += 1;

            self.add_file(path, session, progress).await;
        }

        CrawlStatus::Completed
    }

    /// Flush a full batch if due, then build and buffer one file.
    async fn add_file(
        &self,
        path: &Path,
        session: &mut CrawlSession,
        progress: &dyn ProgressReporter,
    ) {
        trace!(path = %path.display(), "parsing file");

        if session.batch.should_flush() {
            self.flush(session, progress).await;
        }

        match build_document(path, &session.config).await {
            Ok(document) => {
                session.summary.documents_built += 1;
                progress.file_indexed(&document.path, session.summary.documents_built);
                session.batch.add(document);
            }
            Err(e) => {
                session.summary.files_skipped += 1;
                warn!(path = %path.display(), error = %e, "failed to read file, skipping");
            }
        }
    }

    /// Write and clear the buffered batch.
    async fn flush(&self, session: &mut CrawlSession, progress: &dyn ProgressReporter) {
        let batch = session.batch.take();
        if batch.is_empty() {
            return;
        }

        debug!(
            documents = batch.len(),
            threshold = session.batch.threshold(),
            "flushing batch"
        );
        let outcome = self.writer.write(&batch).await;
        session.record(&outcome);
        progress.batch_flushed(batch.len(), session.summary.documents_written);
    }
}
