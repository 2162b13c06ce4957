//! Bulk writes to the search backend, with failure isolation and backoff.
//!
//! A batch write never fails the crawl. Whatever the backend does, the writer
//! returns a [`WriteOutcome`] and the batch is considered consumed:
//! - rejected documents are logged with their reason and counted, not retried
//! - resource exhaustion drops the whole batch after logging its paths
//! - an unavailable backend is retried under the [`RetryPolicy`], then dropped

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, instrument, warn};

use trawl_shared::{BackendError, BulkSaveReport, DocumentRecord, IndexBackend, RetrySettings};

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// How long to wait, and how often to retry, while the backend is unavailable.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per batch, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Growth factor applied per retry; 1.0 keeps the delay fixed.
    pub multiplier: f64,
    /// Cap on any single delay.
    pub max_backoff: Duration,
    /// Scale each delay by a random factor in `[0.5, 1.0]`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: Duration::from_millis(settings.backoff_ms),
            multiplier: settings.backoff_multiplier,
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            jitter: settings.jitter,
        }
    }
}

impl RetryPolicy {
    /// One attempt, no waiting.
    pub fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// `max_attempts` attempts separated by a constant `delay`.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: delay,
            multiplier: 1.0,
            max_backoff: delay,
            jitter: false,
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let cap = self.max_backoff.as_millis() as f64;
        let factor = self.multiplier.max(0.0).powi(retry.min(i32::MAX as u32) as i32);
        // f64::min drops NaN, so a degenerate product falls back to the cap.
        let millis = (self.initial_backoff.as_millis() as f64 * factor).min(cap);

        let delay = Duration::from_millis(millis.round() as u64);
        if self.jitter {
            delay.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
        } else {
            delay
        }
    }
}

// ---------------------------------------------------------------------------
// WriteOutcome
// ---------------------------------------------------------------------------

/// A document the backend rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedWrite {
    pub id: String,
    /// Path of the matching record, when the backend reported a known id.
    pub path: Option<String>,
    pub reason: String,
}

/// Result of writing one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Nothing to write.
    Empty,
    /// Every document was accepted.
    Written { count: usize },
    /// Some documents were rejected; the rest were accepted.
    PartialFailure {
        written: usize,
        failed: Vec<FailedWrite>,
    },
    /// The write path ran out of resources; the batch was dropped.
    ResourceExhausted { paths: Vec<String> },
    /// The backend stayed unavailable for every attempt; the batch was dropped.
    Unavailable { attempts: u32, dropped: usize },
}

impl WriteOutcome {
    /// Documents the backend accepted.
    pub fn written(&self) -> usize {
        match self {
            Self::Written { count } => *count,
            Self::PartialFailure { written, .. } => *written,
            _ => 0,
        }
    }

    /// Documents the backend individually rejected.
    pub fn failed(&self) -> usize {
        match self {
            Self::PartialFailure { failed, .. } => failed.len(),
            _ => 0,
        }
    }

    /// Documents lost with a whole-batch failure.
    pub fn dropped(&self) -> usize {
        match self {
            Self::ResourceExhausted { paths } => paths.len(),
            Self::Unavailable { dropped, .. } => *dropped,
            _ => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// IndexWriter
// ---------------------------------------------------------------------------

/// Writes batches to an [`IndexBackend`].
pub struct IndexWriter {
    backend: Arc<dyn IndexBackend>,
    retry: RetryPolicy,
}

impl IndexWriter {
    pub fn new(backend: Arc<dyn IndexBackend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    /// Bulk-save `batch`, applying the failure policy.
    #[instrument(skip_all, fields(backend = self.backend.name(), documents = batch.len()))]
    pub async fn write(&self, batch: &[DocumentRecord]) -> WriteOutcome {
        if batch.is_empty() {
            return WriteOutcome::Empty;
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.backend.bulk_save(batch).await {
                Ok(report) if !report.has_failures() => {
                    debug!(attempt, "batch indexed");
                    return WriteOutcome::Written { count: batch.len() };
                }
                Ok(report) => return partial_failure(batch, report),
                Err(BackendError::ResourceExhausted(reason)) => {
                    let paths = batch_paths(batch);
                    error!(
                        %reason,
                        files = %paths.join(","),
                        "resources exhausted while indexing one of the following files"
                    );
                    return WriteOutcome::ResourceExhausted { paths };
                }
                Err(BackendError::Unavailable(reason)) => {
                    let delay = self.retry.delay_for(attempt - 1);
                    if attempt >= max_attempts {
                        // The crawl still waits out the backoff before moving on.
                        tokio::time::sleep(delay).await;
                        error!(
                            attempts = attempt,
                            %reason,
                            files = %batch_paths(batch).join(","),
                            "backend still unavailable, dropping batch"
                        );
                        return WriteOutcome::Unavailable {
                            attempts: attempt,
                            dropped: batch.len(),
                        };
                    }

                    warn!(
                        attempt,
                        max_attempts,
                        %reason,
                        delay_ms = delay.as_millis() as u64,
                        "backend unavailable, waiting before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn partial_failure(batch: &[DocumentRecord], report: BulkSaveReport) -> WriteOutcome {
    let by_id: HashMap<&str, &DocumentRecord> =
        batch.iter().map(|d| (d.id.as_str(), d)).collect();

    let failed: Vec<FailedWrite> = report
        .failed
        .into_iter()
        .map(|f| {
            let path = by_id.get(f.id.as_str()).map(|d| d.path.clone());
            match &path {
                Some(path) => error!(%path, reason = %f.reason, "failed to index file"),
                None => error!(id = %f.id, reason = %f.reason, "backend rejected an unknown document id"),
            }
            FailedWrite {
                id: f.id,
                path,
                reason: f.reason,
            }
        })
        .collect();

    WriteOutcome::PartialFailure {
        written: report.succeeded,
        failed,
    }
}

fn batch_paths(batch: &[DocumentRecord]) -> Vec<String> {
    batch.iter().map(|d| d.path.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Scripted, ScriptedBackend, document};

    fn batch(n: usize) -> Vec<DocumentRecord> {
        (0..n).map(|i| document(&format!("/repo/f{i}.txt"))).collect()
    }

    #[tokio::test]
    async fn empty_batch_skips_backend() {
        let backend = Arc::new(ScriptedBackend::new());
        let writer = IndexWriter::new(backend.clone(), RetryPolicy::none());
        assert_eq!(writer.write(&[]).await, WriteOutcome::Empty);
        assert!(backend.call_sizes().is_empty());
    }

    #[tokio::test]
    async fn success_writes_everything() {
        let backend = Arc::new(ScriptedBackend::new());
        let writer = IndexWriter::new(backend.clone(), RetryPolicy::none());
        let outcome = writer.write(&batch(4)).await;
        assert_eq!(outcome, WriteOutcome::Written { count: 4 });
        assert_eq!(backend.call_sizes(), vec![4]);
    }

    #[tokio::test]
    async fn partial_failure_returns_failed_paths_without_retry() {
        let backend = Arc::new(ScriptedBackend::with_script([Scripted::RejectFirst(3)]));
        let writer = IndexWriter::new(backend.clone(), RetryPolicy::fixed(3, Duration::ZERO));
        let docs = batch(100);

        let outcome = writer.write(&docs).await;
        assert_eq!(outcome.failed(), 3);
        assert_eq!(outcome.written(), 97);
        assert_eq!(backend.call_sizes(), vec![100]);

        let WriteOutcome::PartialFailure { failed, .. } = outcome else {
            panic!("expected partial failure");
        };
        let paths: Vec<_> = failed.iter().filter_map(|f| f.path.as_deref()).collect();
        assert_eq!(paths, vec!["/repo/f0.txt", "/repo/f1.txt", "/repo/f2.txt"]);
        assert!(failed.iter().all(|f| f.reason == "mapper_parsing_exception"));
    }

    #[tokio::test]
    async fn exhaustion_drops_batch_without_retry() {
        let backend = Arc::new(ScriptedBackend::with_script([Scripted::Exhausted]));
        let writer = IndexWriter::new(backend.clone(), RetryPolicy::fixed(3, Duration::ZERO));

        let outcome = writer.write(&batch(2)).await;
        assert_eq!(
            outcome,
            WriteOutcome::ResourceExhausted {
                paths: vec!["/repo/f0.txt".into(), "/repo/f1.txt".into()]
            }
        );
        assert_eq!(outcome.dropped(), 2);
        assert_eq!(backend.call_sizes(), vec![2]);
    }

    #[tokio::test]
    async fn unavailable_retries_then_succeeds() {
        let backend = Arc::new(ScriptedBackend::with_script([
            Scripted::Unavailable,
            Scripted::Unavailable,
        ]));
        let writer = IndexWriter::new(backend.clone(), RetryPolicy::fixed(3, Duration::ZERO));

        let outcome = writer.write(&batch(5)).await;
        assert_eq!(outcome, WriteOutcome::Written { count: 5 });
        assert_eq!(backend.call_sizes(), vec![5, 5, 5]);
    }

    #[tokio::test]
    async fn unavailable_past_limit_drops_batch() {
        let backend = Arc::new(ScriptedBackend::with_script([
            Scripted::Unavailable,
            Scripted::Unavailable,
        ]));
        let writer = IndexWriter::new(backend.clone(), RetryPolicy::fixed(2, Duration::ZERO));

        let outcome = writer.write(&batch(5)).await;
        assert_eq!(
            outcome,
            WriteOutcome::Unavailable {
                attempts: 2,
                dropped: 5
            }
        );
        assert_eq!(backend.call_sizes(), vec![5, 5]);
    }

    #[tokio::test]
    async fn dropping_unavailable_batch_still_waits_out_backoff() {
        let backend = Arc::new(ScriptedBackend::with_script([Scripted::Unavailable]));
        let delay = Duration::from_millis(50);
        let writer = IndexWriter::new(backend.clone(), RetryPolicy::fixed(1, delay));

        let started = std::time::Instant::now();
        let outcome = writer.write(&batch(2)).await;

        assert_eq!(
            outcome,
            WriteOutcome::Unavailable {
                attempts: 1,
                dropped: 2
            }
        );
        assert!(started.elapsed() >= delay);
        assert_eq!(backend.call_sizes(), vec![2]);
    }

    #[tokio::test]
    async fn no_retry_policy_never_waits() {
        let backend = Arc::new(ScriptedBackend::with_script([Scripted::Unavailable]));
        let writer = IndexWriter::new(backend.clone(), RetryPolicy::none());

        let outcome = writer.write(&batch(1)).await;
        assert_eq!(outcome.dropped(), 1);
        assert_eq!(RetryPolicy::none().delay_for(0), Duration::ZERO);
    }

    #[test]
    fn default_policy_waits_ten_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(0), Duration::from_secs(10));
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            multiplier: 2.0,
            max_backoff: Duration::from_millis(500),
            jitter: false,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1000), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_within_half_to_full_delay() {
        let policy = RetryPolicy {
            jitter: true,
            ..RetryPolicy::fixed(3, Duration::from_secs(2))
        };
        for _ in 0..50 {
            let delay = policy.delay_for(0);
            assert!(delay >= Duration::from_secs(1));
            assert!(delay <= Duration::from_secs(2));
        }
    }

    #[test]
    fn policy_from_settings() {
        let settings = RetrySettings {
            max_attempts: 0,
            backoff_ms: 250,
            backoff_multiplier: 1.5,
            max_backoff_ms: 1_000,
            jitter: true,
        };
        let policy = RetryPolicy::from(&settings);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.initial_backoff, Duration::from_millis(250));
        assert!(policy.jitter);
    }
}
