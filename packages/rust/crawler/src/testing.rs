//! Test doubles shared by the writer and engine tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use trawl_shared::{
    BackendError, BulkSaveReport, DocumentRecord, FailedDocument, IndexBackend, new_document_id,
};

/// A name-only document at `path`.
pub(crate) fn document(path: &str) -> DocumentRecord {
    DocumentRecord {
        id: new_document_id(),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        extension: String::new(),
        path: path.to_string(),
        content: None,
        project: None,
        version: "trunk".into(),
        size: 0,
        created_at: Utc::now(),
        last_modified: Utc::now(),
    }
}

/// What the next `bulk_save` call should do.
#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    /// Reject the first `n` documents of the batch.
    RejectFirst(usize),
    Unavailable,
    Exhausted,
}

/// Records every bulk save and replays scripted failures in order.
/// Calls beyond the script succeed.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<Vec<DocumentRecord>>>,
    resets: AtomicUsize,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_script(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Batch sizes of every bulk save, in call order.
    pub(crate) fn call_sizes(&self) -> Vec<usize> {
        self.calls.lock().unwrap().iter().map(Vec::len).collect()
    }

    /// Every document the backend was handed, across all calls.
    pub(crate) fn saved_paths(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|d| d.path.clone())
            .collect()
    }

    pub(crate) fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn bulk_save(
        &self,
        documents: &[DocumentRecord],
    ) -> Result<BulkSaveReport, BackendError> {
        self.calls.lock().unwrap().push(documents.to_vec());
        let next = self.script.lock().unwrap().pop_front();

        match next {
            None => Ok(BulkSaveReport::all_succeeded(documents.len())),
            Some(Scripted::RejectFirst(n)) => {
                let failed: Vec<FailedDocument> = documents
                    .iter()
                    .take(n)
                    .map(|d| FailedDocument {
                        id: d.id.clone(),
                        reason: "mapper_parsing_exception".into(),
                    })
                    .collect();
                Ok(BulkSaveReport {
                    succeeded: documents.len() - failed.len(),
                    failed,
                })
            }
            Some(Scripted::Unavailable) => {
                Err(BackendError::Unavailable("connection refused".into()))
            }
            Some(Scripted::Exhausted) => {
                Err(BackendError::ResourceExhausted("out of memory".into()))
            }
        }
    }

    async fn reset(&self) -> Result<(), BackendError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
