//! The search backend seam.
//!
//! The crawler only needs two capabilities from a search backend: bulk-saving
//! a batch of documents with per-document failure detail, and resetting the
//! index. Schema, mapping and query concerns stay behind this trait.

use async_trait::async_trait;

use crate::error::BackendError;
use crate::types::{BulkSaveReport, DocumentRecord};

/// A search backend that documents are bulk-written to.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Save every document in `documents` in one request.
    ///
    /// Documents the backend rejects individually are listed in the returned
    /// report by identifier. An `Err` means the batch as a whole was not taken.
    async fn bulk_save(
        &self,
        documents: &[DocumentRecord],
    ) -> std::result::Result<BulkSaveReport, BackendError>;

    /// Drop the index, recreate it, reapply its schema and refresh it.
    async fn reset(&self) -> std::result::Result<(), BackendError>;
}
