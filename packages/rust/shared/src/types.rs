//! Core domain types for indexed documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version label used when a path carries no branch marker.
pub const DEFAULT_VERSION: &str = "trunk";

// ---------------------------------------------------------------------------
// DocumentRecord
// ---------------------------------------------------------------------------

/// One file, as submitted to the search backend.
///
/// `content` is `Some` only when the file had a readable extension and fit
/// under the configured size ceiling; every other field is always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Opaque unique identifier (random UUID v4, fresh per build).
    pub id: String,
    /// File name without its extension.
    pub name: String,
    /// Lower-cased extension, possibly empty.
    pub extension: String,
    /// Full path of the file; the natural external key.
    pub path: String,
    /// Decoded file text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Directory enclosing the trunk/branches marker, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Branch name, or [`DEFAULT_VERSION`].
    pub version: String,
    /// File size in bytes.
    pub size: u64,
    /// Creation time reported by the filesystem.
    pub created_at: DateTime<Utc>,
    /// Last modification time reported by the filesystem.
    pub last_modified: DateTime<Utc>,
}

/// Generate a new random document identifier.
pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------------
// Bulk save report
// ---------------------------------------------------------------------------

/// A document the backend refused, keyed by its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDocument {
    /// Identifier of the rejected [`DocumentRecord`].
    pub id: String,
    /// Backend-reported reason.
    pub reason: String,
}

/// Per-document result of one bulk save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSaveReport {
    /// Number of documents the backend accepted.
    pub succeeded: usize,
    /// Documents the backend rejected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FailedDocument>,
}

impl BulkSaveReport {
    /// A report where every document was accepted.
    pub fn all_succeeded(count: usize) -> Self {
        Self {
            succeeded: count,
            failed: Vec::new(),
        }
    }

    /// Whether any document was rejected.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
