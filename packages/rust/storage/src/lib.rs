//! Embedded libSQL search index.
//!
//! The [`Storage`] struct wraps a libSQL database holding one row per indexed
//! file plus an FTS5 table over names, paths, content and projects. It is the
//! [`IndexBackend`] the crawler writes to.
//!
//! **Access rules:**
//! - crawls and resets: read-write via [`Storage::open`]
//! - search and stats: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use tracing::{debug, instrument};

use trawl_shared::{
    BackendError, BulkSaveReport, DocumentRecord, FailedDocument, IndexBackend, Result, TrawlError,
};

const UPSERT_DOCUMENT: &str = "INSERT INTO documents
     (id, path, name, extension, content, project, version, size, created_at, last_modified, indexed_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
     ON CONFLICT(path) DO UPDATE SET
       id = excluded.id,
       name = excluded.name,
       extension = excluded.extension,
       content = excluded.content,
       project = excluded.project,
       version = excluded.version,
       size = excluded.size,
       created_at = excluded.created_at,
       last_modified = excluded.last_modified,
       indexed_at = excluded.indexed_at";

const DOCUMENT_COLUMNS: &str =
    "id, name, extension, path, content, project, version, size, created_at, last_modified";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TrawlError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| TrawlError::Storage(e.to_string()))?;

        let conn = db.connect().map_err(|e| TrawlError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TrawlError::Storage(format!(
                "no index database at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| TrawlError::Storage(e.to_string()))?;

        let conn = db.connect().map_err(|e| TrawlError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    TrawlError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(TrawlError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Document writes
    // -----------------------------------------------------------------------

    /// Upsert a batch of documents in one transaction.
    ///
    /// A row the database refuses is reported by id and the rest of the batch
    /// is still committed. Failures that take down the whole write surface as
    /// [`BackendError`].
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn save_documents(
        &self,
        documents: &[DocumentRecord],
    ) -> std::result::Result<BulkSaveReport, BackendError> {
        if self.readonly {
            return Err(BackendError::Unavailable(
                "database is opened in read-only mode".into(),
            ));
        }

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| batch_error(&e.to_string()))?;

        let indexed_at = Utc::now().to_rfc3339();
        let mut report = BulkSaveReport::default();

        for doc in documents {
            let result = tx
                .execute(
                    UPSERT_DOCUMENT,
                    params![
                        doc.id.as_str(),
                        doc.path.as_str(),
                        doc.name.as_str(),
                        doc.extension.as_str(),
                        doc.content.as_deref(),
                        doc.project.as_deref(),
                        doc.version.as_str(),
                        doc.size as i64,
                        doc.created_at.to_rfc3339(),
                        doc.last_modified.to_rfc3339(),
                        indexed_at.as_str(),
                    ],
                )
                .await;

            match result {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    let message = e.to_string();
                    match classify_error(&message) {
                        ErrorScope::Document => report.failed.push(FailedDocument {
                            id: doc.id.clone(),
                            reason: message,
                        }),
                        scope => {
                            let _ = tx.rollback().await;
                            return Err(scope.into_backend_error(message));
                        }
                    }
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| batch_error(&e.to_string()))?;

        debug!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            "documents saved"
        );
        Ok(report)
    }

    /// Drop every index table and rebuild the schema from scratch.
    #[instrument(skip_all)]
    pub async fn reset_index(&self) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute_batch(migrations::DROP_ALL)
            .await
            .map_err(|e| TrawlError::Storage(format!("failed to drop index: {e}")))?;
        self.run_migrations().await
    }

    // -----------------------------------------------------------------------
    // Document queries
    // -----------------------------------------------------------------------

    /// Number of indexed documents.
    pub async fn count_documents(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM documents", params![])
            .await
            .map_err(|e| TrawlError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row
                .get::<i64>(0)
                .map_err(|e| TrawlError::Storage(e.to_string()))? as u64),
            Ok(None) => Ok(0),
            Err(e) => Err(TrawlError::Storage(e.to_string())),
        }
    }

    /// Get a document by its path.
    pub async fn get_document_by_path(&self, path: &str) -> Result<Option<DocumentRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE path = ?1"),
                params![path],
            )
            .await
            .map_err(|e| TrawlError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_document(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(TrawlError::Storage(e.to_string())),
        }
    }

    /// Document counts per project and version.
    pub async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT project, version, COUNT(*) FROM documents
                 GROUP BY project, version
                 ORDER BY project, version",
                params![],
            )
            .await
            .map_err(|e| TrawlError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(ProjectSummary {
                project: row.get::<String>(0).ok(),
                version: row
                    .get::<String>(1)
                    .map_err(|e| TrawlError::Storage(e.to_string()))?,
                documents: row
                    .get::<i64>(2)
                    .map_err(|e| TrawlError::Storage(e.to_string()))? as u64,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // FTS search
    // -----------------------------------------------------------------------

    /// Full-text search across documents, optionally within one project.
    pub async fn search(
        &self,
        query: &str,
        project: Option<&str>,
        limit: u32,
    ) -> Result<Vec<SearchHit>> {
        let mut rows = self
            .conn
            .query(
                "SELECT d.path, d.project, d.version,
                        snippet(documents_fts, 2, '[', ']', '...', 12), rank
                 FROM documents_fts fts
                 JOIN documents d ON d.rowid = fts.rowid
                 WHERE documents_fts MATCH ?1 AND (?2 IS NULL OR d.project = ?2)
                 ORDER BY rank
                 LIMIT ?3",
                params![query, project, limit],
            )
            .await
            .map_err(|e| TrawlError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let path: String = row
                .get(0)
                .map_err(|e| TrawlError::Storage(e.to_string()))?;
            results.push(SearchHit {
                path,
                project: row.get::<String>(1).ok(),
                version: row.get::<String>(2).unwrap_or_default(),
                snippet: row.get::<String>(3).ok().filter(|s| !s.is_empty()),
                score: row.get::<f64>(4).unwrap_or(0.0),
            });
        }
        Ok(results)
    }
}

#[async_trait]
impl IndexBackend for Storage {
    fn name(&self) -> &str {
        "libsql"
    }

    async fn bulk_save(
        &self,
        documents: &[DocumentRecord],
    ) -> std::result::Result<BulkSaveReport, BackendError> {
        self.save_documents(documents).await
    }

    async fn reset(&self) -> std::result::Result<(), BackendError> {
        self.reset_index().await.map_err(|e| match e {
            TrawlError::Storage(message) => batch_error(&message),
            other => BackendError::Unavailable(other.to_string()),
        })
    }
}

/// A search result from FTS5.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub path: String,
    pub project: Option<String>,
    pub version: String,
    /// Matching content excerpt, when the document has content.
    pub snippet: Option<String>,
    /// FTS5 rank score (lower is better).
    pub score: f64,
}

/// Document count for one project/version pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSummary {
    pub project: Option<String>,
    pub version: String,
    pub documents: u64,
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// How far a failed statement reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorScope {
    /// Only the row being written.
    Document,
    /// The database ran out of memory or space.
    Exhausted,
    /// The database cannot take writes right now.
    Unavailable,
}

impl ErrorScope {
    fn into_backend_error(self, message: String) -> BackendError {
        match self {
            Self::Exhausted => BackendError::ResourceExhausted(message),
            Self::Document | Self::Unavailable => BackendError::Unavailable(message),
        }
    }
}

fn classify_error(message: &str) -> ErrorScope {
    let message = message.to_lowercase();
    if message.contains("out of memory") || message.contains("disk is full") {
        ErrorScope::Exhausted
    } else if message.contains("locked")
        || message.contains("busy")
        || message.contains("unable to open")
        || message.contains("readonly")
        || message.contains("disk i/o")
    {
        ErrorScope::Unavailable
    } else {
        ErrorScope::Document
    }
}

/// A failure outside any single row always fails the whole batch.
fn batch_error(message: &str) -> BackendError {
    classify_error(message).into_backend_error(message.to_string())
}

/// Convert a database row to a [`DocumentRecord`].
fn row_to_document(row: &libsql::Row) -> Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row
            .get::<String>(0)
            .map_err(|e| TrawlError::Storage(e.to_string()))?,
        name: row
            .get::<String>(1)
            .map_err(|e| TrawlError::Storage(e.to_string()))?,
        extension: row
            .get::<String>(2)
            .map_err(|e| TrawlError::Storage(e.to_string()))?,
        path: row
            .get::<String>(3)
            .map_err(|e| TrawlError::Storage(e.to_string()))?,
        content: row.get::<String>(4).ok(),
        project: row.get::<String>(5).ok(),
        version: row
            .get::<String>(6)
            .map_err(|e| TrawlError::Storage(e.to_string()))?,
        size: row
            .get::<i64>(7)
            .map_err(|e| TrawlError::Storage(e.to_string()))? as u64,
        created_at: parse_timestamp(row, 8)?,
        last_modified: parse_timestamp(row, 9)?,
    })
}

fn parse_timestamp(row: &libsql::Row, idx: i32) -> Result<DateTime<Utc>> {
    let s: String = row
        .get(idx)
        .map_err(|e| TrawlError::Storage(e.to_string()))?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TrawlError::Storage(format!("invalid date: {e}")))
}
