//! SQL migration definitions for the trawl index database.
//!
//! Migrations are applied in order on database open and after a reset. Each
//! migration has a version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: documents, FTS5",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per indexed file, keyed by path
CREATE TABLE IF NOT EXISTS documents (
    id            TEXT NOT NULL UNIQUE,
    path          TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    extension     TEXT NOT NULL,
    content       TEXT,
    project       TEXT,
    version       TEXT NOT NULL,
    size          INTEGER NOT NULL,
    created_at    TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    indexed_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_project ON documents(project, version);
CREATE INDEX IF NOT EXISTS idx_documents_extension ON documents(extension);

-- Full-text search on documents
CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
    name,
    path,
    content,
    project,
    content=documents,
    content_rowid=rowid
);

-- Triggers to keep FTS in sync with documents table
CREATE TRIGGER IF NOT EXISTS documents_fts_insert AFTER INSERT ON documents BEGIN
    INSERT INTO documents_fts(rowid, name, path, content, project)
    VALUES (new.rowid, new.name, new.path, new.content, new.project);
END;

CREATE TRIGGER IF NOT EXISTS documents_fts_delete AFTER DELETE ON documents BEGIN
    INSERT INTO documents_fts(documents_fts, rowid, name, path, content, project)
    VALUES ('delete', old.rowid, old.name, old.path, old.content, old.project);
END;

CREATE TRIGGER IF NOT EXISTS documents_fts_update AFTER UPDATE ON documents BEGIN
    INSERT INTO documents_fts(documents_fts, rowid, name, path, content, project)
    VALUES ('delete', old.rowid, old.name, old.path, old.content, old.project);
    INSERT INTO documents_fts(rowid, name, path, content, project)
    VALUES (new.rowid, new.name, new.path, new.content, new.project);
END;

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}

/// Statements removing everything the migrations create.
pub(crate) const DROP_ALL: &str = r#"
DROP TRIGGER IF EXISTS documents_fts_insert;
DROP TRIGGER IF EXISTS documents_fts_delete;
DROP TRIGGER IF EXISTS documents_fts_update;
DROP TABLE IF EXISTS documents_fts;
DROP TABLE IF EXISTS documents;
DROP TABLE IF EXISTS schema_migrations;
"#;
