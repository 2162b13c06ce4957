//! Shared types, error model, and configuration for trawl.
//!
//! This crate is the foundation depended on by all other trawl crates.
//! It provides:
//! - [`TrawlError`] and [`BackendError`]: the error types
//! - Domain types ([`DocumentRecord`], [`BulkSaveReport`])
//! - The [`IndexBackend`] seam implemented by search backends
//! - Configuration ([`AppConfig`], [`CrawlConfig`], config loading)

pub mod backend;
pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use backend::IndexBackend;
pub use config::{
    AppConfig, ConfigSource, CrawlConfig, CrawlerSettings, DEFAULT_BATCH_SIZE,
    DEFAULT_MAX_CONTENT_BYTES, FileConfigSource, IndexSettings, RetrySettings, config_dir,
    config_file_path, expand_home, init_config, load_config, load_config_from,
};
pub use error::{BackendError, Result, TrawlError};
pub use types::{BulkSaveReport, DEFAULT_VERSION, DocumentRecord, FailedDocument, new_document_id};
