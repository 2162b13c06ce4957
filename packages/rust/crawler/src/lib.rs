//! Filesystem crawler: classification, document building, batching and
//! bulk indexing.
//!
//! This crate provides:
//! - [`classify`]: include/exclude rules and the shared file-name split
//! - [`identity`]: project/version inference from trunk/branches layouts
//! - [`builder`]: file metadata and content into [`DocumentRecord`](trawl_shared::DocumentRecord)
//! - [`batch`]: the in-memory batch buffer
//! - [`writer`]: bulk writes with failure isolation and retry policy
//! - [`engine`]: the sequential crawl orchestrator

pub mod batch;
pub mod builder;
pub mod classify;
pub mod engine;
pub mod identity;
pub mod writer;

#[cfg(test)]
mod testing;

pub use batch::BatchAccumulator;
pub use builder::{build_document, decode_latin1, is_content_eligible};
pub use classify::{PathClassifier, split_file_name};
pub use engine::{
    CrawlState, CrawlStatus, CrawlSummary, Crawler, ProgressReporter, SilentProgress,
};
pub use identity::{Identity, resolve_identity};
pub use writer::{FailedWrite, IndexWriter, RetryPolicy, WriteOutcome};
