//! Per-call event sinks for progress, result, and error notifications.
//!
//! Instead of a global subscriber model, every long-running operation takes
//! a sink reference for the duration of the call. Events are delivered
//! synchronously on whatever thread produced them; consumers that need a
//! particular thread (a GUI, say) marshal on their side.
//!
//! All sink traits have no-op default methods, and [`NoopSink`] implements
//! every sink for callers that do not care about notifications.

use std::path::Path;

use crate::duplicates::DuplicateGroup;
use crate::types::SearchResult;

/// Progress of a live or hybrid search.
#[derive(Debug, Clone, Copy)]
pub struct SearchProgress {
    /// Files examined so far.
    pub processed: usize,
    /// Total candidate files.
    pub total: usize,
}

/// Progress of an index build.
#[derive(Debug, Clone, Copy)]
pub struct IndexProgress {
    /// Files indexed so far.
    pub processed: usize,
    /// Total files to index.
    pub total: usize,
    /// Milliseconds elapsed since the build started.
    pub elapsed_ms: u64,
    /// Indexing throughput, files per second.
    pub files_per_sec: f64,
    /// Estimated seconds remaining, from average per-file cost.
    pub eta_secs: f64,
}

/// Progress of a duplicate detection run.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateProgress {
    /// Candidate files hashed/extracted so far.
    pub processed: usize,
    /// Total candidate files.
    pub total: usize,
}

/// Receives notifications from a search call.
pub trait SearchEventSink: Send + Sync {
    fn progress(&self, _progress: SearchProgress) {}
    fn result(&self, _result: &SearchResult) {}
    fn error(&self, _path: &Path, _message: &str) {}
}

/// Receives notifications from an index build or update.
pub trait IndexEventSink: Send + Sync {
    fn progress(&self, _progress: IndexProgress) {}
    fn error(&self, _path: &Path, _message: &str) {}
}

/// Receives notifications from a duplicate detection run.
pub trait DuplicateEventSink: Send + Sync {
    fn progress(&self, _progress: DuplicateProgress) {}
    fn group_found(&self, _group: &DuplicateGroup) {}
    fn error(&self, _path: &Path, _message: &str) {}
}

/// A sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl SearchEventSink for NoopSink {}
impl IndexEventSink for NoopSink {}
impl DuplicateEventSink for NoopSink {}
