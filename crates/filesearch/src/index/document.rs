//! Indexed document records, index configuration, and status snapshots.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::types::SearchOptions;

/// One file's metadata plus truncated extracted content, as persisted in
/// the index snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub path: PathBuf,
    pub name: String,
    pub directory: PathBuf,
    pub extension: String,
    pub size: u64,
    /// Last modification time, unix seconds.
    pub modified_at: Option<u64>,
    /// When this document was indexed, unix seconds.
    pub indexed_at: u64,
    /// Extracted content truncated to the configured maximum, when
    /// content indexing was enabled and a parser claimed the file.
    pub content: Option<String>,
}

/// Configuration for an index build; immutable for the build's duration.
#[derive(Debug, Clone)]
pub struct IndexConfiguration {
    /// Directories whose trees are indexed.
    pub directories: Vec<PathBuf>,
    pub index_content: bool,
    pub index_metadata: bool,
    /// Files larger than this are not indexed.
    pub max_file_size: u64,
    /// Extracted content is truncated to this many characters.
    pub max_content_length: usize,
    pub excluded_extensions: Vec<String>,
    pub excluded_directories: Vec<String>,
    pub include_hidden: bool,
    pub include_system: bool,
    /// Reserved: the baseline update policy is a full rebuild.
    pub incremental: bool,
}

impl Default for IndexConfiguration {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            index_content: true,
            index_metadata: true,
            max_file_size: 50 * 1024 * 1024,
            max_content_length: 10_000,
            excluded_extensions: Vec::new(),
            excluded_directories: Vec::new(),
            include_hidden: false,
            include_system: false,
            incremental: true,
        }
    }
}

impl IndexConfiguration {
    /// Derives the scan predicates used while walking the configured
    /// directories.
    pub(crate) fn scan_options(&self) -> SearchOptions {
        SearchOptions {
            max_size: Some(self.max_file_size),
            exclude_extensions: self.excluded_extensions.clone(),
            exclude_directories: self.excluded_directories.clone(),
            include_hidden: self.include_hidden,
            include_system: self.include_system,
            max_results: usize::MAX,
            ..SearchOptions::default()
        }
    }
}

/// Index lifecycle state, stored as an atomic in the manager.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum IndexState {
    Idle = 0,
    Building = 1,
    Ready = 2,
    Error = 3,
}

impl IndexState {
    pub(crate) fn load(atomic: &AtomicU8) -> Self {
        match atomic.load(Ordering::Relaxed) {
            1 => Self::Building,
            2 => Self::Ready,
            3 => Self::Error,
            _ => Self::Idle,
        }
    }

    pub(crate) fn store(self, atomic: &AtomicU8) {
        atomic.store(self as u8, Ordering::Relaxed);
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Building => "building",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

/// A point-in-time snapshot of the index's availability and progress.
#[derive(Debug, Clone)]
pub struct IndexStatus {
    /// True when the index holds at least one document.
    pub available: bool,
    /// True while a build or update is running.
    pub building: bool,
    pub state: IndexState,
    pub document_count: usize,
    /// On-disk size of the persisted snapshot, bytes.
    pub index_size_bytes: u64,
    /// Unix seconds; `None` before the first successful build.
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
    /// Build progress, 0–100. 100 when not building.
    pub progress_percent: f64,
}
