//! Local file-search core: scanning, live search, persisted indexing,
//! hybrid querying, and duplicate detection.
//!
//! This crate provides the search/index/duplicate subsystem:
//! - Directory tree scanning with filter predicates
//! - A pluggable content-extraction registry
//! - A live (no-index) search engine with ranked results
//! - A persisted document index with build/update/delete/status
//! - A hybrid engine that queries the index first and supplements with
//!   a live scan
//! - Duplicate-file grouping by content digest, with wasted-space
//!   accounting
//!
//! All long-running operations take a [`CancellationToken`] and a
//! per-call event sink; cancellation yields partial results, never an
//! error.

pub mod cancel;
pub mod duplicates;
pub mod error;
pub mod events;
pub mod hybrid;
pub mod index;
pub mod live;
pub mod parser;
pub mod scanner;
pub mod types;

// Re-export main types
pub use cancel::CancellationToken;
pub use duplicates::{
    DetectionMethod, DuplicateDetectionOptions, DuplicateDetector, DuplicateFile, DuplicateGroup,
    DuplicateGroupType,
};
pub use error::{Result, SearchError};
pub use events::{DuplicateEventSink, IndexEventSink, NoopSink, SearchEventSink};
pub use hybrid::{HybridSearchEngine, PerformanceStats, SearchMode};
pub use index::{IndexConfiguration, IndexManager, IndexState, IndexStatus, IndexedDocument};
pub use live::LiveSearchEngine;
pub use parser::{ContentParser, ContentParserRegistry, ParserProvider};
pub use scanner::FileScanner;
pub use types::{FileAttributes, FileDescriptor, MatchType, SearchOptions, SearchResult};
