//! Persisted index management: build, query, update, delete, status.
//!
//! The manager owns the in-memory document list behind a mutex and
//! persists it as a compressed snapshot at the end of every successful
//! build. Index-layer matching is plain substring only; whole-word and
//! regular-expression modes are a live-engine feature.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use memchr::memmem;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::cancel::CancellationToken;
use crate::error::{Result, SearchError};
use crate::events::{IndexEventSink, IndexProgress};
use crate::parser::{truncate_to_chars, ContentParserRegistry};
use crate::scanner::FileScanner;
use crate::types::{rank_and_truncate, FileDescriptor, MatchType, SearchOptions, SearchResult};

pub mod document;
pub mod persistence;

pub use document::{IndexConfiguration, IndexState, IndexStatus, IndexedDocument};
pub use persistence::{IndexSnapshot, INDEX_SNAPSHOT_VERSION, SNAPSHOT_FILE_NAME};

/// Score weight for a name substring match.
const NAME_MATCH_WEIGHT: f64 = 100.0;
/// Score weight for a content substring match.
const CONTENT_MATCH_WEIGHT: f64 = 50.0;
/// Additional weight per content occurrence beyond the first.
const CONTENT_OCCURRENCE_WEIGHT: f64 = 10.0;
/// Raw scores are divided by this to produce a 0..=1 relevance.
const MAX_BASE_WEIGHT: f64 = NAME_MATCH_WEIGHT + CONTENT_MATCH_WEIGHT + CONTENT_OCCURRENCE_WEIGHT * 5.0;

/// Returns the current Unix timestamp in seconds.
pub(crate) fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_secs())
        .unwrap_or(0)
}

/// Builds and queries the persisted document index.
pub struct IndexManager {
    index_dir: PathBuf,
    registry: Arc<ContentParserRegistry>,
    scanner: FileScanner,
    documents: Mutex<Vec<IndexedDocument>>,
    config: Mutex<Option<IndexConfiguration>>,
    state: AtomicU8,
    created_at: AtomicU64,
    updated_at: AtomicU64,
    progress_processed: AtomicUsize,
    progress_total: AtomicUsize,
}

impl IndexManager {
    /// Opens the manager, loading the persisted snapshot if one exists.
    pub fn new(index_dir: PathBuf, registry: Arc<ContentParserRegistry>) -> Self {
        let manager = Self {
            index_dir,
            registry,
            scanner: FileScanner::new(),
            documents: Mutex::new(Vec::new()),
            config: Mutex::new(None),
            state: AtomicU8::new(IndexState::Idle as u8),
            created_at: AtomicU64::new(0),
            updated_at: AtomicU64::new(0),
            progress_processed: AtomicUsize::new(0),
            progress_total: AtomicUsize::new(0),
        };

        if let Some(snapshot) = persistence::load_snapshot(&manager.index_dir) {
            log::info!(
                "loaded index snapshot: {} documents from {}",
                snapshot.documents.len(),
                manager.index_dir.display()
            );
            manager.created_at.store(snapshot.created_at, Ordering::Relaxed);
            manager.updated_at.store(snapshot.updated_at, Ordering::Relaxed);
            if !snapshot.documents.is_empty() {
                IndexState::Ready.store(&manager.state);
            }
            *manager.documents.lock() = snapshot.documents;
        }
        manager
    }

    /// True when the index holds at least one document.
    pub fn is_available(&self) -> bool {
        !self.documents.lock().is_empty()
    }

    /// Builds the index from scratch for the configured directories.
    ///
    /// Per-file extraction errors are reported through the sink and do not
    /// stop the build. A cancelled build persists the partial document set;
    /// cancellation is not an error.
    pub fn build(
        &self,
        config: &IndexConfiguration,
        sink: &dyn IndexEventSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let previous = self.state.swap(IndexState::Building as u8, Ordering::SeqCst);
        if previous == IndexState::Building as u8 {
            return Err(SearchError::BuildInProgress);
        }

        let scan_options = config.scan_options();
        let mut seen = std::collections::HashSet::new();
        let mut candidates: Vec<FileDescriptor> = Vec::new();
        for directory in &config.directories {
            for descriptor in self.scanner.scan(directory, &scan_options, cancel) {
                if seen.insert(descriptor.path.clone()) {
                    candidates.push(descriptor);
                }
            }
        }

        let total = candidates.len();
        self.progress_total.store(total, Ordering::Relaxed);
        self.progress_processed.store(0, Ordering::Relaxed);
        let started = Instant::now();
        let indexed_at = unix_now_secs();

        let documents: Vec<IndexedDocument> = candidates
            .par_iter()
            .filter_map(|descriptor| {
                if cancel.is_cancelled().is_none() {
                    return None;
                }
                let document = self.index_file(descriptor, config, indexed_at, sink);
                let processed = self.progress_processed.fetch_add(1, Ordering::Relaxed) + 1;
                emit_progress(sink, processed, total, started);
                Some(document)
            })
            .collect();

        let now = unix_now_secs();
        if self.created_at.load(Ordering::Relaxed) == 0 {
            self.created_at.store(now, Ordering::Relaxed);
        }
        self.updated_at.store(now, Ordering::Relaxed);

        let snapshot = persistence::IndexSnapshot {
            version: persistence::INDEX_SNAPSHOT_VERSION,
            created_at: self.created_at.load(Ordering::Relaxed),
            updated_at: now,
            documents: documents.clone(),
        };
        if let Err(error) = persistence::write_snapshot(&self.index_dir, &snapshot) {
            IndexState::Error.store(&self.state);
            return Err(error);
        }

        let document_count = documents.len();
        *self.documents.lock() = documents;
        *self.config.lock() = Some(config.clone());
        IndexState::Ready.store(&self.state);

        log::info!(
            "index build finished: {} documents in {} ms{}",
            document_count,
            started.elapsed().as_millis(),
            if cancel.cancel_requested() {
                " (cancelled, partial)"
            } else {
                ""
            }
        );
        Ok(())
    }

    /// Spawns `build` on a background thread and returns immediately.
    pub fn build_in_background(
        self: &Arc<Self>,
        config: IndexConfiguration,
        sink: Arc<dyn IndexEventSink>,
        cancel: CancellationToken,
    ) -> thread::JoinHandle<Result<()>> {
        let manager = Arc::clone(self);
        thread::spawn(move || manager.build(&config, sink.as_ref(), &cancel))
    }

    fn index_file(
        &self,
        descriptor: &FileDescriptor,
        config: &IndexConfiguration,
        indexed_at: u64,
        sink: &dyn IndexEventSink,
    ) -> IndexedDocument {
        let mut content = None;
        if config.index_content {
            if let Some(parser) = self.registry.parser_for(&descriptor.path) {
                match parser.extract_text(&descriptor.path) {
                    Ok(text) => {
                        content = Some(truncate_to_chars(&text, config.max_content_length));
                    }
                    Err(error) => {
                        sink.error(&descriptor.path, &error.to_string());
                    }
                }
            }
        }

        let modified_at = if config.index_metadata {
            descriptor.modified.map(|m| m.timestamp().max(0) as u64)
        } else {
            None
        };

        IndexedDocument {
            path: descriptor.path.clone(),
            name: descriptor.name.clone(),
            directory: descriptor.directory.clone(),
            extension: descriptor.extension.clone(),
            size: descriptor.size,
            modified_at,
            indexed_at,
            content,
        }
    }

    /// Queries the indexed documents with substring matching.
    ///
    /// Name matches weigh 100, content matches 50 plus 10 per additional
    /// occurrence; results are sorted by descending score and bounded by
    /// `max_results`. Searching an empty index returns an empty list; the
    /// index-only precondition is enforced by the hybrid engine.
    pub fn search(&self, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        if options.term.is_empty() {
            return Ok(Vec::new());
        }

        let needle = if options.case_sensitive {
            options.term.clone()
        } else {
            options.term.to_lowercase()
        };
        let finder = memmem::Finder::new(needle.as_bytes());

        let documents = self.documents.lock();
        let mut results = Vec::new();
        for document in documents.iter() {
            if let Some(result) = match_document(document, options, &finder) {
                results.push(result);
            }
        }
        drop(documents);

        Ok(rank_and_truncate(results, options.max_results))
    }

    /// Re-indexes with the stored configuration. The baseline policy is a
    /// full rebuild; the `incremental` flag is reserved.
    pub fn update(&self, sink: &dyn IndexEventSink, cancel: &CancellationToken) -> Result<()> {
        let config = self
            .config
            .lock()
            .clone()
            .ok_or_else(|| SearchError::IndexUnavailable("no index configuration".to_string()))?;
        self.build(&config, sink, cancel)
    }

    /// Deletes the index: in-memory documents, configuration, and the
    /// persisted snapshot.
    pub fn delete(&self) -> Result<()> {
        self.documents.lock().clear();
        *self.config.lock() = None;
        self.created_at.store(0, Ordering::Relaxed);
        self.updated_at.store(0, Ordering::Relaxed);
        IndexState::Idle.store(&self.state);
        persistence::delete_snapshot(&self.index_dir)?;
        log::info!("index deleted: {}", self.index_dir.display());
        Ok(())
    }

    /// Snapshot of the index's availability, size, and progress.
    pub fn status(&self) -> IndexStatus {
        let state = IndexState::load(&self.state);
        let building = state == IndexState::Building;
        let document_count = self.documents.lock().len();
        let progress_percent = if building {
            let total = self.progress_total.load(Ordering::Relaxed);
            let processed = self.progress_processed.load(Ordering::Relaxed);
            if total == 0 {
                0.0
            } else {
                processed as f64 / total as f64 * 100.0
            }
        } else if document_count > 0 {
            100.0
        } else {
            0.0
        };

        IndexStatus {
            available: document_count > 0,
            building,
            state,
            document_count,
            index_size_bytes: persistence::snapshot_size(&self.index_dir),
            created_at: zero_to_none(self.created_at.load(Ordering::Relaxed)),
            updated_at: zero_to_none(self.updated_at.load(Ordering::Relaxed)),
            progress_percent,
        }
    }
}

fn zero_to_none(value: u64) -> Option<u64> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}

fn emit_progress(sink: &dyn IndexEventSink, processed: usize, total: usize, started: Instant) {
    let elapsed = started.elapsed();
    let elapsed_secs = elapsed.as_secs_f64();
    let files_per_sec = if elapsed_secs > 0.0 {
        processed as f64 / elapsed_secs
    } else {
        0.0
    };
    let eta_secs = if files_per_sec > 0.0 {
        (total.saturating_sub(processed)) as f64 / files_per_sec
    } else {
        0.0
    };
    sink.progress(IndexProgress {
        processed,
        total,
        elapsed_ms: elapsed.as_millis() as u64,
        files_per_sec,
        eta_secs,
    });
}

fn match_document(
    document: &IndexedDocument,
    options: &SearchOptions,
    finder: &memmem::Finder<'_>,
) -> Option<SearchResult> {
    let fold = |text: &str| {
        if options.case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        }
    };

    let mut score = 0.0;
    let mut match_count = 0;
    let mut match_type = None;

    if options.search_in_name {
        let name = fold(&document.name);
        let occurrences = finder.find_iter(name.as_bytes()).count();
        if occurrences > 0 {
            score += NAME_MATCH_WEIGHT;
            match_count += occurrences;
            match_type = Some(MatchType::Name);
        }
    }

    if options.search_in_content {
        if let Some(content) = &document.content {
            let content = fold(content);
            let occurrences = finder.find_iter(content.as_bytes()).count();
            if occurrences > 0 {
                score += CONTENT_MATCH_WEIGHT + CONTENT_OCCURRENCE_WEIGHT * (occurrences - 1) as f64;
                match_count += occurrences;
                match_type = Some(
                    match_type
                        .map(|existing: MatchType| existing.merged_with(MatchType::Content))
                        .unwrap_or(MatchType::Content),
                );
            }
        }
    }

    let match_type = match_type?;
    let modified = document
        .modified_at
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs as i64, 0));

    Some(SearchResult {
        path: document.path.clone(),
        name: document.name.clone(),
        directory: document.directory.clone(),
        size: document.size,
        modified,
        extension: document.extension.clone(),
        match_type,
        content: document.content.clone(),
        relevance: (score / MAX_BASE_WEIGHT).min(1.0),
        match_count,
        snippets: Vec::new(),
    })
}
