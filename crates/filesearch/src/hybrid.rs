//! Hybrid search: persisted index first, live scan to supplement.
//!
//! The index is the fast path. When it returns fewer than `max_results`,
//! a live search fills in the gap, excluding paths the index already
//! produced. Any unexpected failure on the hybrid path degrades to a
//! live-only search rather than surfacing the error; index-only mode with
//! no index is the one hard precondition failure.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::cancel::CancellationToken;
use crate::error::{Result, SearchError};
use crate::events::SearchEventSink;
use crate::index::IndexManager;
use crate::live::LiveSearchEngine;
use crate::types::{rank_and_truncate, SearchOptions, SearchResult};

/// Which engines a search consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Index first, live supplement.
    #[default]
    Hybrid,
    /// Index only; hard error when no index exists.
    IndexOnly,
    /// Always a live filesystem scan.
    LiveOnly,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hybrid => "hybrid",
            Self::IndexOnly => "index-only",
            Self::LiveOnly => "live-only",
        }
    }
}

/// Latency accounting for one mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeStats {
    /// Completed searches in this mode.
    pub searches: u64,
    /// Running average latency, milliseconds.
    pub average_ms: f64,
}

impl ModeStats {
    /// Running average: `((old * (n-1)) + sample) / n`.
    fn record(&mut self, sample_ms: f64) {
        self.searches += 1;
        let n = self.searches as f64;
        self.average_ms = (self.average_ms * (n - 1.0) + sample_ms) / n;
    }
}

/// Performance counters kept across searches.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceStats {
    pub hybrid: ModeStats,
    pub index_only: ModeStats,
    pub live_only: ModeStats,
    /// Hybrid searches that got results from the index.
    pub index_hits: u64,
    /// Hybrid searches that degraded to live-only after a failure.
    pub live_fallbacks: u64,
}

/// Composes the index manager and live engine behind one query contract.
pub struct HybridSearchEngine {
    index: Arc<IndexManager>,
    live: LiveSearchEngine,
    mode: Mutex<SearchMode>,
    stats: Mutex<PerformanceStats>,
}

impl HybridSearchEngine {
    pub fn new(index: Arc<IndexManager>, live: LiveSearchEngine) -> Self {
        Self {
            index,
            live,
            mode: Mutex::new(SearchMode::default()),
            stats: Mutex::new(PerformanceStats::default()),
        }
    }

    pub fn mode(&self) -> SearchMode {
        *self.mode.lock()
    }

    pub fn set_mode(&self, mode: SearchMode) {
        *self.mode.lock() = mode;
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        *self.stats.lock()
    }

    /// Runs a search in the current mode. The returned set never contains
    /// the same path twice.
    pub fn search(
        &self,
        options: &SearchOptions,
        sink: &dyn SearchEventSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        let mode = self.mode();
        let started = Instant::now();

        let outcome = match mode {
            SearchMode::LiveOnly => self.live.search(options, sink, cancel),
            SearchMode::IndexOnly => {
                if !self.index.is_available() {
                    return Err(SearchError::IndexUnavailable(
                        "index-only search requires a built index".to_string(),
                    ));
                }
                self.index.search(options)
            }
            SearchMode::Hybrid => match self.hybrid_search(options, sink, cancel) {
                Ok(results) => Ok(results),
                Err(error) => {
                    // Degrade to live-only rather than surfacing the error.
                    log::warn!("hybrid search failed, falling back to live: {error}");
                    self.stats.lock().live_fallbacks += 1;
                    self.live.search(options, sink, cancel)
                }
            },
        };

        if outcome.is_ok() {
            let sample_ms = started.elapsed().as_secs_f64() * 1000.0;
            let mut stats = self.stats.lock();
            match mode {
                SearchMode::Hybrid => stats.hybrid.record(sample_ms),
                SearchMode::IndexOnly => stats.index_only.record(sample_ms),
                SearchMode::LiveOnly => stats.live_only.record(sample_ms),
            }
        }
        outcome
    }

    fn hybrid_search(
        &self,
        options: &SearchOptions,
        sink: &dyn SearchEventSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        let mut results = if self.index.is_available() {
            let indexed = self.index.search(options)?;
            if !indexed.is_empty() {
                self.stats.lock().index_hits += 1;
            }
            indexed
        } else {
            Vec::new()
        };

        if results.len() < options.max_results {
            let seen: HashSet<PathBuf> = results.iter().map(|r| r.path.clone()).collect();
            let live = self.live.search(options, sink, cancel)?;
            results.extend(live.into_iter().filter(|r| !seen.contains(&r.path)));
        }

        Ok(rank_and_truncate(results, options.max_results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopSink;
    use crate::index::IndexConfiguration;
    use crate::parser::ContentParserRegistry;
    use std::fs;
    use std::path::Path;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    fn build_engine(root: &Path, index_dir: &Path, build: bool) -> HybridSearchEngine {
        let registry = Arc::new(ContentParserRegistry::with_builtins());
        let index = Arc::new(IndexManager::new(
            index_dir.to_path_buf(),
            Arc::clone(&registry),
        ));
        if build {
            index
                .build(
                    &IndexConfiguration {
                        directories: vec![root.to_path_buf()],
                        ..IndexConfiguration::default()
                    },
                    &NoopSink,
                    &CancellationToken::new(),
                )
                .unwrap();
        }
        let live = LiveSearchEngine::new(vec![root.to_path_buf()], registry);
        HybridSearchEngine::new(index, live)
    }

    #[test]
    fn hybrid_results_never_repeat_a_path() {
        let tmp = tempfile::tempdir().unwrap();
        let index_dir = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "hello.txt", "hello world");
        write_file(tmp.path(), "greeting.txt", "hello there");

        let engine = build_engine(tmp.path(), index_dir.path(), true);
        let options = SearchOptions {
            search_in_content: true,
            ..SearchOptions::with_term("hello")
        };
        let results = engine
            .search(&options, &NoopSink, &CancellationToken::new())
            .unwrap();

        let mut paths: Vec<_> = results.iter().map(|r| r.path.clone()).collect();
        let before = paths.len();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), before);
        assert_eq!(before, 2);
    }

    #[test]
    fn hybrid_supplements_index_with_live_results() {
        let tmp = tempfile::tempdir().unwrap();
        let index_dir = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "indexed.txt", "target");

        let engine = build_engine(tmp.path(), index_dir.path(), true);
        // A file created after the build is only visible to the live scan.
        write_file(tmp.path(), "fresh-target.txt", "target");

        let options = SearchOptions {
            search_in_content: true,
            ..SearchOptions::with_term("target")
        };
        let results = engine
            .search(&options, &NoopSink, &CancellationToken::new())
            .unwrap();
        let names: HashSet<_> = results.iter().map(|r| r.name.clone()).collect();
        assert!(names.contains("indexed.txt"));
        assert!(names.contains("fresh-target.txt"));
    }

    #[test]
    fn index_only_without_index_is_a_hard_error() {
        let tmp = tempfile::tempdir().unwrap();
        let index_dir = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "a.txt", "x");

        let engine = build_engine(tmp.path(), index_dir.path(), false);
        engine.set_mode(SearchMode::IndexOnly);
        let outcome = engine.search(
            &SearchOptions::with_term("a"),
            &NoopSink,
            &CancellationToken::new(),
        );
        assert!(matches!(outcome, Err(SearchError::IndexUnavailable(_))));
    }

    #[test]
    fn index_only_after_delete_is_a_hard_error() {
        let tmp = tempfile::tempdir().unwrap();
        let index_dir = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "a.txt", "x");

        let engine = build_engine(tmp.path(), index_dir.path(), true);
        engine.index.delete().unwrap();
        engine.set_mode(SearchMode::IndexOnly);
        let outcome = engine.search(
            &SearchOptions::with_term("a"),
            &NoopSink,
            &CancellationToken::new(),
        );
        assert!(matches!(outcome, Err(SearchError::IndexUnavailable(_))));
    }

    #[test]
    fn live_only_ignores_the_index() {
        let tmp = tempfile::tempdir().unwrap();
        let index_dir = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "visible.txt", "x");

        let engine = build_engine(tmp.path(), index_dir.path(), false);
        engine.set_mode(SearchMode::LiveOnly);
        let results = engine
            .search(
                &SearchOptions::with_term("visible"),
                &NoopSink,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn running_average_latency_is_tracked_per_mode() {
        let mut stats = ModeStats::default();
        stats.record(10.0);
        stats.record(20.0);
        assert_eq!(stats.searches, 2);
        assert!((stats.average_ms - 15.0).abs() < f64::EPSILON);

        let tmp = tempfile::tempdir().unwrap();
        let index_dir = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "a.txt", "x");
        let engine = build_engine(tmp.path(), index_dir.path(), true);
        engine
            .search(
                &SearchOptions::with_term("a"),
                &NoopSink,
                &CancellationToken::new(),
            )
            .unwrap();
        let stats = engine.performance_stats();
        assert_eq!(stats.hybrid.searches, 1);
    }
}
