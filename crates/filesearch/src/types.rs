//! Core value types: file descriptors, search options, and search results.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

bitflags::bitflags! {
    /// Attribute flags derived once at descriptor creation.
    ///
    /// On Unix, `HIDDEN` means a dot-prefixed name and `SYSTEM` is never
    /// set; on Windows both come from the native file attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FileAttributes: u8 {
        const HIDDEN = 1;
        const SYSTEM = 1 << 1;
        const READ_ONLY = 1 << 2;
    }
}

/// An immutable description of one file, as produced by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDescriptor {
    /// Full path to the file.
    pub path: PathBuf,
    /// File name including extension.
    pub name: String,
    /// Parent directory.
    pub directory: PathBuf,
    /// Lowercased extension without the leading dot; empty if none.
    pub extension: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, if the platform reports one.
    pub modified: Option<DateTime<Utc>>,
    /// Hidden/system/read-only flags.
    pub attributes: FileAttributes,
}

impl FileDescriptor {
    /// Builds a descriptor from a path and its already-fetched metadata.
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let modified = metadata.modified().ok().map(DateTime::<Utc>::from);

        let mut attributes = FileAttributes::empty();
        if metadata.permissions().readonly() {
            attributes |= FileAttributes::READ_ONLY;
        }
        attributes |= platform_attributes(&name, metadata);

        Self {
            path: path.to_path_buf(),
            name,
            directory,
            extension,
            size: metadata.len(),
            modified,
            attributes,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.attributes.contains(FileAttributes::HIDDEN)
    }

    pub fn is_system(&self) -> bool {
        self.attributes.contains(FileAttributes::SYSTEM)
    }
}

#[cfg(windows)]
pub(crate) fn platform_attributes(_name: &str, metadata: &Metadata) -> FileAttributes {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;

    let raw = metadata.file_attributes();
    let mut attributes = FileAttributes::empty();
    if raw & FILE_ATTRIBUTE_HIDDEN != 0 {
        attributes |= FileAttributes::HIDDEN;
    }
    if raw & FILE_ATTRIBUTE_SYSTEM != 0 {
        attributes |= FileAttributes::SYSTEM;
    }
    attributes
}

#[cfg(not(windows))]
pub(crate) fn platform_attributes(name: &str, _metadata: &Metadata) -> FileAttributes {
    if name.starts_with('.') {
        FileAttributes::HIDDEN
    } else {
        FileAttributes::empty()
    }
}

/// What part of a file matched the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Name,
    Content,
    Both,
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Content => "content",
            Self::Both => "both",
        }
    }

    /// Combines an existing match kind with a newly observed one.
    pub(crate) fn merged_with(self, other: MatchType) -> MatchType {
        if self == other {
            self
        } else {
            MatchType::Both
        }
    }
}

/// Options controlling a search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// The query term (plain text, whole word, or regular expression
    /// depending on the flags below).
    pub term: String,
    pub search_in_name: bool,
    pub search_in_content: bool,
    pub case_sensitive: bool,
    pub whole_word: bool,
    pub use_regex: bool,
    /// Inclusive size bounds, bytes.
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    /// Inclusive modified-time bounds.
    pub modified_after: Option<DateTime<Utc>>,
    pub modified_before: Option<DateTime<Utc>>,
    /// Extension filters; entries are matched case-insensitively and may
    /// carry a leading dot or not.
    pub include_extensions: Vec<String>,
    pub exclude_extensions: Vec<String>,
    /// Directory filters; matched as case-insensitive substrings of the
    /// full directory path.
    pub include_directories: Vec<String>,
    pub exclude_directories: Vec<String>,
    pub include_hidden: bool,
    pub include_system: bool,
    /// Maximum number of results to return.
    pub max_results: usize,
    /// Maximum characters of extracted content to keep for matching and
    /// indexing.
    pub max_content_length: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            term: String::new(),
            search_in_name: true,
            search_in_content: false,
            case_sensitive: false,
            whole_word: false,
            use_regex: false,
            min_size: None,
            max_size: None,
            modified_after: None,
            modified_before: None,
            include_extensions: Vec::new(),
            exclude_extensions: Vec::new(),
            include_directories: Vec::new(),
            exclude_directories: Vec::new(),
            include_hidden: false,
            include_system: false,
            max_results: 100,
            max_content_length: 10_000,
        }
    }
}

impl SearchOptions {
    /// Convenience constructor for a plain term search.
    pub fn with_term(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            ..Self::default()
        }
    }
}

/// One ranked match returned by an engine.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub path: PathBuf,
    pub name: String,
    pub directory: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub extension: String,
    pub match_type: MatchType,
    /// Extracted content, possibly truncated; populated only when the
    /// engine extracted it for content matching.
    pub content: Option<String>,
    /// Ranking signal, higher is more relevant.
    pub relevance: f64,
    /// Total occurrences of the term across name and content.
    pub match_count: usize,
    /// Up to a few matching content lines, for display.
    pub snippets: Vec<String>,
}

impl SearchResult {
    /// Starts a result from a descriptor; match fields are filled in by
    /// the engine that produced the match.
    pub(crate) fn from_descriptor(descriptor: &FileDescriptor, match_type: MatchType) -> Self {
        Self {
            path: descriptor.path.clone(),
            name: descriptor.name.clone(),
            directory: descriptor.directory.clone(),
            size: descriptor.size,
            modified: descriptor.modified,
            extension: descriptor.extension.clone(),
            match_type,
            content: None,
            relevance: 0.0,
            match_count: 0,
            snippets: Vec::new(),
        }
    }
}

/// Sorts results by descending relevance, breaking ties by path for
/// deterministic output, and truncates to `max_results`.
pub(crate) fn rank_and_truncate(mut results: Vec<SearchResult>, max_results: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    results.truncate(max_results);
    results
}
