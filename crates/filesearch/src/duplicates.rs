//! Duplicate-file detection over a candidate file set.
//!
//! Three methods: `Hash` groups byte-identical files by whole-file blake3
//! digest; `Content` groups by a digest of extracted text (falling back
//! to a raw lossy read when no parser claims the file); `Hybrid` runs
//! hash detection first and content detection over the remainder.
//!
//! Hashing and extraction run in parallel, but groups are assembled in
//! candidate input order and the first member of each group is flagged as
//! the original, so output is independent of thread scheduling.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::events::{DuplicateEventSink, DuplicateProgress};
use crate::parser::ContentParserRegistry;
use crate::types::FileDescriptor;

/// Buffer size for streaming file hashing (64KB).
const HASH_BUFFER_BYTES: usize = 64 * 1024;

/// Confidence reported for content-equivalent (not byte-identical) groups.
const CONTENT_GROUP_CONFIDENCE: f64 = 0.95;

/// How equivalence is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionMethod {
    /// Whole-file digest; byte-identical files.
    #[default]
    Hash,
    /// Digest of extracted text; content-equivalent files.
    Content,
    /// Hash first, then content over the files hash left ungrouped.
    Hybrid,
}

/// Options restricting the candidate set and selecting the method.
#[derive(Debug, Clone)]
pub struct DuplicateDetectionOptions {
    pub method: DetectionMethod,
    /// Inclusive size bounds, bytes. The default minimum of 1 skips empty
    /// files, which would otherwise all collide.
    pub min_size: u64,
    pub max_size: Option<u64>,
    /// Reserved for a future genuine similarity comparator; the baseline
    /// content method reports a fixed confidence instead.
    pub similarity_threshold: f64,
    pub include_hidden: bool,
    pub include_system: bool,
    pub excluded_extensions: Vec<String>,
    /// Case-insensitive substrings of the parent directory path.
    pub excluded_directories: Vec<String>,
}

impl Default for DuplicateDetectionOptions {
    fn default() -> Self {
        Self {
            method: DetectionMethod::Hash,
            min_size: 1,
            max_size: None,
            similarity_threshold: 0.8,
            include_hidden: false,
            include_system: false,
            excluded_extensions: Vec::new(),
            excluded_directories: Vec::new(),
        }
    }
}

/// How the members of a group relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateGroupType {
    /// Byte-identical (hash method).
    Identical,
    /// Content-equivalent (content method).
    Similar,
    /// Same file name; reserved, no current method produces it.
    SameName,
}

impl DuplicateGroupType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identical => "identical",
            Self::Similar => "similar",
            Self::SameName => "same-name",
        }
    }
}

/// One file inside a duplicate group.
#[derive(Debug, Clone)]
pub struct DuplicateFile {
    pub path: PathBuf,
    pub name: String,
    pub directory: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// Digest the file was grouped under.
    pub hash: String,
    /// Exactly one file per group carries this flag: the first discovered.
    pub is_original: bool,
    /// 1.0 for exact hash matches; the group confidence otherwise.
    pub similarity: f64,
}

/// A set of >= 2 files considered equivalent under a detection method.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    /// Stable identity derived from the method and digest.
    pub id: String,
    /// Members in discovery order; the first is the original.
    pub files: Vec<DuplicateFile>,
    pub group_type: DuplicateGroupType,
    /// 0-1; 1.0 for hash groups.
    pub confidence: f64,
    /// Sum of member sizes, bytes.
    pub total_size: u64,
    /// Total size minus the size of the retained original.
    pub wasted_space: u64,
}

/// Groups duplicate files by content digest.
pub struct DuplicateDetector {
    registry: Arc<ContentParserRegistry>,
}

impl DuplicateDetector {
    pub fn new(registry: Arc<ContentParserRegistry>) -> Self {
        Self { registry }
    }

    /// Runs detection over a candidate set (typically a prior search
    /// result set). Per-file hashing/extraction errors exclude that file
    /// and detection continues. A cancelled run returns the groups formed
    /// from the files processed so far.
    pub fn detect(
        &self,
        files: &[FileDescriptor],
        options: &DuplicateDetectionOptions,
        sink: &dyn DuplicateEventSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<DuplicateGroup>> {
        let candidates: Vec<&FileDescriptor> = files
            .iter()
            .filter(|file| candidate_allowed(file, options))
            .collect();

        let groups = match options.method {
            DetectionMethod::Hash | DetectionMethod::Content => {
                self.group_by_digest(&candidates, options.method, sink, cancel)
            }
            DetectionMethod::Hybrid => {
                let mut groups =
                    self.group_by_digest(&candidates, DetectionMethod::Hash, sink, cancel);
                let grouped: std::collections::HashSet<PathBuf> = groups
                    .iter()
                    .flat_map(|group| group.files.iter().map(|file| file.path.clone()))
                    .collect();
                let remainder: Vec<&FileDescriptor> = candidates
                    .iter()
                    .copied()
                    .filter(|file| !grouped.contains(&file.path))
                    .collect();
                groups.extend(self.group_by_digest(
                    &remainder,
                    DetectionMethod::Content,
                    sink,
                    cancel,
                ));
                groups
            }
        };

        Ok(groups)
    }

    /// Whole-file blake3 digest, streamed.
    pub fn hash_file(&self, path: &Path) -> Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; HASH_BUFFER_BYTES];
        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(hasher.finalize().to_hex().to_string())
    }

    /// True when the two files are byte-identical. Differing lengths
    /// short-circuit before any hashing.
    pub fn are_identical(&self, first: &Path, second: &Path) -> Result<bool> {
        let first_len = std::fs::metadata(first)?.len();
        let second_len = std::fs::metadata(second)?.len();
        if first_len != second_len {
            return Ok(false);
        }
        Ok(self.hash_file(first)? == self.hash_file(second)?)
    }

    /// Digest of the text a parser extracts; files without a claiming
    /// parser fall back to a raw lossy read.
    fn content_digest(&self, path: &Path) -> Result<String> {
        let text = match self.registry.extract_text(path) {
            Some(text) => text,
            None => {
                let bytes = std::fs::read(path)?;
                String::from_utf8_lossy(&bytes).into_owned()
            }
        };
        Ok(blake3::hash(text.as_bytes()).to_hex().to_string())
    }

    fn group_by_digest(
        &self,
        candidates: &[&FileDescriptor],
        method: DetectionMethod,
        sink: &dyn DuplicateEventSink,
        cancel: &CancellationToken,
    ) -> Vec<DuplicateGroup> {
        let total = candidates.len();
        let processed = AtomicUsize::new(0);

        // Parallel digesting; order is restored by collecting per-index.
        let digests: Vec<Option<String>> = candidates
            .par_iter()
            .map(|descriptor| {
                if cancel.is_cancelled().is_none() {
                    return None;
                }
                let outcome = match method {
                    DetectionMethod::Content => self.content_digest(&descriptor.path),
                    _ => self.hash_file(&descriptor.path),
                };
                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                sink.progress(DuplicateProgress {
                    processed: done,
                    total,
                });
                match outcome {
                    Ok(digest) => Some(digest),
                    Err(error) => {
                        sink.error(&descriptor.path, &error.to_string());
                        log::debug!(
                            "digest failed for {}: {}",
                            descriptor.path.display(),
                            error
                        );
                        None
                    }
                }
            })
            .collect();

        // Sequential reduce in input order keeps grouping deterministic.
        let (group_type, confidence) = match method {
            DetectionMethod::Content => (DuplicateGroupType::Similar, CONTENT_GROUP_CONFIDENCE),
            _ => (DuplicateGroupType::Identical, 1.0),
        };
        let mut order: Vec<String> = Vec::new();
        let mut members: HashMap<String, Vec<&FileDescriptor>> = HashMap::new();
        for (descriptor, digest) in candidates.iter().copied().zip(digests) {
            let Some(digest) = digest else { continue };
            members
                .entry(digest.clone())
                .or_insert_with(|| {
                    order.push(digest.clone());
                    Vec::new()
                })
                .push(descriptor);
        }

        let mut groups = Vec::new();
        for digest in order {
            let files = &members[&digest];
            if files.len() < 2 {
                continue;
            }
            let group = build_group(&digest, files, group_type, confidence);
            sink.group_found(&group);
            groups.push(group);
        }
        groups
    }
}

fn candidate_allowed(file: &FileDescriptor, options: &DuplicateDetectionOptions) -> bool {
    if file.size < options.min_size {
        return false;
    }
    if let Some(max) = options.max_size {
        if file.size > max {
            return false;
        }
    }
    if file.is_hidden() && !options.include_hidden {
        return false;
    }
    if file.is_system() && !options.include_system {
        return false;
    }
    if options
        .excluded_extensions
        .iter()
        .any(|ext| ext.trim_start_matches('.').eq_ignore_ascii_case(&file.extension))
    {
        return false;
    }
    let directory = file.directory.to_string_lossy().to_lowercase();
    if options
        .excluded_directories
        .iter()
        .any(|excluded| directory.contains(&excluded.to_lowercase()))
    {
        return false;
    }
    true
}

fn build_group(
    digest: &str,
    files: &[&FileDescriptor],
    group_type: DuplicateGroupType,
    confidence: f64,
) -> DuplicateGroup {
    let members: Vec<DuplicateFile> = files
        .iter()
        .enumerate()
        .map(|(i, descriptor)| DuplicateFile {
            path: descriptor.path.clone(),
            name: descriptor.name.clone(),
            directory: descriptor.directory.clone(),
            size: descriptor.size,
            modified: descriptor.modified,
            hash: digest.to_string(),
            is_original: i == 0,
            similarity: if group_type == DuplicateGroupType::Identical {
                1.0
            } else {
                confidence
            },
        })
        .collect();

    let total_size: u64 = members.iter().map(|file| file.size).sum();
    let wasted_space = total_size - members[0].size;

    DuplicateGroup {
        id: format!("{}:{}", group_type.as_str(), digest),
        files: members,
        group_type,
        confidence,
        total_size,
        wasted_space,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopSink;
    use std::fs;

    fn descriptor(path: &Path) -> FileDescriptor {
        FileDescriptor::from_metadata(path, &fs::metadata(path).unwrap())
    }

    fn write_file(dir: &Path, name: &str, contents: &str) -> FileDescriptor {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        descriptor(&path)
    }

    fn detector() -> DuplicateDetector {
        DuplicateDetector::new(Arc::new(ContentParserRegistry::with_builtins()))
    }

    #[test]
    fn identical_files_hash_equal() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write_file(tmp.path(), "a.txt", "hello world");
        let b = write_file(tmp.path(), "b.txt", "hello world");
        let c = write_file(tmp.path(), "c.txt", "goodbye");

        let detector = detector();
        assert_eq!(
            detector.hash_file(&a.path).unwrap(),
            detector.hash_file(&b.path).unwrap()
        );
        assert!(detector.are_identical(&a.path, &b.path).unwrap());
        assert!(!detector.are_identical(&a.path, &c.path).unwrap());
    }

    #[test]
    fn hash_method_groups_byte_identical_files() {
        let tmp = tempfile::tempdir().unwrap();
        let files = vec![
            write_file(tmp.path(), "a.txt", "hello world"),
            write_file(tmp.path(), "b.txt", "hello world"),
            write_file(tmp.path(), "c.txt", "goodbye"),
        ];

        let groups = detector()
            .detect(
                &files,
                &DuplicateDetectionOptions::default(),
                &NoopSink,
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.group_type, DuplicateGroupType::Identical);
        assert_eq!(group.confidence, 1.0);
        assert_eq!(group.files.len(), 2);
        assert!(group.files[0].is_original);
        assert!(!group.files[1].is_original);
        // Wasted space for equal-size members: (N-1) * size.
        assert_eq!(group.wasted_space, files[0].size);
        assert_eq!(group.total_size, files[0].size * 2);
    }

    #[test]
    fn exactly_one_original_per_group() {
        let tmp = tempfile::tempdir().unwrap();
        let files = vec![
            write_file(tmp.path(), "a.txt", "same"),
            write_file(tmp.path(), "b.txt", "same"),
            write_file(tmp.path(), "c.txt", "same"),
        ];

        let groups = detector()
            .detect(
                &files,
                &DuplicateDetectionOptions::default(),
                &NoopSink,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(groups.len(), 1);
        let originals = groups[0].files.iter().filter(|f| f.is_original).count();
        assert_eq!(originals, 1);
        assert_eq!(groups[0].wasted_space, files[0].size * 2);
    }

    #[test]
    fn content_method_reports_similar_groups_with_fixed_confidence() {
        let tmp = tempfile::tempdir().unwrap();
        let files = vec![
            write_file(tmp.path(), "a.txt", "shared text"),
            write_file(tmp.path(), "b.txt", "shared text"),
        ];

        let options = DuplicateDetectionOptions {
            method: DetectionMethod::Content,
            ..DuplicateDetectionOptions::default()
        };
        let groups = detector()
            .detect(&files, &options, &NoopSink, &CancellationToken::new())
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group_type, DuplicateGroupType::Similar);
        assert_eq!(groups[0].confidence, CONTENT_GROUP_CONFIDENCE);
        assert_eq!(groups[0].files[0].similarity, CONTENT_GROUP_CONFIDENCE);
    }

    #[test]
    fn hybrid_method_concatenates_hash_then_content_groups() {
        // A parser that trims whitespace makes files content-equivalent
        // even when their bytes differ.
        struct TrimmingParser;
        impl crate::parser::ContentParser for TrimmingParser {
            fn name(&self) -> &str {
                "trimming"
            }
            fn can_parse(&self, path: &Path) -> bool {
                path.extension().and_then(|e| e.to_str()) == Some("note")
            }
            fn extensions(&self) -> &[&str] {
                &["note"]
            }
            fn priority(&self) -> i32 {
                50
            }
            fn extract_text(&self, path: &Path) -> crate::error::Result<String> {
                Ok(fs::read_to_string(path)?.trim().to_string())
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        // Byte-identical pair.
        let a = write_file(tmp.path(), "a.txt", "identical bytes");
        let b = write_file(tmp.path(), "b.txt", "identical bytes");
        // Byte-different, content-equivalent after trimming.
        let c = write_file(tmp.path(), "c.note", "same words");
        let d = write_file(tmp.path(), "d.note", "  same words\n");
        let e = write_file(tmp.path(), "e.txt", "lonely");

        let registry = ContentParserRegistry::with_builtins();
        registry.register(Arc::new(TrimmingParser));
        let detector = DuplicateDetector::new(Arc::new(registry));

        let options = DuplicateDetectionOptions {
            method: DetectionMethod::Hybrid,
            ..DuplicateDetectionOptions::default()
        };
        let groups = detector
            .detect(
                &[a, b, c, d, e],
                &options,
                &NoopSink,
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].group_type, DuplicateGroupType::Identical);
        assert_eq!(groups[1].group_type, DuplicateGroupType::Similar);
        assert_eq!(groups[1].files.len(), 2);
    }

    #[test]
    fn size_and_extension_filters_restrict_candidates() {
        let tmp = tempfile::tempdir().unwrap();
        let files = vec![
            write_file(tmp.path(), "a.tmp", "dup"),
            write_file(tmp.path(), "b.tmp", "dup"),
        ];

        let options = DuplicateDetectionOptions {
            excluded_extensions: vec!["tmp".into()],
            ..DuplicateDetectionOptions::default()
        };
        let groups = detector()
            .detect(&files, &options, &NoopSink, &CancellationToken::new())
            .unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn empty_files_are_skipped_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        let files = vec![
            write_file(tmp.path(), "a.txt", ""),
            write_file(tmp.path(), "b.txt", ""),
        ];

        let groups = detector()
            .detect(
                &files,
                &DuplicateDetectionOptions::default(),
                &NoopSink,
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn missing_files_are_excluded_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let a = write_file(tmp.path(), "a.txt", "dup");
        let b = write_file(tmp.path(), "b.txt", "dup");
        let mut ghost = a.clone();
        ghost.path = tmp.path().join("ghost.txt");

        let groups = detector()
            .detect(
                &[a, b, ghost],
                &DuplicateDetectionOptions::default(),
                &NoopSink,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].files.len(), 2);
    }

    #[test]
    fn cancelled_detection_returns_partial_groups() {
        let tmp = tempfile::tempdir().unwrap();
        let files = vec![
            write_file(tmp.path(), "a.txt", "dup"),
            write_file(tmp.path(), "b.txt", "dup"),
        ];
        let cancel = CancellationToken::new();
        cancel.cancel();
        let groups = detector()
            .detect(
                &files,
                &DuplicateDetectionOptions::default(),
                &NoopSink,
                &cancel,
            )
            .unwrap();
        assert!(groups.is_empty());
    }
}
