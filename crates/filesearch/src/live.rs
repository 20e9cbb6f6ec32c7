//! Live (no-index) search: on-demand scan plus per-file matching.
//!
//! Matching supports three modes: plain substring, whole-word (tokenized
//! on space, `.`, `-`, `_`), and regular expression. Invalid regular
//! expressions are treated as "no match", never surfaced as errors.
//!
//! The relevance score of a match is `(frequency + position) / 2` where
//! `frequency = min(occurrences * 0.1, 1.0)` and `position = 1.0` for a
//! match at the start of the text, otherwise
//! `max(0.1, 1.0 - first_offset / text_len)`.

use std::borrow::Cow;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use memchr::memmem;
use rayon::prelude::*;
use regex::RegexBuilder;

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::events::{SearchEventSink, SearchProgress};
use crate::parser::{truncate_to_chars, ContentParserRegistry};
use crate::scanner::FileScanner;
use crate::types::{rank_and_truncate, FileDescriptor, MatchType, SearchOptions, SearchResult};

/// Maximum snippet lines captured per content match.
const MAX_SNIPPET_LINES: usize = 3;
/// Maximum characters kept per snippet line.
const MAX_SNIPPET_CHARS: usize = 200;

/// Delimiters for whole-word tokenization.
fn is_word_delimiter(c: char) -> bool {
    matches!(c, ' ' | '.' | '-' | '_')
}

/// Occurrence summary of a term within one piece of text.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TermMatch {
    pub count: usize,
    pub first_offset: usize,
    pub text_len: usize,
}

impl TermMatch {
    /// Average of the frequency and position scores.
    pub(crate) fn relevance(&self) -> f64 {
        let frequency = (self.count as f64 * 0.1).min(1.0);
        let position = if self.first_offset == 0 {
            1.0
        } else if self.text_len == 0 {
            0.1
        } else {
            (1.0 - self.first_offset as f64 / self.text_len as f64).max(0.1)
        };
        (frequency + position) / 2.0
    }
}

/// A compiled query term, reused across every candidate file.
pub(crate) enum TermMatcher {
    Substring { needle: String, case_sensitive: bool },
    WholeWord { term: String, case_sensitive: bool },
    Regex(Option<regex::Regex>),
}

impl TermMatcher {
    pub(crate) fn compile(options: &SearchOptions) -> Self {
        if options.use_regex {
            let compiled = RegexBuilder::new(&options.term)
                .case_insensitive(!options.case_sensitive)
                .build();
            if let Err(ref error) = compiled {
                log::debug!("invalid search regex {:?}: {}", options.term, error);
            }
            Self::Regex(compiled.ok())
        } else if options.whole_word {
            Self::WholeWord {
                term: fold(&options.term, options.case_sensitive).into_owned(),
                case_sensitive: options.case_sensitive,
            }
        } else {
            Self::Substring {
                needle: fold(&options.term, options.case_sensitive).into_owned(),
                case_sensitive: options.case_sensitive,
            }
        }
    }

    /// True when this matcher can never match anything (empty term or an
    /// invalid regular expression).
    pub(crate) fn never_matches(&self) -> bool {
        match self {
            Self::Substring { needle, .. } => needle.is_empty(),
            Self::WholeWord { term, .. } => term.is_empty(),
            Self::Regex(regex) => regex.is_none(),
        }
    }

    /// Finds every occurrence of the term in `text`.
    pub(crate) fn find(&self, text: &str) -> Option<TermMatch> {
        match self {
            Self::Substring {
                needle,
                case_sensitive,
            } => {
                if needle.is_empty() {
                    return None;
                }
                let haystack = fold(text, *case_sensitive);
                let mut iter = memmem::find_iter(haystack.as_bytes(), needle.as_bytes());
                let first_offset = iter.next()?;
                Some(TermMatch {
                    count: 1 + iter.count(),
                    first_offset,
                    text_len: haystack.len(),
                })
            }
            Self::WholeWord {
                term,
                case_sensitive,
            } => {
                if term.is_empty() {
                    return None;
                }
                let haystack = fold(text, *case_sensitive);
                let base = haystack.as_ptr() as usize;
                let mut count = 0;
                let mut first_offset = None;
                for token in haystack.split(is_word_delimiter) {
                    if token == term {
                        count += 1;
                        if first_offset.is_none() {
                            first_offset = Some(token.as_ptr() as usize - base);
                        }
                    }
                }
                first_offset.map(|first_offset| TermMatch {
                    count,
                    first_offset,
                    text_len: haystack.len(),
                })
            }
            Self::Regex(regex) => {
                let regex = regex.as_ref()?;
                let mut iter = regex.find_iter(text);
                let first = iter.next()?;
                Some(TermMatch {
                    count: 1 + iter.count(),
                    first_offset: first.start(),
                    text_len: text.len(),
                })
            }
        }
    }

    /// Cheap per-line test, used for snippet capture.
    pub(crate) fn matches_line(&self, line: &str) -> bool {
        match self {
            Self::Substring {
                needle,
                case_sensitive,
            } => !needle.is_empty() && fold(line, *case_sensitive).contains(needle.as_str()),
            Self::WholeWord { .. } => self.find(line).is_some(),
            Self::Regex(regex) => regex.as_ref().is_some_and(|r| r.is_match(line)),
        }
    }
}

fn fold(text: &str, case_sensitive: bool) -> Cow<'_, str> {
    if case_sensitive {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.to_lowercase())
    }
}

/// Searches by scanning the filesystem on demand; holds no persisted state.
pub struct LiveSearchEngine {
    roots: Vec<PathBuf>,
    scanner: FileScanner,
    registry: Arc<ContentParserRegistry>,
}

impl LiveSearchEngine {
    pub fn new(roots: Vec<PathBuf>, registry: Arc<ContentParserRegistry>) -> Self {
        Self {
            roots,
            scanner: FileScanner::new(),
            registry,
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Scans the configured roots and returns ranked matches. Per-file
    /// read/parse errors are swallowed; the scan as a whole continues.
    pub fn search(
        &self,
        options: &SearchOptions,
        sink: &dyn SearchEventSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        let matcher = TermMatcher::compile(options);
        if matcher.never_matches() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for root in &self.roots {
            for descriptor in self.scanner.scan(root, options, cancel) {
                if seen.insert(descriptor.path.clone()) {
                    candidates.push(descriptor);
                }
            }
        }

        let total = candidates.len();
        let processed = AtomicUsize::new(0);
        let mut results: Vec<SearchResult> = candidates
            .par_iter()
            .filter_map(|descriptor| {
                if cancel.is_cancelled().is_none() {
                    return None;
                }
                let result = self.match_file(descriptor, options, &matcher);
                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                sink.progress(SearchProgress {
                    processed: done,
                    total,
                });
                if let Some(ref result) = result {
                    sink.result(result);
                }
                result
            })
            .collect();

        results = rank_and_truncate(results, options.max_results);
        Ok(results)
    }

    fn match_file(
        &self,
        descriptor: &FileDescriptor,
        options: &SearchOptions,
        matcher: &TermMatcher,
    ) -> Option<SearchResult> {
        let name_match = if options.search_in_name {
            matcher.find(&descriptor.name)
        } else {
            None
        };

        let mut content_match = None;
        let mut content = None;
        let mut snippets = Vec::new();
        if options.search_in_content {
            // Extraction is best-effort; failure means no content match.
            if let Some(text) = self.registry.extract_text(&descriptor.path) {
                let text = truncate_to_chars(&text, options.max_content_length);
                content_match = matcher.find(&text);
                if content_match.is_some() {
                    snippets = capture_snippets(&text, matcher);
                }
                content = Some(text);
            }
        }

        let (match_type, relevance) = match (&name_match, &content_match) {
            (Some(name), Some(body)) => (MatchType::Both, name.relevance().max(body.relevance())),
            (Some(name), None) => (MatchType::Name, name.relevance()),
            (None, Some(body)) => (MatchType::Content, body.relevance()),
            (None, None) => return None,
        };

        let mut result = SearchResult::from_descriptor(descriptor, match_type);
        result.relevance = relevance;
        result.match_count = name_match.map(|m| m.count).unwrap_or(0)
            + content_match.map(|m| m.count).unwrap_or(0);
        result.content = content;
        result.snippets = snippets;
        Some(result)
    }
}

fn capture_snippets(text: &str, matcher: &TermMatcher) -> Vec<String> {
    text.lines()
        .filter(|line| matcher.matches_line(line))
        .take(MAX_SNIPPET_LINES)
        .map(|line| truncate_to_chars(line.trim(), MAX_SNIPPET_CHARS))
        .collect()
}
