//! Content extraction: the parser trait, plugin seam, and registry.
//!
//! A parser converts a file's bytes into searchable text for the file
//! types it claims. The registry keeps parsers sorted by descending
//! priority and resolves the first one whose capability test accepts the
//! path; built-in parsers are consulted before any provider-supplied
//! ones. Extraction never merges output from multiple parsers.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;

pub mod builtin;

/// Converts a file's bytes into searchable text for specific file types.
pub trait ContentParser: Send + Sync {
    /// Short identifier, for logging.
    fn name(&self) -> &str;

    /// Capability test: can this parser handle the given path?
    fn can_parse(&self, path: &Path) -> bool;

    /// Extensions this parser claims, lowercase without the dot.
    fn extensions(&self) -> &[&str];

    /// Resolution priority; higher wins.
    fn priority(&self) -> i32;

    /// Extracts text. May fail per-file; callers treat failure as
    /// "no content" and continue.
    fn extract_text(&self, path: &Path) -> Result<String>;
}

/// An externally supplied source of additional parsers, consulted after
/// the built-in registrations.
pub trait ParserProvider: Send + Sync {
    fn parsers(&self) -> Vec<Arc<dyn ContentParser>>;
}

/// Maps a file path to the highest-priority parser capable of handling it.
pub struct ContentParserRegistry {
    parsers: RwLock<Vec<Arc<dyn ContentParser>>>,
    provider: RwLock<Option<Arc<dyn ParserProvider>>>,
}

impl ContentParserRegistry {
    /// Creates an empty registry with no parsers.
    pub fn new() -> Self {
        Self {
            parsers: RwLock::new(Vec::new()),
            provider: RwLock::new(None),
        }
    }

    /// Creates a registry pre-loaded with the built-in text parsers.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(builtin::ConfigFileParser));
        registry.register(Arc::new(builtin::PlainTextParser));
        registry
    }

    /// Registers a parser, keeping the list sorted by descending priority.
    /// Registration order is preserved among equal priorities.
    pub fn register(&self, parser: Arc<dyn ContentParser>) {
        let mut parsers = self.parsers.write();
        let at = parsers
            .iter()
            .position(|existing| existing.priority() < parser.priority())
            .unwrap_or(parsers.len());
        parsers.insert(at, parser);
    }

    /// Installs the external parser source.
    pub fn set_provider(&self, provider: Arc<dyn ParserProvider>) {
        *self.provider.write() = Some(provider);
    }

    /// Resolves the parser for a path: built-ins first (by priority), then
    /// provider-supplied parsers (by priority). Returns `None` when no
    /// parser claims the file.
    pub fn parser_for(&self, path: &Path) -> Option<Arc<dyn ContentParser>> {
        if let Some(parser) = self
            .parsers
            .read()
            .iter()
            .find(|parser| parser.can_parse(path))
        {
            return Some(Arc::clone(parser));
        }

        let provider = self.provider.read().as_ref().map(Arc::clone)?;
        let mut external = provider.parsers();
        external.sort_by_key(|parser| std::cmp::Reverse(parser.priority()));
        external.into_iter().find(|parser| parser.can_parse(path))
    }

    /// All registered built-in parsers, in resolution order.
    pub fn parsers(&self) -> Vec<Arc<dyn ContentParser>> {
        self.parsers.read().to_vec()
    }

    /// Best-effort extraction: resolves a parser and extracts, swallowing
    /// per-file failures. Returns `None` when there is no parser or the
    /// extraction failed.
    pub fn extract_text(&self, path: &Path) -> Option<String> {
        let parser = self.parser_for(path)?;
        match parser.extract_text(path) {
            Ok(text) => Some(text),
            Err(error) => {
                log::debug!(
                    "parser {} failed on {}: {}",
                    parser.name(),
                    path.display(),
                    error
                );
                None
            }
        }
    }
}

impl Default for ContentParserRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Truncates to at most `max_chars` characters, respecting char
/// boundaries.
pub(crate) fn truncate_to_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeParser {
        name: &'static str,
        extensions: &'static [&'static str],
        priority: i32,
    }

    impl ContentParser for FakeParser {
        fn name(&self) -> &str {
            self.name
        }
        fn can_parse(&self, path: &Path) -> bool {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            self.extensions.contains(&ext.as_str())
        }
        fn extensions(&self) -> &[&str] {
            self.extensions
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn extract_text(&self, _path: &Path) -> Result<String> {
            Ok(self.name.to_string())
        }
    }

    struct FakeProvider(Vec<Arc<dyn ContentParser>>);

    impl ParserProvider for FakeProvider {
        fn parsers(&self) -> Vec<Arc<dyn ContentParser>> {
            self.0.clone()
        }
    }

    #[test]
    fn higher_priority_parser_wins() {
        let registry = ContentParserRegistry::new();
        registry.register(Arc::new(FakeParser {
            name: "low",
            extensions: &["txt"],
            priority: 1,
        }));
        registry.register(Arc::new(FakeParser {
            name: "high",
            extensions: &["txt"],
            priority: 9,
        }));

        let parser = registry.parser_for(Path::new("note.txt")).unwrap();
        assert_eq!(parser.name(), "high");
    }

    #[test]
    fn builtins_win_over_provider_parsers() {
        let registry = ContentParserRegistry::new();
        registry.register(Arc::new(FakeParser {
            name: "builtin",
            extensions: &["txt"],
            priority: 1,
        }));
        registry.set_provider(Arc::new(FakeProvider(vec![Arc::new(FakeParser {
            name: "plugin",
            extensions: &["txt"],
            priority: 100,
        })])));

        let parser = registry.parser_for(Path::new("note.txt")).unwrap();
        assert_eq!(parser.name(), "builtin");
    }

    #[test]
    fn provider_covers_unclaimed_extensions() {
        let registry = ContentParserRegistry::new();
        registry.set_provider(Arc::new(FakeProvider(vec![Arc::new(FakeParser {
            name: "plugin",
            extensions: &["weird"],
            priority: 1,
        })])));

        assert!(registry.parser_for(Path::new("data.weird")).is_some());
        assert!(registry.parser_for(Path::new("data.none")).is_none());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_to_chars("héllo", 2), "hé");
        assert_eq!(truncate_to_chars("abc", 10), "abc");
    }
}
