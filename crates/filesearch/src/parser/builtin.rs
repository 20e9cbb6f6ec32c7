//! Built-in content parsers.
//!
//! Both built-ins read the file as UTF-8 with lossy conversion, so files
//! with stray invalid bytes still yield searchable text.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::parser::ContentParser;

/// Extensions handled by [`PlainTextParser`]: plain text, markup, data,
/// and common source files.
const PLAIN_TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "log", "csv", "tsv", "json", "xml", "yaml", "yml", "toml", "html",
    "htm", "css", "js", "ts", "rs", "py", "c", "h", "cpp", "hpp", "cs", "java", "go", "rb", "php",
    "sh", "bat", "ps1", "sql",
];

/// Extensions handled by [`ConfigFileParser`].
const CONFIG_EXTENSIONS: &[&str] = &["ini", "cfg", "conf", "env", "properties"];

fn has_listed_extension(path: &Path, list: &[&str]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .map(|ext| list.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn read_lossy(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Catch-all text extractor for plain-text and source files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextParser;

impl ContentParser for PlainTextParser {
    fn name(&self) -> &str {
        "plain-text"
    }

    fn can_parse(&self, path: &Path) -> bool {
        has_listed_extension(path, PLAIN_TEXT_EXTENSIONS)
    }

    fn extensions(&self) -> &[&str] {
        PLAIN_TEXT_EXTENSIONS
    }

    fn priority(&self) -> i32 {
        10
    }

    fn extract_text(&self, path: &Path) -> Result<String> {
        read_lossy(path)
    }
}

/// Extractor for configuration file formats. Higher priority than the
/// plain-text parser so overlapping claims resolve here first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigFileParser;

impl ContentParser for ConfigFileParser {
    fn name(&self) -> &str {
        "config-file"
    }

    fn can_parse(&self, path: &Path) -> bool {
        has_listed_extension(path, CONFIG_EXTENSIONS)
    }

    fn extensions(&self) -> &[&str] {
        CONFIG_EXTENSIONS
    }

    fn priority(&self) -> i32 {
        20
    }

    fn extract_text(&self, path: &Path) -> Result<String> {
        read_lossy(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn plain_text_parser_claims_and_reads() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("note.txt");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"hello world").unwrap();

        let parser = PlainTextParser;
        assert!(parser.can_parse(&path));
        assert!(!parser.can_parse(Path::new("image.png")));
        assert_eq!(parser.extract_text(&path).unwrap(), "hello world");
    }

    #[test]
    fn invalid_utf8_is_read_lossily() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mixed.txt");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"ok \xff bytes").unwrap();

        let text = PlainTextParser.extract_text(&path).unwrap();
        assert!(text.contains("ok"));
        assert!(text.contains("bytes"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(PlainTextParser
            .extract_text(Path::new("/nonexistent/never.txt"))
            .is_err());
    }
}
