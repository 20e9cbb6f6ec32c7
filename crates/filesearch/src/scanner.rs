//! Directory tree scanning with filter predicates.
//!
//! The scanner walks a root depth-first, pruning directories by the
//! include/exclude lists and hidden/system rules, and yields a
//! [`FileDescriptor`] for every file that passes [`FileScanner::matches`].
//! Sibling directories are walked in parallel via rayon.
//!
//! Unreadable directories (access denied, vanished mid-walk) are skipped
//! silently; partial results are acceptable. Cancellation is checked at
//! directory-entry boundaries and yields whatever was collected so far.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::cancel::CancellationToken;
use crate::types::{platform_attributes, FileAttributes, FileDescriptor, SearchOptions};

/// Stateless scanner; all behavior comes from the options passed per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileScanner;

impl FileScanner {
    pub fn new() -> Self {
        Self
    }

    /// Walks `root` and returns descriptors for every file matching the
    /// option predicates. A cancelled walk returns the partial set.
    pub fn scan(
        &self,
        root: &Path,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Vec<FileDescriptor> {
        walk(root, options, cancel)
    }

    /// Applies the per-file predicates: size bounds, modified-time bounds,
    /// hidden/system attributes, and extension include/exclude sets.
    pub fn matches(&self, descriptor: &FileDescriptor, options: &SearchOptions) -> bool {
        if let Some(min) = options.min_size {
            if descriptor.size < min {
                return false;
            }
        }
        if let Some(max) = options.max_size {
            if descriptor.size > max {
                return false;
            }
        }

        if options.modified_after.is_some() || options.modified_before.is_some() {
            let Some(modified) = descriptor.modified else {
                return false;
            };
            if let Some(after) = options.modified_after {
                if modified < after {
                    return false;
                }
            }
            if let Some(before) = options.modified_before {
                if modified > before {
                    return false;
                }
            }
        }

        if descriptor.is_hidden() && !options.include_hidden {
            return false;
        }
        if descriptor.is_system() && !options.include_system {
            return false;
        }

        if !options.include_extensions.is_empty()
            && !extension_listed(&descriptor.extension, &options.include_extensions)
        {
            return false;
        }
        if extension_listed(&descriptor.extension, &options.exclude_extensions) {
            return false;
        }

        true
    }
}

/// True when a directory should be visited at all, per the include/exclude
/// directory lists. Matching is case-insensitive substring on the full path.
pub(crate) fn directory_allowed(path: &Path, options: &SearchOptions) -> bool {
    let lowered = path.to_string_lossy().to_lowercase();
    if options
        .exclude_directories
        .iter()
        .any(|excluded| lowered.contains(&excluded.to_lowercase()))
    {
        return false;
    }
    if !options.include_directories.is_empty()
        && !options
            .include_directories
            .iter()
            .any(|included| lowered.contains(&included.to_lowercase()))
    {
        return false;
    }
    true
}

fn extension_listed(extension: &str, list: &[String]) -> bool {
    list.iter()
        .any(|entry| entry.trim_start_matches('.').eq_ignore_ascii_case(extension))
}


fn walk(dir: &Path, options: &SearchOptions, cancel: &CancellationToken) -> Vec<FileDescriptor> {
    if cancel.is_cancelled().is_none() {
        return Vec::new();
    }
    if !directory_allowed(dir, options) {
        return Vec::new();
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) => {
            // Access denied / not found: skip, partial results are fine.
            log::debug!("skipping unreadable directory {}: {}", dir.display(), error);
            return Vec::new();
        }
    };

    let scanner = FileScanner::new();
    let mut files = Vec::new();
    let mut subdirs: Vec<PathBuf> = Vec::new();

    for (i, entry) in entries.flatten().enumerate() {
        if cancel.is_cancelled_sparse(i.wrapping_add(1)).is_none() {
            return files;
        }

        let path = entry.path();
        let Ok(metadata) = entry.metadata() else {
            continue;
        };

        if metadata.is_dir() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let attributes = platform_attributes(&name, &metadata);
            if attributes.contains(FileAttributes::HIDDEN) && !options.include_hidden {
                continue;
            }
            if attributes.contains(FileAttributes::SYSTEM) && !options.include_system {
                continue;
            }
            subdirs.push(path);
        } else if metadata.is_file() {
            let descriptor = FileDescriptor::from_metadata(&path, &metadata);
            if scanner.matches(&descriptor, options) {
                files.push(descriptor);
            }
        }
        // Symlinks and special files are not followed.
    }

    // Recurse into sibling directories in parallel.
    let nested: Vec<FileDescriptor> = subdirs
        .par_iter()
        .flat_map(|subdir| walk(subdir, options, cancel))
        .collect();
    files.extend(nested);
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn scan_collects_files_recursively() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "a.txt", "alpha");
        fs::create_dir(tmp.path().join("sub")).unwrap();
        write_file(&tmp.path().join("sub"), "b.txt", "beta");

        let scanner = FileScanner::new();
        let found = scanner.scan(
            tmp.path(),
            &SearchOptions::default(),
            &CancellationToken::new(),
        );
        let mut names: Vec<_> = found.iter().map(|f| f.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn excluded_directories_are_pruned() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("keep")).unwrap();
        fs::create_dir(tmp.path().join("node_modules")).unwrap();
        write_file(&tmp.path().join("keep"), "a.txt", "x");
        write_file(&tmp.path().join("node_modules"), "b.txt", "x");

        let options = SearchOptions {
            exclude_directories: vec!["node_modules".into()],
            ..SearchOptions::default()
        };
        let found = FileScanner::new().scan(tmp.path(), &options, &CancellationToken::new());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "a.txt");
    }

    #[test]
    fn hidden_files_are_skipped_unless_included() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), ".hidden.txt", "x");
        write_file(tmp.path(), "plain.txt", "x");

        let scanner = FileScanner::new();
        let default = scanner.scan(
            tmp.path(),
            &SearchOptions::default(),
            &CancellationToken::new(),
        );
        assert_eq!(default.len(), 1);
        assert_eq!(default[0].name, "plain.txt");

        let with_hidden = scanner.scan(
            tmp.path(),
            &SearchOptions {
                include_hidden: true,
                ..SearchOptions::default()
            },
            &CancellationToken::new(),
        );
        assert_eq!(with_hidden.len(), 2);
    }

    #[test]
    fn extension_filters_apply() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "a.txt", "x");
        write_file(tmp.path(), "b.log", "x");

        let scanner = FileScanner::new();
        let only_txt = scanner.scan(
            tmp.path(),
            &SearchOptions {
                include_extensions: vec![".TXT".into()],
                ..SearchOptions::default()
            },
            &CancellationToken::new(),
        );
        assert_eq!(only_txt.len(), 1);
        assert_eq!(only_txt[0].extension, "txt");

        let no_log = scanner.scan(
            tmp.path(),
            &SearchOptions {
                exclude_extensions: vec!["log".into()],
                ..SearchOptions::default()
            },
            &CancellationToken::new(),
        );
        assert_eq!(no_log.len(), 1);
        assert_eq!(no_log[0].name, "a.txt");
    }

    #[test]
    fn size_bounds_apply() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "small.txt", "ab");
        write_file(tmp.path(), "large.txt", "abcdefghij");

        let options = SearchOptions {
            min_size: Some(5),
            ..SearchOptions::default()
        };
        let found = FileScanner::new().scan(tmp.path(), &options, &CancellationToken::new());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "large.txt");
    }

    #[test]
    fn cancelled_scan_returns_subset() {
        let tmp = tempfile::tempdir().unwrap();
        for i in 0..20 {
            write_file(tmp.path(), &format!("f{i}.txt"), "x");
        }
        let cancel = CancellationToken::new();
        cancel.cancel();
        let found = FileScanner::new().scan(tmp.path(), &SearchOptions::default(), &cancel);
        assert!(found.len() <= 20);
    }
}
