//! Index snapshot persistence: postcard encoding wrapped in zstd.
//!
//! The snapshot is a single file under the index directory. Loads are
//! forgiving: a missing, corrupt, or version-mismatched snapshot is
//! treated as "no index" (with a log entry), never as a hard error.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::document::IndexedDocument;
use crate::error::{Result, SearchError};

/// Snapshot format version - increment when changing the format.
pub const INDEX_SNAPSHOT_VERSION: u32 = 1;

/// File name of the snapshot inside the index directory.
pub const SNAPSHOT_FILE_NAME: &str = "documents.bin.zst";

/// Zstd compression level for snapshot writes.
const SNAPSHOT_COMPRESSION_LEVEL: i32 = 3;

/// The persisted form of the index.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub version: u32,
    /// Unix seconds of the first successful build.
    pub created_at: u64,
    /// Unix seconds of the most recent build or update.
    pub updated_at: u64,
    pub documents: Vec<IndexedDocument>,
}

/// Returns the snapshot file path for an index directory.
pub fn snapshot_path(index_dir: &Path) -> PathBuf {
    index_dir.join(SNAPSHOT_FILE_NAME)
}

/// Writes a snapshot, creating the index directory if needed.
pub fn write_snapshot(index_dir: &Path, snapshot: &IndexSnapshot) -> Result<()> {
    fs::create_dir_all(index_dir)?;
    let bytes = postcard::to_allocvec(snapshot)
        .map_err(|error| SearchError::Serialization(error.to_string()))?;

    let path = snapshot_path(index_dir);
    let file = File::create(&path)?;
    let writer = BufWriter::new(file);
    let mut encoder = zstd::Encoder::new(writer, SNAPSHOT_COMPRESSION_LEVEL)?;
    encoder.write_all(&bytes)?;
    encoder.finish()?.flush()?;

    log::debug!(
        "wrote index snapshot: {} documents, {}",
        snapshot.documents.len(),
        path.display()
    );
    Ok(())
}

/// Loads the snapshot if one exists and its version matches.
pub fn load_snapshot(index_dir: &Path) -> Option<IndexSnapshot> {
    let path = snapshot_path(index_dir);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(error) if error.kind() == ErrorKind::NotFound => return None,
        Err(error) => {
            log::warn!("unable to open index snapshot {}: {}", path.display(), error);
            return None;
        }
    };

    let mut bytes = Vec::new();
    let mut decoder = match zstd::Decoder::new(BufReader::new(file)) {
        Ok(decoder) => decoder,
        Err(error) => {
            log::warn!("corrupt index snapshot {}: {}", path.display(), error);
            return None;
        }
    };
    if let Err(error) = decoder.read_to_end(&mut bytes) {
        log::warn!("corrupt index snapshot {}: {}", path.display(), error);
        return None;
    }

    let snapshot: IndexSnapshot = match postcard::from_bytes(&bytes) {
        Ok(snapshot) => snapshot,
        Err(error) => {
            log::warn!("undecodable index snapshot {}: {}", path.display(), error);
            return None;
        }
    };

    if snapshot.version != INDEX_SNAPSHOT_VERSION {
        log::warn!(
            "index snapshot version {} != {}, ignoring {}",
            snapshot.version,
            INDEX_SNAPSHOT_VERSION,
            path.display()
        );
        return None;
    }

    Some(snapshot)
}

/// Deletes the snapshot file; missing files are not an error.
pub fn delete_snapshot(index_dir: &Path) -> Result<()> {
    match fs::remove_file(snapshot_path(index_dir)) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error.into()),
    }
}

/// On-disk size of the snapshot file, for status reporting.
pub fn snapshot_size(index_dir: &Path) -> u64 {
    fs::metadata(snapshot_path(index_dir))
        .map(|m| m.len())
        .unwrap_or(0)
}
