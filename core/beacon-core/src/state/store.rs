//! Directory-backed session store.
//!
//! One JSON file per identity key:
//!
//! ```text
//! sessions/
//! ├── 48213.json                 # keyed by pid
//! ├── 9f1c2e0a-...json           # keyed by session id (no pid known)
//! └── 48213.json.Xa9f2k.tmp      # write in progress, never listed
//! ```
//!
//! # Atomic Writes
//!
//! `put` writes the serialized record into a sibling temp file and renames it
//! onto `<key>.json`. The rename is the only step that makes content visible,
//! so a reader sees either the previous record or the new one, never a
//! partial file. No locks are taken anywhere.
//!
//! # Tolerant Reads
//!
//! `list` skips temp files, foreign files, and anything that fails to read or
//! parse. A file vanishing between the directory scan and the read is a normal
//! race with a concurrent delete and is skipped silently.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs_err as fs;
use tempfile::NamedTempFile;

use crate::error::{BeaconError, Result};
use crate::storage::StorageConfig;

use super::types::SessionRecord;

const RECORD_EXTENSION: &str = "json";
const TEMP_SUFFIX: &str = ".tmp";

/// Strips path-traversal sequences and leading dots from an externally supplied key.
///
/// Leading dots would make the record file hidden, and hidden files are never listed.
pub fn sanitize_key(raw: &str) -> Result<String> {
    let cleaned = raw.replace("..", "").replace(['/', '\\'], "");
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        return Err(BeaconError::InvalidKey(raw.to_string()));
    }
    Ok(cleaned)
}

fn is_record_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') || name.ends_with(TEMP_SUFFIX) {
        return false;
    }
    path.extension().is_some_and(|ext| ext == RECORD_EXTENSION)
}

fn read_record(path: &Path) -> Result<SessionRecord> {
    let content = fs::read_to_string(path).map_err(|source| BeaconError::Io {
        context: "reading session record".to_string(),
        source,
    })?;
    SessionRecord::from_json(&content).map_err(|source| BeaconError::RecordCorrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn is_not_found(err: &BeaconError) -> bool {
    matches!(err, BeaconError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_storage(storage: &StorageConfig) -> Self {
        Self::new(storage.sessions_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the store directory (owner-only) if it does not exist.
    pub fn ensure_dir(&self) -> Result<()> {
        if self.dir.is_dir() {
            return Ok(());
        }
        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder
            .create(&self.dir)
            .map_err(|source| BeaconError::StoreUnavailable {
                path: self.dir.clone(),
                source,
            })
    }

    /// Final path for `key` after sanitization.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let key = sanitize_key(key)?;
        Ok(self.dir.join(format!("{key}.{RECORD_EXTENSION}")))
    }

    /// Serializes `record` into a temp sibling of its final path.
    ///
    /// Nothing is visible to readers until [`StagedWrite::commit`].
    pub fn stage(&self, key: &str, record: &SessionRecord) -> Result<StagedWrite> {
        let target = self.path_for(key)?;
        let json = record.to_json()?;
        self.ensure_dir()?;

        let write_failed = |source: io::Error| BeaconError::WriteFailed {
            path: target.clone(),
            source,
        };

        let prefix = format!(
            "{}.",
            target
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(RECORD_EXTENSION)
        );
        let mut temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.dir)
            .map_err(write_failed)?;
        temp.write_all(json.as_bytes()).map_err(write_failed)?;
        temp.flush().map_err(write_failed)?;
        temp.as_file().sync_all().map_err(write_failed)?;

        Ok(StagedWrite { temp, target })
    }

    /// Atomically replaces the record stored under `key`.
    pub fn put(&self, key: &str, record: &SessionRecord) -> Result<()> {
        self.stage(key, record)?.commit()
    }

    /// Reads one record. A missing file is `Ok(None)`.
    pub fn get(&self, key: &str) -> Result<Option<SessionRecord>> {
        let path = self.path_for(key)?;
        match read_record(&path) {
            Ok(record) => Ok(Some(record)),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Every readable record, keyed by file stem.
    ///
    /// Fails only when the directory itself cannot be read.
    pub fn try_list(&self) -> Result<Vec<(String, SessionRecord)>> {
        let entries = fs::read_dir(&self.dir).map_err(|source| BeaconError::StoreUnavailable {
            path: self.dir.clone(),
            source,
        })?;

        let records = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_record_file(path))
            .filter_map(|path| {
                let key = path.file_stem()?.to_str()?.to_string();
                match read_record(&path) {
                    Ok(record) => Some((key, record)),
                    Err(err) if is_not_found(&err) => None,
                    Err(err) => {
                        tracing::debug!(path = %path.display(), error = %err, "Skipping unreadable session record");
                        None
                    }
                }
            })
            .collect();

        Ok(records)
    }

    /// Like [`SessionStore::try_list`], degrading to empty when the store is unavailable.
    pub fn list(&self) -> Vec<(String, SessionRecord)> {
        match self.try_list() {
            Ok(records) => records,
            Err(err) => {
                tracing::debug!(error = %err, "Session store unavailable; treating as empty");
                Vec::new()
            }
        }
    }

    /// Deletes the record under `key`. Returns false if it was already gone.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(BeaconError::Io {
                context: format!("removing session record {}", path.display()),
                source,
            }),
        }
    }
}

/// A fully written temp file waiting to be renamed into place.
#[derive(Debug)]
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Renames the temp file onto the target.
    ///
    /// If the rename cannot replace an existing file, the target is deleted
    /// and the rename retried. That fallback is not atomic.
    pub fn commit(self) -> Result<()> {
        let Self { temp, target } = self;
        match temp.persist(&target) {
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::debug!(path = %target.display(), error = %err.error, "Rename failed; retrying after delete");
                match std::fs::remove_file(&target) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(source) => return Err(BeaconError::WriteFailed { path: target, source }),
                }
                err.file
                    .persist(&target)
                    .map(|_| ())
                    .map_err(|e| BeaconError::WriteFailed {
                        path: target,
                        source: e.error,
                    })
            }
        }
    }
}
