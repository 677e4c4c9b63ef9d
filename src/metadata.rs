//! Persistent metadata store.
//!
//! The store is a single JSON document of the form
//! `{"files": [{"filename", "path", "timestamp", "copied", "hash"}, ...]}`.
//! Records are kept as an ordered list with an in-memory index by path that
//! is rebuilt on load and never written out.
//!
//! Loading fails softly: a missing, unreadable or corrupt document yields an
//! empty store and a warning. An unreadable document is moved aside to
//! `<path>.corrupt` before the store is first persisted over it. Persisting
//! writes a temporary sibling file and renames it over the document, so
//! readers never see a half-written file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// Metadata for one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Display name; becomes the destination basename once the file is settled
    pub filename: String,
    /// Absolute source path, the record's identity
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub copied: bool,
    /// SHA-256 of the contents, hex encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl FileRecord {
    pub fn new(path: PathBuf, timestamp: DateTime<Utc>, hash: Option<String>) -> Self {
        let filename = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            filename,
            path,
            timestamp,
            copied: false,
            hash,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetadataDocument {
    #[serde(default)]
    files: Vec<FileRecord>,
}

#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    records: Vec<FileRecord>,
    index: HashMap<PathBuf, usize>,
    // A document existed at `path` but could not be read or parsed
    load_failed: bool,
    modified: bool,
}

impl MetadataStore {
    /// Creates an empty store that persists to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
            index: HashMap::new(),
            load_failed: false,
            modified: false,
        }
    }

    fn unreadable(path: PathBuf) -> Self {
        Self {
            load_failed: true,
            ..Self::new(path)
        }
    }

    /// Loads the store at `path`. Never fails: read or parse problems are
    /// logged and an empty store is returned.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No metadata store at {}, starting empty", path.display());
                return Self::new(path);
            }
            Err(e) => {
                tracing::warn!(
                    "Could not read metadata store {}: {}; starting empty",
                    path.display(),
                    e
                );
                return Self::unreadable(path);
            }
        };

        match serde_json::from_str::<MetadataDocument>(&contents) {
            Ok(document) => {
                let mut store = Self::new(path);
                for record in document.files {
                    store.insert_or_replace(record);
                }
                tracing::debug!("Loaded {} metadata records", store.len());
                store
            }
            Err(e) => {
                tracing::warn!(
                    "Metadata store {} is corrupt ({}); starting empty",
                    path.display(),
                    e
                );
                Self::unreadable(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.index.get(path).map(|&i| &self.records[i])
    }

    /// True once any record was added or changed since the store was created
    /// or loaded. An unmodified store has nothing worth writing back.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// True when a document existed but could not be read or parsed.
    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    /// Merges a freshly scanned record into the store.
    ///
    /// A new path is appended. For a known path the stored `copied` flag and
    /// any stored hash survive; the timestamp and name are refreshed only
    /// while the file has not been settled yet.
    pub fn upsert(&mut self, scanned: FileRecord) {
        self.modified = true;
        match self.index.get(&scanned.path) {
            Some(&i) => {
                let existing = &mut self.records[i];
                if existing.hash.is_none() {
                    existing.hash = scanned.hash;
                }
                if !existing.copied {
                    existing.timestamp = scanned.timestamp;
                    existing.filename = scanned.filename;
                }
            }
            None => {
                self.index.insert(scanned.path.clone(), self.records.len());
                self.records.push(scanned);
            }
        }
    }

    /// Marks `path` as settled under `filename`. Returns false if there is
    /// no record for `path`.
    pub fn mark_copied(&mut self, path: &Path, filename: &str) -> bool {
        match self.index.get(path) {
            Some(&i) => {
                let record = &mut self.records[i];
                record.copied = true;
                record.filename = filename.to_string();
                self.modified = true;
                true
            }
            None => false,
        }
    }

    /// Hashes of every settled record, the seed of a run's duplicate index.
    pub fn settled_hashes(&self) -> HashSet<String> {
        self.records
            .iter()
            .filter(|record| record.copied)
            .filter_map(|record| record.hash.clone())
            .collect()
    }

    /// Serializes the whole store as a pretty-printed document.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct DocumentRef<'a> {
            files: &'a [FileRecord],
        }
        Ok(serde_json::to_vec_pretty(&DocumentRef {
            files: &self.records,
        })?)
    }

    /// Writes the store to its path atomically, first moving an unreadable
    /// document aside.
    pub async fn persist(&mut self) -> Result<()> {
        self.set_aside_unreadable().await?;
        let bytes = self.to_json()?;
        write_atomic(&self.path, &bytes).await
    }

    /// Renames a document that failed to load to `<path>.corrupt` so the
    /// next write cannot destroy it. Does nothing after a clean load.
    pub async fn set_aside_unreadable(&mut self) -> Result<()> {
        if !self.load_failed {
            return Ok(());
        }
        let aside = sibling(&self.path, ".corrupt");
        match fs::rename(&self.path, &aside).await {
            Ok(()) => {
                tracing::warn!(
                    "Moved unreadable metadata store to {}",
                    aside.display()
                );
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.load_failed = false;
        Ok(())
    }

    // Later duplicates of a path in a loaded document replace earlier ones
    fn insert_or_replace(&mut self, record: FileRecord) {
        match self.index.get(&record.path) {
            Some(&i) => self.records[i] = record,
            None => {
                self.index.insert(record.path.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }
}

/// Writes `bytes` to a temporary sibling of `path`, syncs it, then renames it
/// over `path`.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let tmp = sibling(path, ".tmp");

    let mut file = fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
