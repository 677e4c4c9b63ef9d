//! Metadata generation.
//!
//! Walks a source tree once and builds a [`FileRecord`] for every candidate
//! file: its timestamp (birth time, else modification time) and, optionally,
//! a SHA-256 of its contents. The records are merged into a
//! [`MetadataStore`], which the organize pass later consults.

use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use std::fs::{self, File, Metadata};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;

use crate::collector::{CollectOptions, collect};
use crate::error::Result;
use crate::metadata::{FileRecord, MetadataStore};

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub collect: CollectOptions,
    pub hash: bool,
    /// Birth dates treated as "unknown" and replaced with the scan date
    pub invalid_dates: Vec<NaiveDate>,
}

/// Statistics collected while generating metadata.
#[derive(Debug, Default)]
pub struct ScanStats {
    pub recorded: usize,
    pub hashed: usize,
    pub total_size: u64,
    pub errors: Vec<String>,
}

impl ScanStats {
    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }
}

/// Picks the record timestamp from file metadata.
///
/// Birth time is preferred. A birth time whose date is one of
/// `invalid_dates` is a filesystem placeholder, and `now` is used instead.
pub fn file_timestamp(
    metadata: &Metadata,
    invalid_dates: &[NaiveDate],
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let reported = metadata
        .created()
        .or_else(|_| metadata.modified())
        .map(DateTime::<Utc>::from);

    match reported {
        Ok(timestamp) => normalize_timestamp(timestamp, invalid_dates, now),
        Err(_) => now,
    }
}

pub fn normalize_timestamp(
    timestamp: DateTime<Utc>,
    invalid_dates: &[NaiveDate],
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    if invalid_dates.contains(&timestamp.date_naive()) {
        now
    } else {
        timestamp
    }
}

/// Hex-encoded SHA-256 of the file at `path`, streamed.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::with_capacity(128 * 1024, File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn scan_file(path: &Path, options: &ScanOptions, now: DateTime<Utc>) -> io::Result<(FileRecord, u64)> {
    let metadata = fs::metadata(path)?;
    let timestamp = file_timestamp(&metadata, &options.invalid_dates, now);
    let hash = if options.hash {
        Some(hash_file(path)?)
    } else {
        None
    };
    Ok((FileRecord::new(path.to_path_buf(), timestamp, hash), metadata.len()))
}

/// Scans `root` and merges a record for every collected file into `store`.
///
/// `root` should be absolute; record paths are the collected paths as-is.
/// `progress_callback` is called once per file.
///
/// # Errors
///
/// Fails only if `root` cannot be read. Per-file problems are logged and
/// recorded in [`ScanStats::errors`].
pub async fn generate_metadata<F>(
    root: &Path,
    store: &mut MetadataStore,
    options: &ScanOptions,
    progress_callback: F,
) -> Result<ScanStats>
where
    F: Fn(&Path) + Send + Sync + 'static,
{
    let root = root.to_path_buf();
    let options = options.clone();
    let callback = Arc::new(progress_callback);

    let (records, stats) = task::spawn_blocking(move || -> Result<(Vec<FileRecord>, ScanStats)> {
        let collected = collect(&root, &options.collect)?;
        let now = Utc::now();
        let mut stats = ScanStats::default();
        for error in collected.errors {
            stats.add_error(error);
        }

        let mut records = Vec::with_capacity(collected.files.len());
        for path in collected.files {
            callback(&path);
            match scan_file(&path, &options, now) {
                Ok((record, size)) => {
                    if record.hash.is_some() {
                        stats.hashed += 1;
                    }
                    stats.recorded += 1;
                    stats.total_size += size;
                    records.push(record);
                }
                Err(e) => {
                    tracing::error!("Error reading {}: {}", path.display(), e);
                    stats.add_error(format!("Error reading {}: {}", path.display(), e));
                }
            }
        }
        Ok((records, stats))
    })
    .await??;

    for record in records {
        store.upsert(record);
    }
    Ok(stats)
}

/// Makes `path` absolute without resolving symlinks in the final component.
pub fn absolute_root(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}
