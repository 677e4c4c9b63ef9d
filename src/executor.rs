//! Transfer executor.
//!
//! Runs the organize pass over a list of eligible files: each file is looked
//! up in the metadata store, skipped if already settled or a content
//! duplicate, given a dated destination name inside its category folder,
//! resolved against existing files, and moved or copied. Transfers run
//! concurrently up to a fixed limit. A failing file is logged and the batch
//! carries on.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info};

use crate::classifier::Category;
use crate::conflict::{ConflictResolver, Resolution};
use crate::error::Result;
use crate::metadata::{FileRecord, MetadataStore};
use crate::transfer::{TransferMode, transfer_file};

/// A collected file together with its category.
#[derive(Debug, Clone)]
pub struct EligibleFile {
    pub path: PathBuf,
    pub category: Category,
}

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub mode: TransferMode,
    pub concurrency: usize,
    /// Skip files whose content hash is already settled
    pub use_hash: bool,
    /// Persist the store after this many successful transfers
    pub flush_every: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            mode: TransferMode::Move,
            concurrency: 10,
            use_hash: true,
            flush_every: 100,
        }
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Transferred(PathBuf),
    AlreadySettled,
    MissingMetadata,
    Duplicate { bytes: u64 },
    ConflictSkipped,
    Failed(String),
}

/// Emitted once per file as it finishes.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

/// Totals for an organize run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizeSummary {
    pub total: usize,
    pub processed: usize,
    /// Already settled or skipped at a conflict
    pub skipped: usize,
    pub missing_metadata: usize,
    pub duplicates: usize,
    pub bytes_saved: u64,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl OrganizeSummary {
    fn record(&mut self, event: &ProgressEvent) {
        match &event.outcome {
            FileOutcome::Transferred(_) => self.processed += 1,
            FileOutcome::AlreadySettled | FileOutcome::ConflictSkipped => self.skipped += 1,
            FileOutcome::MissingMetadata => self.missing_metadata += 1,
            FileOutcome::Duplicate { bytes } => {
                self.duplicates += 1;
                self.bytes_saved += bytes;
            }
            FileOutcome::Failed(reason) => {
                self.failed += 1;
                self.errors
                    .push(format!("Failed to organize {}: {}", event.path.display(), reason));
            }
        }
    }
}

/// Store shared between workers.
pub type SharedStore = Arc<Mutex<MetadataStore>>;

/// `{YYYY-MM-DD}_{stem}{.ext}` for a record's timestamp.
pub fn destination_name(record: &FileRecord, source: &Path) -> String {
    let date = record.timestamp.format("%Y-%m-%d");
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    match source.extension() {
        Some(ext) => format!("{}_{}.{}", date, stem, ext.to_string_lossy()),
        None => format!("{}_{}", date, stem),
    }
}

pub struct Executor {
    resolver: Arc<ConflictResolver>,
    options: ExecutorOptions,
}

/// Where a content hash stands in the current run.
enum HashClaim {
    /// A file with this content is settled at its destination
    Settled,
    /// A worker is transferring a file with this content. The sender is
    /// dropped once it knows the outcome.
    Pending(watch::Receiver<()>),
}

enum ClaimStep {
    Duplicate,
    Wait(watch::Receiver<()>),
    Claimed(watch::Sender<()>),
}

struct RunState {
    store: SharedStore,
    hashes: Mutex<HashMap<String, HashClaim>>,
    successes: Mutex<usize>,
    flush_lock: Mutex<()>,
}

impl Executor {
    pub fn new(resolver: Arc<ConflictResolver>, options: ExecutorOptions) -> Self {
        Self { resolver, options }
    }

    /// Organizes `files` into `dest_root` and persists the store afterwards.
    ///
    /// `progress_callback` receives one [`ProgressEvent`] per file, in
    /// completion order.
    ///
    /// # Errors
    ///
    /// Per-file problems never fail the run. An error is returned only when the
    /// final flush of the metadata store fails.
    pub async fn run<F>(
        &self,
        files: Vec<EligibleFile>,
        dest_root: &Path,
        store: SharedStore,
        progress_callback: F,
    ) -> Result<OrganizeSummary>
    where
        F: Fn(&ProgressEvent) + Send + Sync,
    {
        let hashes = if self.options.use_hash {
            store
                .lock()
                .await
                .settled_hashes()
                .into_iter()
                .map(|hash| (hash, HashClaim::Settled))
                .collect()
        } else {
            HashMap::new()
        };
        let state = RunState {
            store,
            hashes: Mutex::new(hashes),
            successes: Mutex::new(0),
            flush_lock: Mutex::new(()),
        };

        let mut summary = OrganizeSummary {
            total: files.len(),
            ..OrganizeSummary::default()
        };

        let mut events = stream::iter(files)
            .map(|file| {
                let state = &state;
                async move {
                    let outcome = self.process_file(&file, dest_root, state).await;
                    ProgressEvent {
                        path: file.path,
                        outcome,
                    }
                }
            })
            .buffer_unordered(self.options.concurrency.max(1));

        while let Some(event) = events.next().await {
            progress_callback(&event);
            summary.record(&event);
        }
        drop(events);

        self.flush(&state).await?;
        Ok(summary)
    }

    async fn process_file(
        &self,
        file: &EligibleFile,
        dest_root: &Path,
        state: &RunState,
    ) -> FileOutcome {
        let record = state.store.lock().await.get(&file.path).cloned();
        let Some(record) = record else {
            info!("No metadata for {}, skipping", file.path.display());
            return FileOutcome::MissingMetadata;
        };

        if record.copied {
            debug!("Already settled: {}", file.path.display());
            return FileOutcome::AlreadySettled;
        }

        let claim = match record.hash.as_ref().filter(|_| self.options.use_hash) {
            Some(hash) => match claim_hash(state, hash).await {
                Some(done) => Some((hash.clone(), done)),
                None => {
                    let bytes = fs::metadata(&file.path).await.map(|m| m.len()).unwrap_or(0);
                    info!("Duplicate content, skipping {}", file.path.display());
                    return FileOutcome::Duplicate { bytes };
                }
            },
            None => None,
        };

        let outcome = match self.settle(file, &record, dest_root).await {
            Ok(Some(dest)) => {
                let filename = dest
                    .file_name()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                state.store.lock().await.mark_copied(&file.path, &filename);
                if let Some((hash, done)) = claim {
                    state.hashes.lock().await.insert(hash, HashClaim::Settled);
                    drop(done);
                }
                self.after_success(state).await;
                return FileOutcome::Transferred(dest);
            }
            Ok(None) => {
                info!("Conflict skipped: {}", file.path.display());
                FileOutcome::ConflictSkipped
            }
            Err(e) => {
                error!("Failed to organize {}: {}", file.path.display(), e);
                FileOutcome::Failed(e.to_string())
            }
        };

        // Nothing was settled, so a waiting file with this content may go ahead
        if let Some((hash, done)) = claim {
            state.hashes.lock().await.remove(&hash);
            drop(done);
        }
        outcome
    }

    /// Places one file. `Ok(None)` means the conflict resolver chose to skip.
    async fn settle(
        &self,
        file: &EligibleFile,
        record: &FileRecord,
        dest_root: &Path,
    ) -> Result<Option<PathBuf>> {
        let dir = dest_root.join(&file.category.folder);
        fs::create_dir_all(&dir).await?;

        let candidate = dir.join(destination_name(record, &file.path));
        let (dest, reserved) = match self.resolver.resolve(&file.path, &candidate).await? {
            Resolution::Proceed { path, reserved } => (path, reserved),
            Resolution::Skip => return Ok(None),
        };

        let result = transfer_file(&file.path, &dest, self.options.mode).await;
        self.resolver
            .release(&dest, result.is_err() && reserved)
            .await;
        result?;
        Ok(Some(dest))
    }

    async fn after_success(&self, state: &RunState) {
        let due = {
            let mut successes = state.successes.lock().await;
            *successes += 1;
            *successes % self.options.flush_every.max(1) == 0
        };
        if due {
            if let Err(e) = self.flush(state).await {
                error!("Periodic metadata flush failed: {}", e);
            }
        }
    }

    async fn flush(&self, state: &RunState) -> Result<()> {
        let _guard = state.flush_lock.lock().await;
        let (path, bytes) = {
            let mut store = state.store.lock().await;
            // an unchanged store never overwrites the document it came from
            if !store.is_modified() {
                debug!("Metadata store unchanged, not flushing");
                return Ok(());
            }
            store.set_aside_unreadable().await?;
            (store.path().to_path_buf(), store.to_json()?)
        };
        crate::metadata::write_atomic(&path, &bytes).await?;
        debug!("Flushed metadata store to {}", path.display());
        Ok(())
    }
}

/// Claims `hash` for the calling worker.
///
/// Returns `None` when a file with this content is already settled. If
/// another worker holds the claim, waits for its outcome first, so a file
/// only counts as a duplicate of content that really reached its
/// destination. On success the returned sender must be dropped after the
/// claim has been settled or removed.
async fn claim_hash(state: &RunState, hash: &str) -> Option<watch::Sender<()>> {
    loop {
        let step = {
            let mut hashes = state.hashes.lock().await;
            match hashes.get(hash) {
                Some(HashClaim::Settled) => ClaimStep::Duplicate,
                Some(HashClaim::Pending(rx)) => ClaimStep::Wait(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(());
                    hashes.insert(hash.to_string(), HashClaim::Pending(rx));
                    ClaimStep::Claimed(tx)
                }
            }
        };

        match step {
            ClaimStep::Duplicate => return None,
            ClaimStep::Claimed(tx) => return Some(tx),
            ClaimStep::Wait(mut rx) => {
                // resolves with an error once the claimant drops its sender
                while rx.changed().await.is_ok() {}
            }
        }
    }
}
