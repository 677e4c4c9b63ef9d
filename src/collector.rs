//! Source tree traversal.
//!
//! Walks a directory tree depth-first and returns every regular file that is
//! a candidate for organizing. Hidden and excluded entries are pruned (never
//! descended into), and unreadable directories are logged and skipped so one
//! bad subtree never stops the walk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::{error, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::ScanConfig;
use crate::error::{Result, ShelveError};

/// Traversal rules.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub hidden_prefix: String,
    pub exclude_names: Vec<String>,
    /// Follow symbolic links. Link cycles are detected and skipped.
    pub follow_symlinks: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            hidden_prefix: ".".to_string(),
            exclude_names: Vec::new(),
            follow_symlinks: false,
        }
    }
}

impl From<&ScanConfig> for CollectOptions {
    fn from(scan: &ScanConfig) -> Self {
        Self {
            hidden_prefix: scan.hidden_prefix.clone(),
            exclude_names: scan.exclude_names.clone(),
            follow_symlinks: scan.follow_symlinks,
        }
    }
}

/// Result of a traversal.
#[derive(Debug, Default)]
pub struct Collected {
    pub files: Vec<PathBuf>,
    /// Subtrees that could not be read, one message each
    pub errors: Vec<String>,
    pub hidden_skipped: usize,
}

impl CollectOptions {
    fn is_pruned(&self, entry: &DirEntry) -> bool {
        // The root is always walked, whatever its name
        if entry.depth() == 0 {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        (!self.hidden_prefix.is_empty() && name.starts_with(self.hidden_prefix.as_str()))
            || self.exclude_names.iter().any(|excluded| *excluded == name)
    }
}

/// Collects candidate files under `root`.
///
/// # Errors
///
/// Returns [`ShelveError::SourceUnreadable`] if `root` itself cannot be read.
/// Errors below the root are logged and recorded in [`Collected::errors`].
///
/// # Examples
///
/// ```no_run
/// use shelve::collector::{collect, CollectOptions};
/// use std::path::Path;
///
/// let collected = collect(Path::new("/mnt/camera"), &CollectOptions::default())?;
/// println!("{} candidate files", collected.files.len());
/// # Ok::<(), shelve::error::ShelveError>(())
/// ```
pub fn collect(root: &Path, options: &CollectOptions) -> Result<Collected> {
    let mut collected = Collected::default();
    let mut hidden_skipped = 0usize;

    let walker = WalkDir::new(root)
        .follow_links(options.follow_symlinks)
        .into_iter()
        .filter_entry(|entry| {
            if options.is_pruned(entry) {
                warn!("Skipping hidden or excluded entry: {}", entry.path().display());
                hidden_skipped += 1;
                false
            } else {
                true
            }
        });

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                collected.files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) if e.depth() == 0 => {
                return Err(ShelveError::SourceUnreadable {
                    path: root.to_path_buf(),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());

                let message = if let Some(ancestor) = e.loop_ancestor() {
                    warn!(
                        "Skipping symlink cycle at {} (points back to {})",
                        path,
                        ancestor.display()
                    );
                    format!("Symlink cycle at {}", path)
                } else if e.io_error().map(|io| io.kind()) == Some(ErrorKind::PermissionDenied) {
                    warn!("Permission denied, skipping {}", path);
                    format!("Permission denied: {}", path)
                } else {
                    error!("Error reading {}: {}", path, e);
                    format!("Error reading {}: {}", path, e)
                };
                collected.errors.push(message);
            }
        }
    }

    collected.hidden_skipped = hidden_skipped;
    Ok(collected)
}

/// Runs [`collect`] on the blocking thread pool.
pub async fn collect_files(root: &Path, options: &CollectOptions) -> Result<Collected> {
    let root = root.to_path_buf();
    let options = options.clone();
    task::spawn_blocking(move || collect(&root, &options)).await?
}
