//! # shelve - resumable media organizer
//!
//! shelve files photos and videos from a source tree into a destination tree
//! organized by type, naming every file after the day it was taken. A
//! metadata store recorded by a separate scan pass makes the organize pass
//! resumable and idempotent, and content hashes let it skip byte-identical
//! duplicates.
//!
//! ## Command Line Usage
//!
//! ```bash
//! # Record timestamps and hashes for everything under ~/Camera
//! shelve scan ~/Camera metadata.json
//!
//! # Move images and videos into ~/Library/images/jpg/2022-03-01_IMG_0001.jpg etc.
//! shelve organize ~/Camera ~/Library --metadata metadata.json
//!
//! # Copy screenshots into a single folder, numbering clashing names
//! shelve organize ~/Desktop ~/Pictures --by-name Screenshot --folder screenshots \
//!     --copy --on-conflict suffix
//! ```
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use shelve::classifier::Classifier;
//! use shelve::collector::{collect_files, CollectOptions};
//! use shelve::config::Config;
//! use shelve::conflict::{ConflictAction, ConflictResolver, FixedDecision};
//! use shelve::executor::{EligibleFile, Executor, ExecutorOptions};
//! use shelve::metadata::MetadataStore;
//! use std::path::Path;
//! use std::sync::Arc;
//! use tokio::sync::Mutex;
//!
//! #[tokio::main]
//! async fn main() -> color_eyre::Result<()> {
//!     let config = Config::default();
//!     let classifier = Classifier::from_config(&config.classify, &config.categories);
//!     let store = MetadataStore::load("metadata.json").await;
//!
//!     let collected = collect_files(Path::new("/mnt/camera"), &CollectOptions::default()).await?;
//!     let eligible = collected
//!         .files
//!         .into_iter()
//!         .filter_map(|path| classifier.classify(&path).map(|category| EligibleFile { path, category }))
//!         .collect();
//!
//!     let resolver = Arc::new(ConflictResolver::new(
//!         Arc::new(FixedDecision(ConflictAction::Suffix)),
//!         config.conflict.max_suffix_attempts,
//!     ));
//!     let summary = Executor::new(resolver, ExecutorOptions::default())
//!         .run(eligible, Path::new("/srv/library"), Arc::new(Mutex::new(store)), |_| {})
//!         .await?;
//!
//!     println!("Organized {} files, {} duplicates", summary.processed, summary.duplicates);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! shelve uses a TOML configuration file located at `~/.config/shelve/config.toml`.
//! On first run, a default configuration is created automatically.
//!
//! ## Module Organization
//!
//! - [`classifier`]: Category and destination folder for a path
//! - [`cli`]: Command-line argument parsing
//! - [`collector`]: Source tree traversal
//! - [`config`]: Configuration management
//! - [`conflict`]: Destination conflict resolution
//! - [`error`]: Error types
//! - [`executor`]: Concurrent organize pass
//! - [`logging`]: Tracing setup
//! - [`metadata`]: Persistent metadata store
//! - [`organize`]: Command handlers
//! - [`report`]: Run log files
//! - [`scan`]: Metadata generation
//! - [`transfer`]: Single-file move and copy
//! - [`tui`]: Terminal user interface components

pub mod classifier;
pub mod cli;
pub mod collector;
pub mod config;
pub mod conflict;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metadata;
pub mod organize;
pub mod report;
pub mod scan;
pub mod transfer;
pub mod tui;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, ShelveError};
pub use executor::OrganizeSummary;
pub use metadata::{FileRecord, MetadataStore};
