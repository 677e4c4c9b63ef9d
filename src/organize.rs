//! Command handlers.
//!
//! Wires configuration, the metadata store, the collector, the classifier,
//! the conflict resolver and the executor together for the `scan` and
//! `organize` commands, and renders progress and results on the terminal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::classifier::Classifier;
use crate::collector::{CollectOptions, collect_files};
use crate::config::Config;
use crate::conflict::{ConflictResolver, decision_provider};
use crate::executor::{EligibleFile, Executor, ExecutorOptions, FileOutcome, OrganizeSummary};
use crate::metadata::MetadataStore;
use crate::report::write_organize_log;
use crate::scan::{ScanOptions, absolute_root, generate_metadata};
use crate::tui::{Mode, UI};

/// Resolves and checks a source directory. An unreadable root is fatal.
pub fn validate_source_path(source: &Path) -> color_eyre::Result<PathBuf> {
    let path = absolute_root(source)?;
    if !path.is_dir() {
        color_eyre::eyre::bail!("Source is not a readable directory: {}", path.display());
    }
    Ok(path)
}

pub async fn handle_scan(
    source: &Path,
    metadata: Option<PathBuf>,
    no_hash: bool,
    config: &Config,
) -> color_eyre::Result<()> {
    config.validate()?;

    let source_path = validate_source_path(source)?;
    let metadata_path = metadata.unwrap_or_else(|| config.metadata.default_file.clone());

    let ui = UI::new().with_color_theme(config.ui.color.theme.clone());
    ui.print_banner_with_mode(&Mode::Scan)?;
    ui.print_info(&format!("Source: {}", source_path.display()))?;

    let mut store = MetadataStore::load(&metadata_path).await;
    let options = ScanOptions {
        collect: CollectOptions::from(&config.scan),
        hash: config.transfer.hash && !no_hash,
        invalid_dates: config.metadata.invalid_dates.clone(),
    };

    let spinner = ui.create_spinner("Scanning and hashing...");
    let stats = generate_metadata(&source_path, &mut store, &options, {
        let spinner = spinner.clone();
        move |path: &Path| spinner.set_message(path.display().to_string())
    })
    .await?;
    spinner.finish_and_clear();

    store.persist().await?;

    ui.print_scan_summary(&stats)?;
    ui.print_success(&format!(
        "Metadata written to {} ({} records)",
        metadata_path.display(),
        store.len()
    ))?;
    ui.cleanup()?;
    Ok(())
}

pub async fn handle_organize(
    source: &Path,
    dest: &Path,
    metadata: Option<PathBuf>,
    write_log: bool,
    config: &Config,
) -> color_eyre::Result<()> {
    config.validate()?;

    // Everything that can be misconfigured is checked before touching files
    let source_path = validate_source_path(source)?;
    let dest_path = absolute_root(dest)?;
    let metadata_path = metadata.unwrap_or_else(|| config.metadata.default_file.clone());
    let provider = decision_provider(
        config.conflict.default_action,
        UI::is_interactive(),
        &config.ui.color.theme,
    )?;
    let classifier = Classifier::from_config(&config.classify, &config.categories);

    let ui = UI::new().with_color_theme(config.ui.color.theme.clone());
    ui.print_banner_with_mode(&Mode::Organize)?;
    ui.print_info(&format!(
        "Source: {} → Destination: {} ({})",
        source_path.display(),
        dest_path.display(),
        config.transfer.mode.as_str()
    ))?;

    let store = MetadataStore::load(&metadata_path).await;
    if store.is_empty() {
        ui.print_warning("Metadata store is empty; run `shelve scan` first")?;
    }

    ui.print_info("Phase 1/2: Collecting source files")?;
    let collected = collect_files(&source_path, &CollectOptions::from(&config.scan)).await?;
    let eligible: Vec<EligibleFile> = collected
        .files
        .into_iter()
        .filter_map(|path| {
            classifier
                .classify(&path)
                .map(|category| EligibleFile { path, category })
        })
        .collect();
    ui.print_success(&format!("{} eligible files", eligible.len()))?;

    ui.print_info("Phase 2/2: Organizing")?;
    let pb = ui.create_progress_bar(eligible.len() as u64, "Organizing");

    let resolver = Arc::new(ConflictResolver::new(
        provider,
        config.conflict.max_suffix_attempts,
    ));
    let executor = Executor::new(
        resolver,
        ExecutorOptions {
            mode: config.transfer.mode,
            concurrency: config.transfer.max_concurrent_transfers,
            use_hash: config.transfer.hash,
            flush_every: config.transfer.flush_every,
        },
    );
    let store = Arc::new(Mutex::new(store));

    let summary = executor
        .run(eligible, &dest_path, store, {
            let pb = pb.clone();
            move |event: &crate::executor::ProgressEvent| {
                pb.inc(1);
                if let FileOutcome::Failed(reason) = &event.outcome {
                    pb.println(format!("failed: {} ({})", event.path.display(), reason));
                }
            }
        })
        .await?;
    pb.finish_and_clear();

    report_summary(&ui, &summary, collected.errors.len())?;

    if write_log {
        let log_dir = std::env::current_dir()?;
        match write_organize_log(&log_dir, &source_path, &dest_path, &summary, &collected.errors)
            .await
        {
            Ok(path) => ui.print_success(&format!("Log written to: {}", path.display()))?,
            Err(e) => ui.print_warning(&format!("Failed to write log file: {}", e))?,
        }
    }

    ui.cleanup()?;
    Ok(())
}

fn report_summary(ui: &UI, summary: &OrganizeSummary, traversal_errors: usize) -> std::io::Result<()> {
    ui.print_organize_summary(summary)?;

    if traversal_errors > 0 {
        ui.print_warning(&format!(
            "{} director(ies) could not be read and were skipped",
            traversal_errors
        ))?;
    }
    if summary.missing_metadata > 0 {
        ui.print_warning(&format!(
            "{} file(s) have no metadata; run `shelve scan` on the source first",
            summary.missing_metadata
        ))?;
    }
    if summary.failed > 0 {
        ui.print_error(&format!(
            "{} file(s) failed to transfer (permission denied or I/O error)",
            summary.failed
        ))?;
        for error in &summary.errors {
            ui.print_error(error)?;
        }
    }
    ui.print_success("Organize complete")
}
