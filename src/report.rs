//! Run log generation.
//!
//! Writes a plain-text record of an organize run: where files came from and
//! went, the summary counts, and every traversal and per-file error.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::executor::OrganizeSummary;
use crate::tui::summary_rows;

/// Writes `shelve_organize_<timestamp>.txt` into `log_dir`.
///
/// # Returns
///
/// The path where the log file was written
pub async fn write_organize_log(
    log_dir: &Path,
    source: &Path,
    dest: &Path,
    summary: &OrganizeSummary,
    traversal_errors: &[String],
) -> color_eyre::Result<PathBuf> {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_path = log_dir.join(format!("shelve_organize_{}.txt", timestamp));

    let mut content = String::new();
    content.push_str("SHELVE ORGANIZE LOG\n");
    content.push_str(&"═".repeat(70));
    content.push_str("\n\n");

    content.push_str(&format!("Source: {}\n", source.display()));
    content.push_str(&format!("Destination: {}\n", dest.display()));
    content.push_str(&format!(
        "Timestamp: {}\n\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));

    for (label, value) in summary_rows(summary) {
        content.push_str(&format!("{}: {}\n", label, value));
    }

    if !traversal_errors.is_empty() {
        content.push_str("\nTRAVERSAL ERRORS\n");
        content.push_str(&"─".repeat(70));
        content.push('\n');
        for error in traversal_errors {
            content.push_str(&format!("{}\n", error));
        }
    }

    if !summary.errors.is_empty() {
        content.push_str("\nFILE ERRORS\n");
        content.push_str(&"─".repeat(70));
        content.push('\n');
        for error in &summary.errors {
            content.push_str(&format!("{}\n", error));
        }
    }

    content.push('\n');
    content.push_str(&"═".repeat(70));
    content.push_str("\nEnd of log\n");

    let mut file = tokio::fs::File::create(&log_path).await?;
    file.write_all(content.as_bytes()).await?;
    Ok(log_path)
}
