//! Command-line interface definitions.
//!
//! This module defines the CLI structure using clap, including all commands
//! and their arguments, and folds command-line overrides into the loaded
//! [`Config`].

use crate::config::{ClassifyMode, Config};
use crate::conflict::ConflictAction;
use crate::transfer::TransferMode;
use crate::tui::BANNER;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shelve")]
#[command(about = "Resumable, duplicate-aware media organizer")]
#[command(before_help = BANNER)]
#[command(version)]
pub struct Args {
    /// Config file to use instead of ~/.config/shelve/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record timestamps and content hashes for every file under SOURCE
    Scan {
        /// Directory to scan
        source: PathBuf,

        /// Metadata file to write (default: metadata.json)
        metadata: Option<PathBuf>,

        /// Skip content hashing (disables duplicate detection)
        #[arg(long)]
        no_hash: bool,
    },
    /// Move or copy scanned media from SOURCE into DEST by type and date
    Organize(OrganizeArgs),
}

#[derive(ClapArgs)]
pub struct OrganizeArgs {
    /// Directory to organize from
    pub source: PathBuf,

    /// Destination root
    pub dest: PathBuf,

    /// Metadata file produced by `shelve scan`
    #[arg(short, long)]
    pub metadata: Option<PathBuf>,

    /// Copy files instead of moving them
    #[arg(long, conflicts_with = "move_files")]
    pub copy: bool,

    /// Move files (rename where possible)
    #[arg(long = "move", id = "move_files")]
    pub move_files: bool,

    /// Select files whose name contains PATTERN instead of by extension
    #[arg(long, value_name = "PATTERN")]
    pub by_name: Option<String>,

    /// Destination folder for files selected with --by-name
    #[arg(long, requires = "by_name")]
    pub folder: Option<String>,

    /// Match --by-name case-insensitively
    #[arg(long, requires = "by_name")]
    pub ignore_case: bool,

    /// What to do when a destination already exists (default: ask)
    #[arg(long, value_enum)]
    pub on_conflict: Option<ConflictArg>,

    /// Ignore content hashes (disables duplicate detection)
    #[arg(long)]
    pub no_hash: bool,

    /// Maximum concurrent transfers
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Write a text log file summarizing the run
    #[arg(long)]
    pub log: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ConflictArg {
    Skip,
    Replace,
    Suffix,
}

impl From<ConflictArg> for ConflictAction {
    fn from(arg: ConflictArg) -> Self {
        match arg {
            ConflictArg::Skip => ConflictAction::Skip,
            ConflictArg::Replace => ConflictAction::Replace,
            ConflictArg::Suffix => ConflictAction::Suffix,
        }
    }
}

impl OrganizeArgs {
    /// Applies command-line overrides on top of `config`.
    pub fn apply_to(&self, config: &mut Config) {
        if self.copy {
            config.transfer.mode = TransferMode::Copy;
        } else if self.move_files {
            config.transfer.mode = TransferMode::Move;
        }
        if let Some(pattern) = &self.by_name {
            config.classify.mode = ClassifyMode::Name;
            config.classify.name_pattern = pattern.clone();
            if let Some(folder) = &self.folder {
                config.classify.name_folder = folder.clone();
            }
            if self.ignore_case {
                config.classify.case_sensitive = false;
            }
        }
        if let Some(action) = self.on_conflict {
            config.conflict.default_action = Some(action.into());
        }
        if self.no_hash {
            config.transfer.hash = false;
        }
        if let Some(concurrency) = self.concurrency {
            config.transfer.max_concurrent_transfers = concurrency;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_organize_requires_two_paths() {
        assert!(Args::try_parse_from(["shelve", "organize", "/src"]).is_err());
        assert!(Args::try_parse_from(["shelve", "organize", "/src", "/out"]).is_ok());
    }

    #[test]
    fn test_scan_metadata_is_optional() {
        let args = Args::try_parse_from(["shelve", "scan", "/src"]).unwrap();
        match args.command {
            Commands::Scan { metadata, .. } => assert!(metadata.is_none()),
            _ => panic!("expected scan"),
        }
        assert!(Args::try_parse_from(["shelve", "scan"]).is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let args = Args::try_parse_from([
            "shelve",
            "organize",
            "/src",
            "/out",
            "--copy",
            "--by-name",
            "Screenshot",
            "--folder",
            "shots",
            "--ignore-case",
            "--on-conflict",
            "suffix",
            "--no-hash",
            "-j",
            "4",
        ])
        .unwrap();
        let Commands::Organize(organize) = args.command else {
            panic!("expected organize");
        };

        let mut config = Config::default();
        organize.apply_to(&mut config);

        assert_eq!(config.transfer.mode, TransferMode::Copy);
        assert_eq!(config.classify.mode, ClassifyMode::Name);
        assert_eq!(config.classify.name_pattern, "Screenshot");
        assert_eq!(config.classify.name_folder, "shots");
        assert!(!config.classify.case_sensitive);
        assert_eq!(config.conflict.default_action, Some(ConflictAction::Suffix));
        assert!(!config.transfer.hash);
        assert_eq!(config.transfer.max_concurrent_transfers, 4);
    }

    #[test]
    fn test_copy_and_move_conflict() {
        assert!(
            Args::try_parse_from(["shelve", "organize", "/a", "/b", "--copy", "--move"]).is_err()
        );
    }
}
