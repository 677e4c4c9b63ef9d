//! File classification.
//!
//! Maps a path to the category that decides its destination folder. Two
//! policies exist: by extension (media class plus extension subfolder, e.g.
//! `images/jpg`) and by a substring of the file name (e.g. everything named
//! `Screenshot*` goes to `screenshots`). Classification never touches the
//! filesystem.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{ClassifyConfig, ClassifyMode};

/// Where an eligible file belongs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Logical group, e.g. "images" or "screenshots"
    pub name: String,
    /// Destination subdirectory relative to the destination root
    pub folder: PathBuf,
}

/// A media class and the extensions (lowercase, no dot) that belong to it.
#[derive(Debug, Clone)]
pub struct MediaClass {
    pub folder: String,
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Classifier {
    ByExtension {
        classes: Vec<MediaClass>,
    },
    ByName {
        pattern: String,
        folder: String,
        case_sensitive: bool,
    },
}

impl Classifier {
    /// Builds the classifier selected by `classify.mode`.
    ///
    /// `categories` maps a media class folder to dot-prefixed extensions, as
    /// stored in the config file.
    pub fn from_config(classify: &ClassifyConfig, categories: &BTreeMap<String, Vec<String>>) -> Self {
        match classify.mode {
            ClassifyMode::Extension => Classifier::ByExtension {
                classes: categories
                    .iter()
                    .map(|(folder, extensions)| MediaClass {
                        folder: folder.clone(),
                        extensions: extensions
                            .iter()
                            .map(|ext| ext.trim_start_matches('.').to_lowercase())
                            .collect(),
                    })
                    .collect(),
            },
            ClassifyMode::Name => Classifier::ByName {
                pattern: classify.name_pattern.clone(),
                folder: classify.name_folder.clone(),
                case_sensitive: classify.case_sensitive,
            },
        }
    }

    /// Returns the category for `path`, or `None` if the file is ineligible.
    ///
    /// # Examples
    ///
    /// ```
    /// use shelve::classifier::{Classifier, MediaClass};
    /// use std::path::{Path, PathBuf};
    ///
    /// let classifier = Classifier::ByExtension {
    ///     classes: vec![MediaClass {
    ///         folder: "images".to_string(),
    ///         extensions: vec!["jpg".to_string()],
    ///     }],
    /// };
    /// let category = classifier.classify(Path::new("/a/photo.JPG")).unwrap();
    /// assert_eq!(category.folder, PathBuf::from("images/jpg"));
    /// assert!(classifier.classify(Path::new("/a/notes.txt")).is_none());
    /// ```
    pub fn classify(&self, path: &Path) -> Option<Category> {
        match self {
            Classifier::ByExtension { classes } => {
                let extension = get_extension(path)?;
                classes
                    .iter()
                    .find(|class| class.extensions.contains(&extension))
                    .map(|class| Category {
                        name: class.folder.clone(),
                        folder: Path::new(&class.folder).join(&extension),
                    })
            }
            Classifier::ByName {
                pattern,
                folder,
                case_sensitive,
            } => {
                let file_name = path.file_name()?.to_string_lossy();
                let matched = if *case_sensitive {
                    file_name.contains(pattern.as_str())
                } else {
                    file_name.to_lowercase().contains(&pattern.to_lowercase())
                };
                matched.then(|| Category {
                    name: folder.clone(),
                    folder: PathBuf::from(folder),
                })
            }
        }
    }
}

/// Extracts the lowercased extension of `path` without its leading dot.
pub fn get_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
}
