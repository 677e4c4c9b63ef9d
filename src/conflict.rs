//! Destination conflict resolution.
//!
//! When the destination computed for a file is already taken, the resolver
//! decides whether to skip the file, replace the existing destination, or
//! pick a numbered alternative (`name_1.jpg`, `name_2.jpg`, ...). Decisions
//! come from a pluggable [`DecisionProvider`]: a fixed configured answer or
//! an interactive prompt. A decision can be made sticky for the rest of the
//! run, after which no further questions are asked.
//!
//! Free destinations are claimed with an exclusive create, so two concurrent
//! workers can never be handed the same path. Every path handed out stays
//! in flight until the caller releases it; a Replace aimed at a path that is
//! still in flight gets the next numbered name instead.

use dialoguer::{Confirm, Select};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::sync::Mutex;
use tokio::task;

use crate::error::{Result, ShelveError};
use crate::tui::UI;

/// Answer to a single conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictAction {
    /// Leave the source file where it is
    Skip,
    /// Overwrite the existing destination
    Replace,
    /// Use the next free numbered name
    Suffix,
}

impl ConflictAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictAction::Skip => "skip",
            ConflictAction::Replace => "replace",
            ConflictAction::Suffix => "suffix",
        }
    }
}

/// Describes one conflict to a decision provider.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Supplies conflict decisions. Implementations may block (e.g. on a
/// terminal); the resolver calls them on the blocking thread pool and never
/// runs two calls at once.
pub trait DecisionProvider: Send + Sync {
    fn decide(&self, conflict: &Conflict) -> Result<ConflictAction>;

    /// Whether `action` should be applied to every remaining conflict.
    fn apply_to_all(&self, conflict: &Conflict, action: ConflictAction) -> Result<bool>;
}

/// Always answers with the same action.
#[derive(Debug, Clone, Copy)]
pub struct FixedDecision(pub ConflictAction);

impl DecisionProvider for FixedDecision {
    fn decide(&self, _conflict: &Conflict) -> Result<ConflictAction> {
        Ok(self.0)
    }

    fn apply_to_all(&self, _conflict: &Conflict, _action: ConflictAction) -> Result<bool> {
        Ok(true)
    }
}

/// Asks on the terminal.
pub struct PromptDecision {
    theme: String,
}

impl PromptDecision {
    pub fn new(theme: impl Into<String>) -> Self {
        Self {
            theme: theme.into(),
        }
    }
}

impl DecisionProvider for PromptDecision {
    fn decide(&self, conflict: &Conflict) -> Result<ConflictAction> {
        let theme = UI::get_colorful_theme(&self.theme);
        let choices = [
            ConflictAction::Skip,
            ConflictAction::Replace,
            ConflictAction::Suffix,
        ];
        let labels = ["Skip", "Replace existing file", "Keep both (add suffix)"];

        let selection = Select::with_theme(&theme)
            .with_prompt(format!(
                "{} already exists (from {})",
                conflict.destination.display(),
                conflict.source.display()
            ))
            .items(&labels)
            .default(2)
            .interact()?;

        Ok(choices[selection])
    }

    fn apply_to_all(&self, _conflict: &Conflict, action: ConflictAction) -> Result<bool> {
        let theme = UI::get_colorful_theme(&self.theme);
        Ok(Confirm::with_theme(&theme)
            .with_prompt(format!("Apply '{}' to all remaining conflicts?", action.as_str()))
            .default(false)
            .interact()?)
    }
}

/// Chooses the decision provider for a run.
///
/// A configured default wins. Without one, prompting requires a terminal; a
/// non-interactive run with no default is a configuration error.
pub fn decision_provider(
    default_action: Option<ConflictAction>,
    interactive: bool,
    theme: &str,
) -> Result<Arc<dyn DecisionProvider>> {
    match (default_action, interactive) {
        (Some(action), _) => Ok(Arc::new(FixedDecision(action))),
        (None, true) => Ok(Arc::new(PromptDecision::new(theme))),
        (None, false) => Err(ShelveError::Config(
            "no conflict action configured and no terminal to ask on; \
             pass --on-conflict or set conflict.default_action"
                .to_string(),
        )),
    }
}

/// Terminal state of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Write to `path`, then [`ConflictResolver::release`] it. `reserved`
    /// means the resolver created an empty placeholder there that the caller
    /// must replace or remove.
    Proceed { path: PathBuf, reserved: bool },
    Skip,
}

pub struct ConflictResolver {
    provider: Arc<dyn DecisionProvider>,
    // Holds the sticky action; also serializes prompts
    sticky: Mutex<Option<ConflictAction>>,
    // Destinations handed out and not yet released
    in_flight: Mutex<HashSet<PathBuf>>,
    max_suffix_attempts: u32,
}

impl ConflictResolver {
    pub fn new(provider: Arc<dyn DecisionProvider>, max_suffix_attempts: u32) -> Self {
        Self {
            provider,
            sticky: Mutex::new(None),
            in_flight: Mutex::new(HashSet::new()),
            max_suffix_attempts,
        }
    }

    /// The sticky action, if one has been chosen this run.
    pub async fn sticky_action(&self) -> Option<ConflictAction> {
        *self.sticky.lock().await
    }

    /// Resolves the destination for moving `source` to `destination`.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors while probing destinations, on provider errors, and
    /// with [`ShelveError::SuffixExhausted`] when no numbered name is free.
    pub async fn resolve(&self, source: &Path, destination: &Path) -> Result<Resolution> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if reserve(destination).await? {
                in_flight.insert(destination.to_path_buf());
                return Ok(Resolution::Proceed {
                    path: destination.to_path_buf(),
                    reserved: true,
                });
            }
        }

        let conflict = Conflict {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
        };
        let action = self.decide(conflict).await?;
        tracing::debug!(
            "Conflict at {}: {}",
            destination.display(),
            action.as_str()
        );

        if action == ConflictAction::Skip {
            return Ok(Resolution::Skip);
        }

        let mut in_flight = self.in_flight.lock().await;
        if action == ConflictAction::Replace {
            if in_flight.insert(destination.to_path_buf()) {
                return Ok(Resolution::Proceed {
                    path: destination.to_path_buf(),
                    reserved: false,
                });
            }
            // another transfer is still writing there
            tracing::debug!(
                "{} is in flight, using a numbered name instead",
                destination.display()
            );
        }
        self.next_free(destination, &mut in_flight).await
    }

    /// Marks a destination returned by [`resolve`](Self::resolve) as done.
    /// With `remove_placeholder`, the file at `path` is deleted first, under
    /// the same lock, so no other worker can claim the path in between.
    pub async fn release(&self, path: &Path, remove_placeholder: bool) {
        let mut in_flight = self.in_flight.lock().await;
        if remove_placeholder {
            if let Err(e) = fs::remove_file(path).await {
                tracing::warn!("Could not remove placeholder {}: {}", path.display(), e);
            }
        }
        in_flight.remove(path);
    }

    /// Number of destinations handed out and not yet released.
    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    async fn decide(&self, conflict: Conflict) -> Result<ConflictAction> {
        let mut sticky = self.sticky.lock().await;
        if let Some(action) = *sticky {
            return Ok(action);
        }

        let provider = Arc::clone(&self.provider);
        let (action, for_all) = task::spawn_blocking(move || -> Result<(ConflictAction, bool)> {
            let action = provider.decide(&conflict)?;
            let for_all = provider.apply_to_all(&conflict, action)?;
            Ok((action, for_all))
        })
        .await??;

        if for_all {
            *sticky = Some(action);
        }
        Ok(action)
    }

    async fn next_free(
        &self,
        destination: &Path,
        in_flight: &mut HashSet<PathBuf>,
    ) -> Result<Resolution> {
        for n in 1..=self.max_suffix_attempts {
            let candidate = suffixed(destination, n);
            if reserve(&candidate).await? {
                in_flight.insert(candidate.clone());
                return Ok(Resolution::Proceed {
                    path: candidate,
                    reserved: true,
                });
            }
        }
        Err(ShelveError::SuffixExhausted {
            path: destination.to_path_buf(),
            attempts: self.max_suffix_attempts,
        })
    }
}

/// `dir/name.ext` -> `dir/name_{n}.ext`
pub fn suffixed(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}_{}", stem, n),
    };
    path.with_file_name(name)
}

/// Claims `path` by creating it exclusively. Returns false if it exists.
async fn reserve(path: &Path) -> Result<bool> {
    match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Answers from a script, counts how often it was asked, and tracks how
    /// many questions were open at the same time.
    struct Scripted {
        action: ConflictAction,
        for_all: bool,
        asked: AtomicUsize,
        open: AtomicUsize,
        most_open: AtomicUsize,
    }

    impl Scripted {
        fn new(action: ConflictAction, for_all: bool) -> Arc<Self> {
            Arc::new(Self {
                action,
                for_all,
                asked: AtomicUsize::new(0),
                open: AtomicUsize::new(0),
                most_open: AtomicUsize::new(0),
            })
        }
    }

    impl DecisionProvider for Scripted {
        fn decide(&self, _conflict: &Conflict) -> Result<ConflictAction> {
            self.asked.fetch_add(1, Ordering::SeqCst);
            let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
            self.most_open.fetch_max(open, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            self.open.fetch_sub(1, Ordering::SeqCst);
            Ok(self.action)
        }

        fn apply_to_all(&self, _conflict: &Conflict, _action: ConflictAction) -> Result<bool> {
            Ok(self.for_all)
        }
    }

    fn existing(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"original").unwrap();
        path
    }

    #[test]
    fn test_suffixed() {
        assert_eq!(
            suffixed(Path::new("/out/2022-03-01_photo1.jpg"), 1),
            PathBuf::from("/out/2022-03-01_photo1_1.jpg")
        );
        assert_eq!(suffixed(Path::new("/out/README"), 3), PathBuf::from("/out/README_3"));
    }

    #[tokio::test]
    async fn test_free_destination_proceeds_and_reserves() {
        let temp = TempDir::new().unwrap();
        let resolver = ConflictResolver::new(Arc::new(FixedDecision(ConflictAction::Skip)), 10);
        let dest = temp.path().join("a.jpg");

        let resolution = resolver.resolve(Path::new("/src/a.jpg"), &dest).await.unwrap();

        assert_eq!(
            resolution,
            Resolution::Proceed {
                path: dest.clone(),
                reserved: true
            }
        );
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_suffix_leaves_existing_untouched() {
        let temp = TempDir::new().unwrap();
        let dest = existing(temp.path(), "2022-03-01_photo1.jpg");
        let resolver = ConflictResolver::new(Arc::new(FixedDecision(ConflictAction::Suffix)), 10);

        let resolution = resolver.resolve(Path::new("/src/photo1.jpg"), &dest).await.unwrap();

        assert_eq!(
            resolution,
            Resolution::Proceed {
                path: temp.path().join("2022-03-01_photo1_1.jpg"),
                reserved: true
            }
        );
        assert_eq!(std::fs::read(&dest).unwrap(), b"original");
    }

    #[tokio::test]
    async fn test_suffix_never_collides() {
        let temp = TempDir::new().unwrap();
        let dest = existing(temp.path(), "photo.jpg");
        let resolver = Arc::new(ConflictResolver::new(
            Arc::new(FixedDecision(ConflictAction::Suffix)),
            100,
        ));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let resolver = Arc::clone(&resolver);
            let dest = dest.clone();
            handles.push(tokio::spawn(async move {
                resolver.resolve(Path::new("/src/photo.jpg"), &dest).await
            }));
        }

        let mut paths = HashSet::new();
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                Resolution::Proceed { path, reserved } => {
                    assert!(reserved);
                    assert!(paths.insert(path));
                }
                Resolution::Skip => panic!("suffix must not skip"),
            }
        }
        assert_eq!(paths.len(), 20);
        assert!(!paths.contains(&dest));
    }

    #[tokio::test]
    async fn test_skip_and_replace() {
        let temp = TempDir::new().unwrap();
        let dest = existing(temp.path(), "photo.jpg");

        let skip = ConflictResolver::new(Arc::new(FixedDecision(ConflictAction::Skip)), 10);
        assert_eq!(
            skip.resolve(Path::new("/src/photo.jpg"), &dest).await.unwrap(),
            Resolution::Skip
        );

        let replace = ConflictResolver::new(Arc::new(FixedDecision(ConflictAction::Replace)), 10);
        assert_eq!(
            replace.resolve(Path::new("/src/photo.jpg"), &dest).await.unwrap(),
            Resolution::Proceed {
                path: dest.clone(),
                reserved: false
            }
        );
    }

    #[tokio::test]
    async fn test_sticky_decision_stops_prompting() {
        let temp = TempDir::new().unwrap();
        let dest = existing(temp.path(), "photo.jpg");
        let provider = Scripted::new(ConflictAction::Suffix, true);
        let resolver = ConflictResolver::new(provider.clone(), 10);

        for _ in 0..3 {
            resolver.resolve(Path::new("/src/photo.jpg"), &dest).await.unwrap();
        }

        assert_eq!(provider.asked.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.sticky_action().await, Some(ConflictAction::Suffix));
    }

    #[tokio::test]
    async fn test_without_apply_to_all_every_conflict_is_asked() {
        let temp = TempDir::new().unwrap();
        let dest = existing(temp.path(), "photo.jpg");
        let provider = Scripted::new(ConflictAction::Skip, false);
        let resolver = ConflictResolver::new(provider.clone(), 10);

        for _ in 0..3 {
            resolver.resolve(Path::new("/src/photo.jpg"), &dest).await.unwrap();
        }

        assert_eq!(provider.asked.load(Ordering::SeqCst), 3);
        assert_eq!(resolver.sticky_action().await, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_conflicts_ask_one_at_a_time() {
        let temp = TempDir::new().unwrap();
        let provider = Scripted::new(ConflictAction::Skip, false);
        let resolver = Arc::new(ConflictResolver::new(provider.clone(), 10));

        let mut handles = Vec::new();
        for i in 0..16 {
            let dest = existing(temp.path(), &format!("photo{}.jpg", i));
            let resolver = Arc::clone(&resolver);
            handles.push(tokio::spawn(async move {
                resolver.resolve(Path::new("/src/photo.jpg"), &dest).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), Resolution::Skip);
        }

        assert_eq!(provider.asked.load(Ordering::SeqCst), 16);
        assert_eq!(provider.most_open.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_replace_never_targets_an_in_flight_destination() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("2022-03-01_photo.jpg");
        let resolver = ConflictResolver::new(Arc::new(FixedDecision(ConflictAction::Replace)), 10);

        // first worker gets the free name and holds its placeholder
        let first = resolver.resolve(Path::new("/src/a/photo.jpg"), &dest).await.unwrap();
        assert_eq!(
            first,
            Resolution::Proceed {
                path: dest.clone(),
                reserved: true
            }
        );

        // a second worker asking to replace it is sent elsewhere
        let second = resolver.resolve(Path::new("/src/b/photo.jpg"), &dest).await.unwrap();
        assert_eq!(
            second,
            Resolution::Proceed {
                path: temp.path().join("2022-03-01_photo_1.jpg"),
                reserved: true
            }
        );
        assert_eq!(resolver.in_flight().await, 2);

        // once released, replacing the settled file is allowed again
        resolver.release(&dest, false).await;
        let third = resolver.resolve(Path::new("/src/c/photo.jpg"), &dest).await.unwrap();
        assert_eq!(
            third,
            Resolution::Proceed {
                path: dest.clone(),
                reserved: false
            }
        );
    }

    #[tokio::test]
    async fn test_suffix_cap_is_an_error() {
        let temp = TempDir::new().unwrap();
        let dest = existing(temp.path(), "photo.jpg");
        existing(temp.path(), "photo_1.jpg");
        existing(temp.path(), "photo_2.jpg");
        let resolver = ConflictResolver::new(Arc::new(FixedDecision(ConflictAction::Suffix)), 2);

        let result = resolver.resolve(Path::new("/src/photo.jpg"), &dest).await;
        assert!(matches!(result, Err(ShelveError::SuffixExhausted { attempts: 2, .. })));
    }

    #[test]
    fn test_non_interactive_without_default_is_config_error() {
        assert!(matches!(
            decision_provider(None, false, "default"),
            Err(ShelveError::Config(_))
        ));
        assert!(decision_provider(Some(ConflictAction::Skip), false, "default").is_ok());
        assert!(decision_provider(None, true, "default").is_ok());
    }
}
