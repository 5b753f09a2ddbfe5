//! Directory watcher for hot reload.
//!
//! # Data Flow
//! ```text
//! notify event (create / remove / rename / modify)
//!     → file name filtered by pattern
//!     → ChangeSet sent on an mpsc channel
//!     → reload loop merges changes arriving within the debounce window
//!     → Registry::reload on a blocking thread
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use regex::Regex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;
use crate::registry::{Registry, RegistryError};

/// How long to wait for further events before rebuilding.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("invalid file pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("failed to start directory watcher: {0}")]
    Notify(#[from] notify::Error),
}

/// Files created, modified and deleted since the last rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub created: BTreeSet<PathBuf>,
    pub modified: BTreeSet<PathBuf>,
    pub deleted: BTreeSet<PathBuf>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn merge(&mut self, other: ChangeSet) {
        self.created.extend(other.created);
        self.modified.extend(other.modified);
        self.deleted.extend(other.deleted);
    }

    /// Whether `path` appears in any of the sets.
    pub fn contains(&self, path: &Path) -> bool {
        self.touched(path) || self.deleted.contains(path)
    }

    /// Whether `path` was created or modified.
    pub fn touched(&self, path: &Path) -> bool {
        self.created.contains(path) || self.modified.contains(path)
    }

    /// Translate one notify event, keeping only files whose name matches `pattern`.
    pub fn from_event(event: &Event, pattern: &Regex) -> Self {
        let mut changes = ChangeSet::default();
        let wanted = |path: &PathBuf| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.is_match(name))
        };
        let paths: Vec<PathBuf> = event.paths.iter().filter(|p| wanted(p)).cloned().collect();

        match event.kind {
            EventKind::Create(_) => changes.created.extend(paths),
            EventKind::Remove(_) => changes.deleted.extend(paths),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => changes.deleted.extend(paths),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => changes.created.extend(paths),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let mut all = event.paths.iter();
                if let Some(from) = all.next().filter(|p| wanted(p)) {
                    changes.deleted.insert(from.clone());
                }
                if let Some(to) = all.next().filter(|p| wanted(p)) {
                    changes.created.insert(to.clone());
                }
            }
            EventKind::Modify(_) => changes.modified.extend(paths),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
        }
        changes
    }
}

/// Watches the product directories, non-recursively.
pub struct DirectoryWatcher {
    dirs: BTreeSet<PathBuf>,
    pattern: Regex,
    poll_interval: Duration,
}

impl DirectoryWatcher {
    pub fn new(dirs: BTreeSet<PathBuf>, file_pattern: &str, poll_interval: Duration) -> Result<Self, WatchError> {
        Ok(Self {
            dirs,
            pattern: Regex::new(file_pattern)?,
            poll_interval,
        })
    }

    /// Start watching.
    ///
    /// Returns the watcher guard, which must be kept alive, and a receiver
    /// for change batches. A directory that cannot be watched is logged and
    /// skipped.
    pub fn run(self) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<ChangeSet>), WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let pattern = self.pattern.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let changes = ChangeSet::from_event(&event, &pattern);
                    if !changes.is_empty() {
                        tracing::debug!(?changes, "Product directory change detected");
                        let _ = tx.send(changes);
                    }
                }
                Err(e) => tracing::error!(error = %e, paths = ?e.paths, "Error in watched directory"),
            },
            Config::default().with_poll_interval(self.poll_interval),
        )?;

        for dir in &self.dirs {
            match watcher.watch(dir, RecursiveMode::NonRecursive) {
                Ok(()) => tracing::info!(path = %dir.display(), "Watching product directory"),
                Err(e) => tracing::error!(path = %dir.display(), error = %e, "Error in directory"),
            }
        }

        Ok((watcher, rx))
    }
}

/// Rebuild the registry for every change batch until shutdown.
pub fn spawn_reload_loop(
    registry: Arc<Registry>,
    mut rx: mpsc::UnboundedReceiver<ChangeSet>,
    shutdown: &Shutdown,
    debounce: Duration,
) -> JoinHandle<()> {
    let mut stop = shutdown.subscribe();

    tokio::spawn(async move {
        loop {
            let mut batch = tokio::select! {
                _ = stop.recv() => break,
                next = rx.recv() => match next {
                    Some(changes) => changes,
                    None => break,
                },
            };
            while let Ok(Some(more)) = tokio::time::timeout(debounce, rx.recv()).await {
                batch.merge(more);
            }

            let registry = Arc::clone(&registry);
            match tokio::task::spawn_blocking(move || registry.reload(&batch)).await {
                Ok(Ok(outcome)) => tracing::debug!(?outcome, "Reload finished"),
                Ok(Err(RegistryError::Cancelled)) => {
                    tracing::info!("Reload cancelled, stopping watcher");
                    break;
                }
                Ok(Err(e)) => tracing::error!(error = %e, "Reload failed"),
                Err(e) => tracing::error!(error = %e, "Reload task panicked"),
            }
        }
        tracing::info!("Reload loop stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::main_config::DEFAULT_FILE_PATTERN;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn pattern() -> Regex {
        Regex::new(DEFAULT_FILE_PATTERN).unwrap()
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for p in paths {
            event = event.add_path(PathBuf::from(p));
        }
        event
    }

    #[test]
    fn test_event_kinds() {
        let p = pattern();

        let c = ChangeSet::from_event(&event(EventKind::Create(CreateKind::File), &["/etc/t/a.toml"]), &p);
        assert!(c.created.contains(Path::new("/etc/t/a.toml")));

        let c = ChangeSet::from_event(
            &event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &["/etc/t/a.toml"]),
            &p,
        );
        assert!(c.modified.contains(Path::new("/etc/t/a.toml")));

        let c = ChangeSet::from_event(&event(EventKind::Remove(RemoveKind::File), &["/etc/t/a.toml"]), &p);
        assert!(c.deleted.contains(Path::new("/etc/t/a.toml")));

        let c = ChangeSet::from_event(
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/etc/t/old.toml", "/etc/t/new.toml"],
            ),
            &p,
        );
        assert!(c.deleted.contains(Path::new("/etc/t/old.toml")));
        assert!(c.created.contains(Path::new("/etc/t/new.toml")));
    }

    #[test]
    fn test_editor_temp_files_are_ignored() {
        let p = pattern();
        let c = ChangeSet::from_event(
            &event(
                EventKind::Create(CreateKind::File),
                &["/etc/t/.a.toml.swp", "/etc/t/a.toml~", "/etc/t/noextension"],
            ),
            &p,
        );
        assert!(c.is_empty());
    }

    #[test]
    fn test_merge() {
        let mut a = ChangeSet::default();
        a.created.insert(PathBuf::from("/x/a.toml"));
        let mut b = ChangeSet::default();
        b.modified.insert(PathBuf::from("/x/a.toml"));
        b.deleted.insert(PathBuf::from("/x/b.toml"));

        a.merge(b);
        assert!(a.touched(Path::new("/x/a.toml")));
        assert!(a.contains(Path::new("/x/b.toml")));
        assert!(!a.touched(Path::new("/x/b.toml")));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = DirectoryWatcher::new(BTreeSet::new(), "([", Duration::from_secs(1)).err();
        assert!(matches!(err, Some(WatchError::Pattern(_))));
    }
}
