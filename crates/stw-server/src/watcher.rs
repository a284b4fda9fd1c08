//! File watching for live reload.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use walkdir::WalkDir;

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// A single file system change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Events emitted by the file watcher.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A watched path changed
    Changed(Change),

    /// The watcher itself reported a problem
    Error(String),
}

/// File watcher for detecting changes.
///
/// Directories are watched one by one, so directories created later have to
/// be added with [`FileWatcher::watch_dir`] and removed ones dropped with
/// [`FileWatcher::forget`].
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    watched: HashSet<PathBuf>,
}

impl FileWatcher {
    /// Create a watcher with nothing watched yet.
    ///
    /// Returns the watcher and a channel to receive events.
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>), notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let events = match res {
                Ok(event) => classify_event(event),
                Err(e) => vec![WatchEvent::Error(e.to_string())],
            };
            for event in events {
                // Receiver gone means the watch loop is shutting down
                let _ = tx.send(event);
            }
        })?;

        Ok((
            Self {
                watcher,
                watched: HashSet::new(),
            },
            rx,
        ))
    }

    /// Watch `root` and every directory below it.
    ///
    /// Returns the number of directories newly added. A missing `root`
    /// watches nothing.
    pub fn watch_dir(&mut self, root: &Path) -> Result<usize, notify::Error> {
        let mut added = 0;

        let dirs = WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir());

        for entry in dirs {
            let path = entry.into_path();
            if self.watched.contains(&path) {
                continue;
            }
            self.watcher.watch(&path, RecursiveMode::NonRecursive)?;
            tracing::debug!("Watching {}", path.display());
            self.watched.insert(path);
            added += 1;
        }

        Ok(added)
    }

    /// Watch a single file through its parent directory.
    ///
    /// Editors often save by renaming a new file over the old one, which
    /// would end a watch on the file itself. Events for the directory's
    /// other entries are delivered too and left to the caller to filter.
    pub fn watch_file(&mut self, path: &Path) -> Result<bool, notify::Error> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        if !parent.is_dir() || self.watched.contains(parent) {
            return Ok(false);
        }
        self.watcher.watch(parent, RecursiveMode::NonRecursive)?;
        tracing::debug!("Watching {} for {}", parent.display(), path.display());
        self.watched.insert(parent.to_path_buf());
        Ok(true)
    }

    /// Stop watching `path` and every directory below it.
    ///
    /// Returns the number of directories dropped, so a directory created
    /// again at the same path is picked up by the next
    /// [`FileWatcher::watch_dir`].
    pub fn forget(&mut self, path: &Path) -> usize {
        let gone: Vec<PathBuf> = self
            .watched
            .iter()
            .filter(|dir| dir.starts_with(path))
            .cloned()
            .collect();

        for dir in &gone {
            // A deleted directory has already lost its watch.
            let _ = self.watcher.unwatch(dir);
            self.watched.remove(dir);
            tracing::debug!("Stopped watching {}", dir.display());
        }

        gone.len()
    }

    /// Whether `path` is being watched.
    pub fn is_watched(&self, path: &Path) -> bool {
        self.watched.contains(path)
    }
}

/// Turn a notify event into the changes the watch loop cares about.
fn classify_event(event: notify::Event) -> Vec<WatchEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Removed,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => return renamed(event.paths),
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Removed,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .into_iter()
        .map(|path| WatchEvent::Changed(Change { path, kind }))
        .collect()
}

/// A rename reported as `[from, to]`.
fn renamed(paths: Vec<PathBuf>) -> Vec<WatchEvent> {
    let mut paths = paths.into_iter();
    let from = paths.next().map(|path| Change {
        path,
        kind: ChangeKind::Removed,
    });
    let to = paths.next().map(|path| Change {
        path,
        kind: ChangeKind::Created,
    });

    from.into_iter().chain(to).map(WatchEvent::Changed).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind};
    use tokio::sync::mpsc::UnboundedReceiver;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn classifies_events() {
        let create = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("pages/index.html"));
        let write = notify::Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("a"))
            .add_path(PathBuf::from("b"));
        let chmod = notify::Event::new(EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::Permissions,
        )))
        .add_path(PathBuf::from("a"));
        let read = notify::Event::new(EventKind::Access(AccessKind::Read))
            .add_path(PathBuf::from("a"));

        match classify_event(create).as_slice() {
            [WatchEvent::Changed(change)] => {
                assert_eq!(change.kind, ChangeKind::Created);
                assert_eq!(change.path, PathBuf::from("pages/index.html"));
            }
            other => panic!("unexpected events: {other:?}"),
        }
        assert_eq!(classify_event(write).len(), 2);
        assert!(classify_event(chmod).is_empty());
        assert!(classify_event(read).is_empty());
    }

    #[test]
    fn renames_become_remove_and_create() {
        let rename = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from(".config.yaml.tmp"))
            .add_path(PathBuf::from("config.yaml"));

        let kinds: Vec<_> = classify_event(rename)
            .into_iter()
            .map(|event| match event {
                WatchEvent::Changed(change) => (change.path, change.kind),
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();

        assert_eq!(
            kinds,
            [
                (PathBuf::from(".config.yaml.tmp"), ChangeKind::Removed),
                (PathBuf::from("config.yaml"), ChangeKind::Created),
            ]
        );
    }

    /// Wait for the first change matching `wanted`, skipping the rest.
    async fn next_change(
        rx: &mut UnboundedReceiver<WatchEvent>,
        wanted: impl Fn(&Change) -> bool,
    ) -> Option<Change> {
        let wait = async {
            while let Some(event) = rx.recv().await {
                if let WatchEvent::Changed(change) = event {
                    if wanted(&change) {
                        return Some(change);
                    }
                }
            }
            None
        };
        tokio::time::timeout(Duration::from_secs(3), wait)
            .await
            .ok()
            .flatten()
    }

    /// Let trailing events for the last operation arrive, then drop them.
    async fn settle(rx: &mut UnboundedReceiver<WatchEvent>) {
        tokio::time::sleep(Duration::from_millis(100)).await;
        while rx.try_recv().is_ok() {}
    }

    #[test]
    fn watches_nested_directories_once() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("a/b")).unwrap();
        fs::write(temp.path().join("a/file.txt"), "x").unwrap();

        let (mut watcher, _rx) = FileWatcher::new().unwrap();

        assert_eq!(watcher.watch_dir(temp.path()).unwrap(), 3);
        assert!(watcher.is_watched(&temp.path().join("a/b")));
        assert_eq!(watcher.watch_dir(temp.path()).unwrap(), 0);
        assert_eq!(watcher.watch_dir(&temp.path().join("missing")).unwrap(), 0);
    }

    #[tokio::test]
    async fn watches_file_changes() {
        let temp = tempdir().unwrap();
        let test_file = temp.path().join("index.html");

        // Create the watcher first (so it catches file creation)
        let (mut watcher, mut rx) = FileWatcher::new().unwrap();
        watcher.watch_dir(temp.path()).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&test_file, "<h1>Created</h1>").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;

        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for file watch event");
        match event.unwrap() {
            Some(WatchEvent::Changed(change)) => assert!(change.path.ends_with("index.html")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rewatches_recreated_directory() {
        let temp = tempdir().unwrap();
        let blog = temp.path().join("blog");
        fs::create_dir(&blog).unwrap();

        let (mut watcher, mut rx) = FileWatcher::new().unwrap();
        watcher.watch_dir(temp.path()).unwrap();
        assert!(watcher.is_watched(&blog));

        fs::remove_dir(&blog).unwrap();
        settle(&mut rx).await;
        assert_eq!(watcher.forget(&blog), 1);
        assert!(!watcher.is_watched(&blog));
        assert!(watcher.is_watched(temp.path()));

        fs::create_dir(&blog).unwrap();
        assert_eq!(watcher.watch_dir(&blog).unwrap(), 1);
        settle(&mut rx).await;

        let page = blog.join("index.html");
        fs::write(&page, "<h1>Back</h1>").unwrap();

        let change = next_change(&mut rx, |change| change.path == page).await;
        assert!(change.is_some(), "no event inside the recreated directory");
    }

    #[test]
    fn forget_drops_nested_directories() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("a/b/c")).unwrap();
        fs::create_dir(temp.path().join("ab")).unwrap();

        let (mut watcher, _rx) = FileWatcher::new().unwrap();
        assert_eq!(watcher.watch_dir(temp.path()).unwrap(), 5);

        assert_eq!(watcher.forget(&temp.path().join("a")), 3);
        assert!(watcher.is_watched(&temp.path().join("ab")));
        assert_eq!(watcher.forget(&temp.path().join("a")), 0);
        assert_eq!(watcher.watch_dir(temp.path()).unwrap(), 3);
    }

    #[tokio::test]
    async fn sees_file_replaced_by_rename() {
        let temp = tempdir().unwrap();
        let config = temp.path().join("config.yaml");
        fs::write(&config, "name: one\n").unwrap();

        let (mut watcher, mut rx) = FileWatcher::new().unwrap();
        assert!(watcher.watch_file(&config).unwrap());
        assert!(!watcher.watch_file(&config).unwrap());
        assert!(watcher.is_watched(temp.path()));
        settle(&mut rx).await;

        for (save, contents) in ["name: two\n", "name: three\n"].into_iter().enumerate() {
            let staging = temp.path().join(".config.yaml.tmp");
            fs::write(&staging, contents).unwrap();
            fs::rename(&staging, &config).unwrap();

            let change = next_change(&mut rx, |change| change.path == config).await;
            assert!(change.is_some(), "save {save} was missed");
            settle(&mut rx).await;
        }

        fs::write(&config, "name: four\n").unwrap();
        let change = next_change(&mut rx, |change| change.path == config).await;
        assert!(change.is_some(), "in-place write was missed");
    }
}
