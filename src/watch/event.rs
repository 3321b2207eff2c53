use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::EventKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
}

/// A file that appeared in the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    /// Absolute path of the new entry.
    pub path: PathBuf,
}

impl WatchEvent {
    /// Keep only creations from a raw notify event.
    ///
    /// A file renamed into the directory counts as created. Modifications,
    /// removals and renames away are dropped.
    pub fn from_notify(dir: &Path, event: notify::Event) -> Vec<WatchEvent> {
        let paths = match event.kind {
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                event.paths
            }
            // Both carries [from, to].
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                event.paths.into_iter().skip(1).collect()
            }
            _ => Vec::new(),
        };

        paths
            .into_iter()
            .map(|p| WatchEvent {
                kind: WatchEventKind::Created,
                path: resolve(dir, p),
            })
            .collect()
    }
}

fn resolve(dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        dir.join(path)
    }
}
