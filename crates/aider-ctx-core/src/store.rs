use crate::ignore_filter::{normalize_path, IgnoreFilter};
use crate::FileMode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedFile {
    pub path: PathBuf,
    pub mode: FileMode,
}

/// Tracked absolute paths and their mode. Ordered by path so every sync
/// emits the same sequence for the same contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextStore {
    files: BTreeMap<PathBuf, FileMode>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    pub fn mode_of(&self, path: &Path) -> Option<FileMode> {
        self.files.get(&normalize_path(path)).copied()
    }

    /// Upsert every non-ignored path with `mode`. Returns whether anything
    /// changed; ignored paths are dropped before the store is touched.
    /// Paths are keyed in their normalized form.
    pub fn add<P: AsRef<Path>>(&mut self, paths: &[P], mode: FileMode, filter: &IgnoreFilter) -> bool {
        let accepted: Vec<PathBuf> = paths
            .iter()
            .map(|path| normalize_path(path.as_ref()))
            .filter(|path| !filter.is_ignored(path, false))
            .collect();

        let mut changed = false;
        for path in accepted {
            if self.files.get(&path) != Some(&mode) {
                self.files.insert(path, mode);
                changed = true;
            }
        }
        changed
    }

    pub fn drop_path(&mut self, path: &Path) -> bool {
        self.files.remove(&normalize_path(path)).is_some()
    }

    pub fn clear(&mut self) -> bool {
        if self.files.is_empty() {
            return false;
        }
        self.files.clear();
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, FileMode)> {
        self.files.iter().map(|(path, mode)| (path.as_path(), *mode))
    }

    /// Split into (writable, read-only) paths, each in path order.
    pub fn partition(&self) -> (Vec<&Path>, Vec<&Path>) {
        let mut writable = Vec::new();
        let mut read_only = Vec::new();
        for (path, mode) in self.iter() {
            match mode {
                FileMode::Writable => writable.push(path),
                FileMode::ReadOnly => read_only.push(path),
            }
        }
        (writable, read_only)
    }

    pub fn entries(&self) -> Vec<TrackedFile> {
        self.iter()
            .map(|(path, mode)| TrackedFile {
                path: path.to_path_buf(),
                mode,
            })
            .collect()
    }
}

/// Immutable view handed to presentation adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextSnapshot {
    pub active: bool,
    pub dirty: bool,
    pub files: Vec<TrackedFile>,
}

impl ContextSnapshot {
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// One-line summary in the style of the editor status bar.
    pub fn status_line(&self) -> String {
        if !self.active {
            return "Aider: Inactive".to_string();
        }
        let mut text = format!("Aider: {} files", self.files.len());
        if self.dirty {
            text.push_str(" (unsynced)");
        }
        text
    }

    pub fn read_only_count(&self) -> usize {
        self.files.iter().filter(|file| file.mode.is_read_only()).count()
    }
}
