//! Gitignore-style path exclusion for the tracked working set.
//!
//! Rules come from a single `.gitignore` at the workspace root. A missing or
//! unreadable file yields a filter that ignores nothing. Paths are always
//! evaluated root-relative with `/` separators; the root itself and anything
//! outside it are never ignored.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

pub const IGNORE_FILE_NAME: &str = ".gitignore";

#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    root: PathBuf,
    matcher: Gitignore,
}

impl IgnoreFilter {
    /// Filter that ignores nothing, rooted at `root`.
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            matcher: Gitignore::empty(),
        }
    }

    /// Load `<root>/.gitignore`, failing open when it is absent or unreadable.
    pub fn load(root: &Path) -> Self {
        let path = root.join(IGNORE_FILE_NAME);
        match fs::read_to_string(&path) {
            Ok(contents) => Self::from_rules(root, &contents),
            Err(err) => {
                debug!(path = %path.display(), "ignore_file_unavailable: {err}");
                Self::empty(root)
            }
        }
    }

    /// Build from rule text. Lines that fail to compile are skipped.
    pub fn from_rules(root: &Path, contents: &str) -> Self {
        let source = root.join(IGNORE_FILE_NAME);
        let mut builder = GitignoreBuilder::new(root);
        for line in contents.lines() {
            if let Err(err) = builder.add_line(Some(source.clone()), line) {
                warn!(line, "ignore_rule_skipped: {err}");
            }
        }
        let matcher = match builder.build() {
            Ok(matcher) => matcher,
            Err(err) => {
                warn!("ignore_rules_unusable: {err}");
                Gitignore::empty()
            }
        };
        Self {
            root: root.to_path_buf(),
            matcher,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rule_count(&self) -> usize {
        self.matcher.num_ignores() as usize + self.matcher.num_whitelists() as usize
    }

    /// Evaluate a root-relative, `/`-separated path as a file.
    pub fn matches(&self, relative: &str) -> bool {
        self.matches_entry(relative, false)
    }

    /// Evaluate a root-relative path, honouring directory-only patterns when
    /// `is_dir` is set. A path is ignored when it or any parent matches.
    pub fn matches_entry(&self, relative: &str, is_dir: bool) -> bool {
        let relative = relative.trim_start_matches("./").trim_matches('/');
        if relative.is_empty() || self.matcher.is_empty() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(Path::new(relative), is_dir)
            .is_ignore()
    }

    /// Evaluate an absolute path against the filter root.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        match relative_to(&self.root, path) {
            Some(relative) => self.matches_entry(&relative, is_dir),
            None => false,
        }
    }
}

/// Root-relative form of `path` with `/` separators. `None` when `path` is
/// not beneath `root` or climbs out of it.
pub fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let root = normalize_path(root);
    let path = normalize_path(path);
    let stripped = path.strip_prefix(&root).ok()?;
    let mut parts: Vec<String> = Vec::new();
    for component in stripped.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().to_string()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Resolve `.` and `..` lexically, without touching the filesystem. A `..`
/// above the root of an absolute path stays at the root.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
