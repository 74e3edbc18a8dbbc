use crate::error::SessionError;
use crate::ignore_filter::IgnoreFilter;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryScan {
    /// Regular files that survived the filter, in walk order.
    pub files: Vec<PathBuf>,
    /// Ignored entries; directories here were never descended into.
    pub pruned: Vec<PathBuf>,
}

/// Depth-first walk of `dir`, testing every entry against `filter` before it
/// is collected or entered. Any I/O error aborts the whole scan.
pub fn scan_directory(filter: &IgnoreFilter, dir: &Path) -> Result<DirectoryScan, SessionError> {
    let mut scan = DirectoryScan::default();
    let mut pruned = Vec::new();

    let walker = WalkDir::new(dir).follow_links(false).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        let ignored = filter.is_ignored(entry.path(), entry.file_type().is_dir());
        if ignored {
            pruned.push(entry.path().to_path_buf());
        }
        !ignored
    });

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() {
            scan.files.push(entry.into_path());
        }
    }

    scan.pruned = pruned;
    debug!(
        dir = %dir.display(),
        files = scan.files.len(),
        pruned = scan.pruned.len(),
        "directory_scanned"
    );
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, "x").expect("write");
    }

    #[test]
    fn collects_files_recursively() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "src/main.rs");
        touch(dir.path(), "src/util/mod.rs");
        touch(dir.path(), "README.md");

        let filter = IgnoreFilter::empty(dir.path());
        let mut files = scan_directory(&filter, dir.path()).expect("scan").files;
        files.sort();
        assert_eq!(
            files,
            vec![
                dir.path().join("README.md"),
                dir.path().join("src/main.rs"),
                dir.path().join("src/util/mod.rs"),
            ]
        );
    }

    #[test]
    fn ignored_directory_is_pruned_not_visited() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "src/lib.rs");
        touch(dir.path(), "node_modules/pkg/index.js");
        touch(dir.path(), "node_modules/pkg/deep/more.js");

        let filter = IgnoreFilter::from_rules(dir.path(), "node_modules/\n");
        let scan = scan_directory(&filter, dir.path()).expect("scan");

        assert_eq!(scan.files, vec![dir.path().join("src/lib.rs")]);
        assert_eq!(scan.pruned, vec![dir.path().join("node_modules")]);
    }

    #[test]
    fn subdirectory_scan_uses_root_relative_rules() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "app/src/keep.ts");
        touch(dir.path(), "app/dist/bundle.js");

        let filter = IgnoreFilter::from_rules(dir.path(), "/app/dist\n");
        let scan = scan_directory(&filter, &dir.path().join("app")).expect("scan");
        assert_eq!(scan.files, vec![dir.path().join("app/src/keep.ts")]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let filter = IgnoreFilter::empty(dir.path());
        let result = scan_directory(&filter, &dir.path().join("absent"));
        assert!(matches!(result, Err(SessionError::Walk(_))));
    }
}
