//! Project task presets (`.vscode/aider-tasks.json`).
//!
//! Each task's `command` is forwarded verbatim to the assistant; nothing here
//! touches the working set.

use crate::error::TaskFileError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const TASKS_DIR: &str = ".vscode";
pub const TASKS_FILE: &str = "aider-tasks.json";

const TEMPLATE: &str = r#"[
  {
    "label": "My First Task",
    "description": "A description for my task.",
    "command": "This is the prompt to send to aider."
  }
]
"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiderTask {
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub command: String,
}

pub fn tasks_file_path(root: &Path) -> PathBuf {
    root.join(TASKS_DIR).join(TASKS_FILE)
}

pub fn load_tasks(root: &Path) -> Result<Vec<AiderTask>, TaskFileError> {
    let path = tasks_file_path(root);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(TaskFileError::Missing(path));
        }
        Err(err) => return Err(TaskFileError::Io(err)),
    };
    parse_tasks(&path, &contents)
}

pub fn parse_tasks(path: &Path, contents: &str) -> Result<Vec<AiderTask>, TaskFileError> {
    let tasks: Vec<AiderTask> =
        serde_json::from_str(contents).map_err(|err| TaskFileError::Malformed {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    if tasks.is_empty() {
        return Err(TaskFileError::Malformed {
            path: path.to_path_buf(),
            reason: "no tasks defined".to_string(),
        });
    }
    Ok(tasks)
}

/// Write a starter task file. Refuses to overwrite an existing one.
pub fn scaffold_tasks(root: &Path) -> Result<PathBuf, TaskFileError> {
    let path = tasks_file_path(root);
    if path.exists() {
        return Err(TaskFileError::AlreadyExists(path));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, TEMPLATE)?;
    Ok(path)
}
