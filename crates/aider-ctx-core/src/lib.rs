pub mod config;
pub mod directive;
pub mod dirty;
pub mod error;
pub mod events;
pub mod ignore_filter;
pub mod process;
pub mod session;
pub mod store;
pub mod tasks;
pub mod walk;

pub use config::SessionConfig;
pub use directive::Directive;
pub use dirty::DirtyTracker;
pub use error::{ConfigError, SessionError, TaskFileError};
pub use events::{EventRegistry, EventTopic, NullRegistry, Subscription};
pub use ignore_filter::IgnoreFilter;
pub use process::{LaunchSpec, ProcessLauncher, ProcessSink};
pub use session::{SessionController, SessionState, StartOutcome, StartRequest, SyncReport};
pub use store::{ContextSnapshot, ContextStore, TrackedFile};
pub use tasks::AiderTask;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileMode {
    Writable,
    ReadOnly,
}

impl Default for FileMode {
    fn default() -> Self {
        Self::Writable
    }
}

impl FileMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileMode::Writable => "writable",
            FileMode::ReadOnly => "read-only",
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, FileMode::ReadOnly)
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileMode {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "writable" | "write" | "rw" | "add" => Ok(FileMode::Writable),
            "read-only" | "read_only" | "readonly" | "ro" | "read" => Ok(FileMode::ReadOnly),
            other => Err(format!("Unknown file mode: {other}")),
        }
    }
}
