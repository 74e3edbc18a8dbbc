use std::fmt;
use std::path::{Path, PathBuf};

/// One line of aider's slash-command interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `/drop *`
    DropAll,
    /// `/add "<p1>" "<p2>" ...`
    Add(Vec<PathBuf>),
    /// `/read "<p1>" ...`
    Read(Vec<PathBuf>),
    /// `/drop "<p>"`
    Drop(PathBuf),
    /// `/ls`
    List,
    /// `/clear`
    ClearHistory,
}

impl Directive {
    pub fn to_line(&self) -> String {
        match self {
            Directive::DropAll => "/drop *".to_string(),
            Directive::Add(paths) => format!("/add {}", quote_all(paths)),
            Directive::Read(paths) => format!("/read {}", quote_all(paths)),
            Directive::Drop(path) => format!("/drop {}", quote(path)),
            Directive::List => "/ls".to_string(),
            Directive::ClearHistory => "/clear".to_string(),
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

fn quote(path: &Path) -> String {
    format!("\"{}\"", path.display())
}

fn quote_all(paths: &[PathBuf]) -> String {
    paths.iter().map(|path| quote(path)).collect::<Vec<_>>().join(" ")
}
