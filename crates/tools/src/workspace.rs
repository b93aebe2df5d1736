//! Path resolution against the task's working directory.

use kubrick_core::error::ToolError;
use std::path::{Path, PathBuf};

/// The directory tools operate in.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute paths are kept; relative ones are joined onto the root.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

/// Paths under `dir` matching a glob `pattern`, sorted, skipping `.git`.
///
/// Walks the filesystem synchronously; call from a blocking context.
pub(crate) fn glob_in(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, String> {
    let full = format!("{}/{}", glob::Pattern::escape(&dir.display().to_string()), pattern);
    let mut matches: Vec<PathBuf> = glob::glob(&full)
        .map_err(|e| format!("Invalid glob pattern '{pattern}': {e}"))?
        .filter_map(Result::ok)
        .filter(|p| !p.components().any(|c| c.as_os_str() == ".git"))
        .collect();
    matches.sort();
    Ok(matches)
}

/// Fetch a required string argument.
pub(crate) fn required_str<'a>(arguments: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    arguments[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}
