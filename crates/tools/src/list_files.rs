//! Glob listing of files and directories.

use async_trait::async_trait;
use kubrick_core::error::ToolError;
use kubrick_core::tool::{Tool, ToolResult};

use crate::workspace::{Workspace, glob_in, required_str};

pub struct ListFilesTool {
    workspace: Workspace,
}

impl ListFilesTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files and directories matching a glob pattern (e.g., '*.py' for current dir, '**/*.py' for recursive, '**/*' for all)"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern to match files (e.g., '*.py', 'src/**/*.ts')"
                },
                "directory": {
                    "type": "string",
                    "description": "Directory to search in (defaults to the working directory)"
                }
            },
            "required": ["pattern"]
        })
    }

    fn is_read_only(&self, _arguments: &serde_json::Value) -> bool {
        true
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let pattern = required_str(&arguments, "pattern")?.to_string();
        let dir = self
            .workspace
            .resolve(arguments["directory"].as_str().unwrap_or("."));

        let walk_dir = dir.clone();
        let walk_pattern = pattern.clone();
        let matches = tokio::task::spawn_blocking(move || glob_in(&walk_dir, &walk_pattern))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "list_files".into(),
                reason: e.to_string(),
            })?;

        let matches = match matches {
            Ok(m) => m,
            Err(e) => return Ok(ToolResult::failure(e)),
        };

        let mut directories = Vec::new();
        let mut files = Vec::new();
        for path in &matches {
            let rel = path.strip_prefix(&dir).unwrap_or(path).display().to_string();
            if path.is_dir() {
                directories.push(format!("{rel}/"));
            } else if path.is_file() {
                files.push(rel);
            }
        }

        if directories.is_empty() && files.is_empty() {
            return Ok(ToolResult::success(format!(
                "No files or directories found matching pattern: {pattern}"
            )));
        }

        let mut out = format!(
            "Found {} directories and {} files:\n",
            directories.len(),
            files.len()
        );
        if !directories.is_empty() {
            out.push_str("\nDirectories:\n");
            out.push_str(&directories.join("\n"));
        }
        if !files.is_empty() {
            out.push_str("\n\nFiles:\n");
            out.push_str(&files.join("\n"));
        }
        Ok(ToolResult::success(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/nested/mod.rs"), "").unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();
        dir
    }

    #[tokio::test]
    async fn lists_recursive_matches() {
        let dir = fixture();
        let tool = ListFilesTool::new(Workspace::new(dir.path()));
        let result = tool
            .execute(serde_json::json!({"pattern": "**/*.rs"}))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.starts_with("Found 0 directories and 2 files:"));
        assert!(result.output.contains("src/lib.rs"));
        assert!(result.output.contains("src/nested/mod.rs"));
    }

    #[tokio::test]
    async fn separates_directories() {
        let dir = fixture();
        let tool = ListFilesTool::new(Workspace::new(dir.path()));
        let result = tool
            .execute(serde_json::json!({"pattern": "*", "directory": "src"}))
            .await
            .unwrap();

        assert!(result.output.contains("Directories:\nnested/"));
        assert!(result.output.contains("Files:\nlib.rs"));
    }

    #[tokio::test]
    async fn no_matches_is_not_an_error() {
        let dir = fixture();
        let tool = ListFilesTool::new(Workspace::new(dir.path()));
        let result = tool
            .execute(serde_json::json!({"pattern": "*.py"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("No files or directories found"));
    }
}
