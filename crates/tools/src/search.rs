//! Text search across files.

use async_trait::async_trait;
use kubrick_core::error::ToolError;
use kubrick_core::tool::{Tool, ToolResult};
use std::path::Path;

use crate::workspace::{Workspace, glob_in, required_str};

const MAX_MATCHES: usize = 50;

pub struct SearchFilesTool {
    workspace: Workspace,
}

impl SearchFilesTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

/// Every `path:line: text` hit for `needle` in files matching `file_pattern`.
fn search(dir: &Path, needle: &str, file_pattern: &str) -> Result<Vec<String>, String> {
    let mut hits = Vec::new();
    for path in glob_in(dir, file_pattern)? {
        if !path.is_file() {
            continue;
        }
        // Binary and unreadable files are skipped
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        let rel = path.strip_prefix(dir).unwrap_or(&path).display().to_string();
        for (n, line) in content.lines().enumerate() {
            if line.contains(needle) {
                hits.push(format!("{rel}:{}: {}", n + 1, line.trim()));
            }
        }
    }
    Ok(hits)
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Search for text content within files using grep-like functionality"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Text to search for"
                },
                "file_pattern": {
                    "type": "string",
                    "description": "File glob pattern to search within (e.g., '**/*.py'; defaults to '**/*')"
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
        let needle = required_str(&arguments, "pattern")?.to_string();
        let file_pattern = arguments["file_pattern"].as_str().unwrap_or("**/*").to_string();
        let dir = self
            .workspace
            .resolve(arguments["directory"].as_str().unwrap_or("."));

        let query = needle.clone();
        let hits = tokio::task::spawn_blocking(move || search(&dir, &query, &file_pattern))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "search_files".into(),
                reason: e.to_string(),
            })?;

        let hits = match hits {
            Ok(h) => h,
            Err(e) => return Ok(ToolResult::failure(e)),
        };

        if hits.is_empty() {
            return Ok(ToolResult::success(format!("No matches found for pattern: {needle}")));
        }

        let mut out = format!("Found {} matches:\n", hits.len());
        out.push_str(&hits[..hits.len().min(MAX_MATCHES)].join("\n"));
        if hits.len() > MAX_MATCHES {
            out.push_str(&format!("\n... and {} more", hits.len() - MAX_MATCHES));
        }
        Ok(ToolResult::success(out))
    }
}
