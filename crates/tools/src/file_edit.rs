//! File edit tool: replace the first occurrence of a string.

use async_trait::async_trait;
use kubrick_core::error::ToolError;
use kubrick_core::tool::{Action, ActionKind, Tool, ToolResult};

use crate::workspace::{Workspace, required_str};

pub struct FileEditTool {
    workspace: Workspace,
}

impl FileEditTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileEditTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit a file by replacing a specific string with new content"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The path to the file to edit"
                },
                "old_string": {
                    "type": "string",
                    "description": "The exact string to find and replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "The new string to replace with"
                }
            },
            "required": ["file_path", "old_string", "new_string"]
        })
    }

    fn action(&self, arguments: &serde_json::Value) -> Option<Action> {
        let path = arguments["file_path"].as_str()?;
        Some(Action::new(
            ActionKind::EditFile,
            self.workspace.resolve(path).display().to_string(),
        ))
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = self.workspace.resolve(required_str(&arguments, "file_path")?);
        let old_string = required_str(&arguments, "old_string")?;
        let new_string = required_str(&arguments, "new_string")?;

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(_) => return Ok(ToolResult::failure(format!("File not found: {}", path.display()))),
        };

        if old_string.is_empty() || !content.contains(old_string) {
            let preview: String = old_string.chars().take(100).collect();
            return Ok(ToolResult::failure(format!("String not found in file: {preview}...")));
        }

        let updated = content.replacen(old_string, new_string, 1);
        match tokio::fs::write(&path, updated).await {
            Ok(()) => Ok(ToolResult::success(format!("Successfully edited {}", path.display()))),
            Err(e) => Ok(ToolResult::failure(format!("Failed to write file: {e}"))),
        }
    }
}
