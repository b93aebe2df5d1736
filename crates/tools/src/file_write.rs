//! File write tool: create or overwrite a file, making parent directories.

use async_trait::async_trait;
use kubrick_core::error::ToolError;
use kubrick_core::tool::{Action, ActionKind, Tool, ToolResult};

use crate::workspace::{Workspace, required_str};

pub struct FileWriteTool {
    workspace: Workspace,
}

impl FileWriteTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating it if it doesn't exist or overwriting if it does"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The absolute or relative path to the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write to the file"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    fn action(&self, arguments: &serde_json::Value) -> Option<Action> {
        let path = arguments["file_path"].as_str()?;
        Some(Action::new(
            ActionKind::WriteFile,
            self.workspace.resolve(path).display().to_string(),
        ))
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = self.workspace.resolve(required_str(&arguments, "file_path")?);
        let content = required_str(&arguments, "content")?;

        if let Some(parent) = path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Ok(ToolResult::failure(format!("Failed to create directory: {e}")));
        }

        match tokio::fs::write(&path, content).await {
            Ok(()) => Ok(ToolResult::success(format!(
                "Successfully wrote {} characters to {}",
                content.chars().count(),
                path.display()
            ))),
            Err(e) => Ok(ToolResult::failure(format!("Failed to write file: {e}"))),
        }
    }
}
