//! Directory creation tool.

use async_trait::async_trait;
use kubrick_core::error::ToolError;
use kubrick_core::tool::{Action, ActionKind, Tool, ToolResult};

use crate::workspace::{Workspace, required_str};

pub struct CreateDirectoryTool {
    workspace: Workspace,
}

impl CreateDirectoryTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn name(&self) -> &str {
        "create_directory"
    }

    fn description(&self) -> &str {
        "Create a new directory"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path of the directory to create"
                }
            },
            "required": ["path"]
        })
    }

    fn action(&self, arguments: &serde_json::Value) -> Option<Action> {
        let path = arguments["path"].as_str()?;
        Some(Action::new(
            ActionKind::CreateDirectory,
            self.workspace.resolve(path).display().to_string(),
        ))
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = self.workspace.resolve(required_str(&arguments, "path")?);
        match tokio::fs::create_dir_all(&path).await {
            Ok(()) => Ok(ToolResult::success(format!("Created directory: {}", path.display()))),
            Err(e) => Ok(ToolResult::failure(format!("Failed to create directory: {e}"))),
        }
    }
}
