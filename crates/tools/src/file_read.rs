//! File read tool: read file contents, bounded by a size limit.

use async_trait::async_trait;
use kubrick_core::error::ToolError;
use kubrick_core::tool::{Tool, ToolResult};

use crate::workspace::{Workspace, required_str};

pub struct FileReadTool {
    workspace: Workspace,
    max_bytes: u64,
}

impl FileReadTool {
    pub fn new(workspace: Workspace, max_file_size_mb: u64) -> Self {
        Self {
            workspace,
            max_bytes: max_file_size_mb.saturating_mul(1024 * 1024),
        }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file from the filesystem"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The absolute or relative path to the file to read"
                }
            },
            "required": ["file_path"]
        })
    }

    fn is_read_only(&self, _arguments: &serde_json::Value) -> bool {
        true
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = self.workspace.resolve(required_str(&arguments, "file_path")?);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(_) => return Ok(ToolResult::failure(format!("File not found: {}", path.display()))),
        };

        if metadata.len() > self.max_bytes {
            return Ok(ToolResult::failure(format!(
                "File too large: {} is {} bytes, limit is {} bytes",
                path.display(),
                metadata.len(),
                self.max_bytes
            )));
        }

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(ToolResult::success(format!(
                "Content of {}:\n\n{content}",
                path.display()
            ))),
            Err(e) => Ok(ToolResult::failure(format!("Failed to read file: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn tool_definition() {
        let tool = FileReadTool::new(Workspace::new("."), 10);
        assert_eq!(tool.name(), "read_file");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["file_path"]));
        assert!(tool.is_read_only(&serde_json::json!({})));
        assert!(tool.action(&serde_json::json!({"file_path": "x"})).is_none());
    }

    #[tokio::test]
    async fn read_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("test.txt")).unwrap();
        writeln!(f, "Hello, world!").unwrap();

        let tool = FileReadTool::new(Workspace::new(dir.path()), 10);
        let result = tool
            .execute(serde_json::json!({"file_path": "test.txt"}))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.starts_with("Content of "));
        assert!(result.output.contains("Hello, world!"));
    }

    #[tokio::test]
    async fn read_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileReadTool::new(Workspace::new(dir.path()), 10);
        let result = tool
            .execute(serde_json::json!({"file_path": "missing.txt"}))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[tokio::test]
    async fn oversized_file_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.bin"), vec![b'a'; 2 * 1024 * 1024]).unwrap();

        let tool = FileReadTool::new(Workspace::new(dir.path()), 1);
        let result = tool
            .execute(serde_json::json!({"file_path": "big.bin"}))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("File too large"));
    }

    #[tokio::test]
    async fn missing_path_argument() {
        let tool = FileReadTool::new(Workspace::new("."), 10);
        let result = tool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
