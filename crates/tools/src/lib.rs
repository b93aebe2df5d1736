//! Built-in tool implementations for Kubrick.
//!
//! Tools give the agent the ability to act on a workspace: read, write and
//! edit files, create directories, list and search the tree, and run shell
//! commands. Relative paths resolve against the task's working directory.

pub mod directory;
pub mod file_edit;
pub mod file_read;
pub mod file_write;
pub mod list_files;
pub mod search;
pub mod shell;
pub mod workspace;

use kubrick_config::SafetyConfig;
use kubrick_core::tool::ToolRegistry;
use std::path::Path;
use std::sync::Arc;

pub use workspace::Workspace;

/// Create a registry with all built-in tools bound to `working_dir`.
pub fn default_registry(working_dir: &Path, safety: &SafetyConfig) -> ToolRegistry {
    let workspace = Workspace::new(working_dir);
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(file_read::FileReadTool::new(
        workspace.clone(),
        safety.max_file_size_mb,
    )));
    registry.register(Arc::new(file_write::FileWriteTool::new(workspace.clone())));
    registry.register(Arc::new(file_edit::FileEditTool::new(workspace.clone())));
    registry.register(Arc::new(directory::CreateDirectoryTool::new(workspace.clone())));
    registry.register(Arc::new(list_files::ListFilesTool::new(workspace.clone())));
    registry.register(Arc::new(search::SearchFilesTool::new(workspace.clone())));
    registry.register(Arc::new(shell::ShellTool::new(
        workspace,
        safety.read_only_commands.clone(),
    )));
    registry
}
