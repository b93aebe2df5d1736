//! Shell tool: run a command in the working directory.
//!
//! Commands that only observe the workspace (per the configured read-only
//! list) are reported read-only so the scheduler may run them in parallel.

use async_trait::async_trait;
use kubrick_core::error::ToolError;
use kubrick_core::tool::{Action, ActionKind, Tool, ToolResult};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::workspace::{Workspace, required_str};

pub struct ShellTool {
    workspace: Workspace,
    read_only_commands: Vec<String>,
}

impl ShellTool {
    pub fn new(workspace: Workspace, read_only_commands: Vec<String>) -> Self {
        Self {
            workspace,
            read_only_commands,
        }
    }

    /// True when every segment of a command list starts with a read-only
    /// command, no argument mutates anything, and nothing is redirected,
    /// backgrounded or executed indirectly.
    pub fn is_read_only_command(&self, command: &str) -> bool {
        const WRITES: [&str; 5] = [">", "`", "$(", "-delete", "-exec"];
        if command.trim().is_empty() || WRITES.iter().any(|w| command.contains(w)) {
            return false;
        }

        let list = command.replace("&&", ";").replace("||", ";");
        // A lone `&` backgrounds the left side and starts another command
        if list.contains('&') {
            return false;
        }

        list.split([';', '|', '\n', '\r'])
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .all(|segment| self.starts_read_only(segment) && !mutating_arguments(segment))
    }

    fn starts_read_only(&self, segment: &str) -> bool {
        self.read_only_commands.iter().any(|ro| {
            segment == ro
                || segment
                    .strip_prefix(ro.as_str())
                    .is_some_and(|rest| rest.starts_with(char::is_whitespace))
        })
    }
}

/// `find` actions that write files or run commands.
const FIND_WRITES: [&str; 6] = ["-fprint", "-fprint0", "-fprintf", "-fls", "-ok", "-okdir"];

/// `git branch` flags that only list.
const GIT_BRANCH_LISTS: [&str; 12] = [
    "-a", "-r", "-v", "-vv", "-l", "--all", "--remotes", "--verbose", "--list", "--show-current",
    "--no-color", "--color",
];

/// Arguments that turn an otherwise read-only command into a mutation.
fn mutating_arguments(segment: &str) -> bool {
    let words: Vec<&str> = segment.split_whitespace().collect();
    match words.as_slice() {
        ["find", args @ ..] => args.iter().any(|a| FIND_WRITES.contains(a)),
        // Any positional argument names a branch to create
        ["git", "branch", args @ ..] => args.iter().any(|a| !GIT_BRANCH_LISTS.contains(a)),
        ["tree", args @ ..] => args.iter().any(|a| a.starts_with("-o")),
        ["date", args @ ..] => args.iter().any(|a| a.starts_with("-s") || a.starts_with("--set")),
        _ => false,
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the working directory and return its output"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Seconds before the command is killed"
                }
            },
            "required": ["command"]
        })
    }

    fn is_read_only(&self, arguments: &serde_json::Value) -> bool {
        arguments["command"]
            .as_str()
            .is_some_and(|c| self.is_read_only_command(c))
    }

    fn action(&self, arguments: &serde_json::Value) -> Option<Action> {
        let command = arguments["command"].as_str()?;
        Some(Action::new(ActionKind::RunCommand, command))
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = required_str(&arguments, "command")?;
        let timeout_secs = arguments["timeout"].as_u64();

        debug!(command = %command, "Executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.current_dir(self.workspace.root()).kill_on_drop(true);

        let output = match timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), cmd.output()).await {
                Ok(output) => output,
                Err(_) => {
                    warn!(command = %command, timeout_secs = secs, "Command timed out");
                    return Ok(ToolResult::failure(format!("Command timed out after {secs} seconds")));
                }
            },
            None => cmd.output().await,
        };

        let output = output.map_err(|e| ToolError::ExecutionFailed {
            tool_name: "run_command".into(),
            reason: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output.status.code().unwrap_or(-1);
        if !output.status.success() {
            debug!(command = %command, exit_code = code, "Command exited non-zero");
        }

        let mut text = format!("Command: {command}\nExit code: {code}\n\n{stdout}");
        if !stderr.is_empty() {
            text.push_str(&format!("\nSTDERR:\n{stderr}"));
        }

        // A non-zero exit is reported, not failed: the model reads the code
        Ok(ToolResult::success(text.trim_end().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubrick_config::SafetyConfig;

    fn tool_in(dir: &std::path::Path) -> ShellTool {
        ShellTool::new(Workspace::new(dir), SafetyConfig::default().read_only_commands)
    }

    #[test]
    fn read_only_classification() {
        let tool = tool_in(std::path::Path::new("."));
        assert!(tool.is_read_only_command("ls -la"));
        assert!(tool.is_read_only_command("pwd"));
        assert!(tool.is_read_only_command("cat Cargo.toml | grep name"));
        assert!(tool.is_read_only_command("git status && git diff"));
        assert!(!tool.is_read_only_command("git commit -m wip"));
        assert!(!tool.is_read_only_command("ls > listing.txt"));
        assert!(!tool.is_read_only_command("find . -name '*.o' -delete"));
        assert!(!tool.is_read_only_command("ls; rm -rf build"));
        assert!(!tool.is_read_only_command("lsblk"));
        assert!(!tool.is_read_only_command("echo $(rm x)"));
        assert!(!tool.is_read_only_command("   "));
    }

    #[test]
    fn separators_cannot_hide_a_mutation() {
        let tool = tool_in(std::path::Path::new("."));
        assert!(!tool.is_read_only_command("ls\ntouch created.txt"));
        assert!(!tool.is_read_only_command("ls\r\nrm notes.txt"));
        assert!(!tool.is_read_only_command("ls & rm notes.txt"));
        assert!(!tool.is_read_only_command("cat notes.txt &"));
        assert!(tool.is_read_only_command("ls\npwd"));
    }

    #[test]
    fn mutating_arguments_are_not_read_only() {
        let tool = tool_in(std::path::Path::new("."));
        assert!(!tool.is_read_only_command("git branch -D main"));
        assert!(!tool.is_read_only_command("git branch feature"));
        assert!(!tool.is_read_only_command("git branch -m old new"));
        assert!(tool.is_read_only_command("git branch"));
        assert!(tool.is_read_only_command("git branch -a"));
        assert!(tool.is_read_only_command("git branch --show-current"));

        assert!(!tool.is_read_only_command("find . -fprint out.txt"));
        assert!(!tool.is_read_only_command("find . -name '*.rs' -fprintf out.txt %p"));
        assert!(!tool.is_read_only_command("find . -fls listing"));
        assert!(!tool.is_read_only_command("find . -ok rm {} ;"));
        assert!(tool.is_read_only_command("find . -name '*.rs' -type f"));

        assert!(!tool.is_read_only_command("tree -o tree.txt"));
        assert!(!tool.is_read_only_command("date -s 2020-01-01"));
        assert!(tool.is_read_only_command("tree -L 2"));
    }

    #[test]
    fn action_is_the_command() {
        let tool = tool_in(std::path::Path::new("."));
        let args = serde_json::json!({"command": "cargo build"});
        assert_eq!(tool.action(&args), Some(Action::new(ActionKind::RunCommand, "cargo build")));
        assert!(!tool.is_read_only(&args));
    }

    #[tokio::test]
    async fn runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();

        let tool = tool_in(dir.path());
        let result = tool
            .execute(serde_json::json!({"command": "ls"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.starts_with("Command: ls\nExit code: 0"));
        assert!(result.output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_in(dir.path());
        let result = tool
            .execute(serde_json::json!({"command": "echo oops >&2; exit 3"}))
            .await
            .unwrap();
        assert!(result.output.contains("Exit code: 3"));
        assert!(result.output.contains("STDERR:\noops"));
    }

    #[tokio::test]
    async fn timeout_kills_command() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool_in(dir.path());
        let result = tool
            .execute(serde_json::json!({"command": "sleep 5", "timeout": 1}))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Command timed out after 1 seconds"));
    }
}
