//! The system prompt that teaches the model the tool-call wire format, and
//! the extra instructions for the read-only planning phase.

use kubrick_core::tool::ToolRegistry;
use std::path::Path;

/// Build the system prompt for a session rooted at `working_dir`.
pub fn system_prompt(working_dir: &Path, tools: &ToolRegistry) -> String {
    format!(
        r#"You are Kubrick, an AI coding assistant with agentic capabilities and file system access.

Current working directory: {working_dir}

# Agentic Behavior

You can ITERATE through multiple tool calls until a task is complete. You are not limited to a single response.

1. Call tools to gather information or make changes
2. Analyze the results
3. Continue calling tools as needed
4. Signal completion when done

# Completion Signal

When you've completed the task, say "TASK_COMPLETE" followed by a summary of what you accomplished.

# Tool Call Format (EXACT SYNTAX REQUIRED)

```tool_call
{{
  "tool": "tool_name",
  "parameters": {{
    "param": "value"
  }}
}}
```

# Available Tools

{tools}
# Important Rules

1. **ITERATE**: Call tools immediately when needed, then analyze results and continue
2. **MULTIPLE TOOLS**: You can call multiple tools per response
3. **READ BEFORE EDIT**: Always read a file before editing it
4. **EXPLORE THOROUGHLY**: Use `**/*` patterns with `list_files` to see files in subdirectories
5. **NEVER INVENT RESULTS**: Tool results are sent back to you; never write them yourself
6. **SIGNAL COMPLETION**: Say "TASK_COMPLETE" when the task is done

# Example

User: "Read main.py and add logging to all functions"
Assistant: I'll first read the file to understand its structure.

```tool_call
{{
  "tool": "read_file",
  "parameters": {{
    "file_path": "main.py"
  }}
}}
```
"#,
        working_dir = working_dir.display(),
        tools = tools.describe(),
    )
}

/// Appended to the history for the planning phase only.
pub const PLANNING_PROMPT: &str = r#"# PLANNING MODE

You are in PLANNING MODE. Explore the codebase with read-only tools and write an implementation plan. Do not change anything yet: writes, edits and shell commands that modify files are refused.

Read-only tools: read_file, list_files, search_files, and read-only run_command invocations such as ls, cat, grep, find, git status, git log and git diff.

When you understand the code, reply with the plan in this format:

## Implementation Plan

### Overview
What will change and why.

### Steps
1. Each step, naming the files involved

### Files to Modify
- path: what changes

### Risks
- Anything that could break

Say PLAN_COMPLETE after the plan."#;

/// First user turn of the planning phase.
pub fn planning_request(task: &str) -> String {
    format!("Task: {task}\n\nPlease explore the codebase and create an implementation plan.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_directory_format_and_tools() {
        let dir = tempfile::tempdir().unwrap();
        let registry = kubrick_tools::default_registry(dir.path(), &kubrick_config::SafetyConfig::default());
        let prompt = system_prompt(dir.path(), &registry);

        assert!(prompt.starts_with("You are Kubrick"));
        assert!(prompt.contains(&dir.path().display().to_string()));
        assert!(prompt.contains("```tool_call\n{\n  \"tool\": \"tool_name\""));
        assert!(prompt.contains("TASK_COMPLETE"));
        for name in registry.names() {
            assert!(prompt.contains(&format!("## {name}")), "{name}");
        }
    }

    #[test]
    fn planning_prompt_names_the_marker_and_format() {
        assert!(PLANNING_PROMPT.contains("PLAN_COMPLETE"));
        assert!(PLANNING_PROMPT.contains("## Implementation Plan"));
        assert!(crate::parser::parse(PLANNING_PROMPT).calls.is_empty());
        assert_eq!(
            planning_request("Add caching"),
            "Task: Add caching\n\nPlease explore the codebase and create an implementation plan."
        );
    }

    #[test]
    fn example_block_parses() {
        let prompt = system_prompt(Path::new("/tmp"), &ToolRegistry::new());
        let parsed = crate::parser::parse(&prompt);
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.calls.len(), 2);
        assert_eq!(parsed.calls[1].name, "read_file");
    }
}
