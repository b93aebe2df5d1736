//! `kubrick agent`: interactive session or a single task.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use kubrick_agent::{AgentLoop, RunOutcome, Termination, ToolScheduler};
use kubrick_config::AppConfig;
use kubrick_core::event::{AgentEvent, EventBus};
use kubrick_security::{FilePermissionStore, SafetyGate, TerminalPrompter};
use tokio::sync::broadcast;
use tracing::info;

pub async fn run(
    message: Option<String>,
    working_dir: Option<PathBuf>,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if yes {
        config.safety.require_confirmation = false;
    }

    let working_dir = resolve_working_dir(working_dir, &config)?;

    let router = kubrick_providers::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;

    let events = Arc::new(EventBus::default());
    let gate = SafetyGate::new(&config.safety, &working_dir, Arc::new(TerminalPrompter::new()))?
        .with_store(Arc::new(FilePermissionStore::new(AppConfig::permissions_path())))
        .with_events(events.clone());

    let registry = kubrick_tools::default_registry(&working_dir, &config.safety);
    let system_prompt = kubrick_agent::system_prompt(&working_dir, &registry);
    let tool_names = registry.names().join(", ");
    let scheduler = ToolScheduler::new(Arc::new(registry), Arc::new(gate), config.scheduler.clone())
        .with_events(events.clone());

    let mut agent = AgentLoop::new(provider.clone(), scheduler, &config, events.clone())?
        .with_system_prompt(system_prompt);
    // Unattended runs go straight to execution.
    if !yes {
        agent = agent.with_plan_reviewer(Arc::new(TerminalPrompter::new()));
    }

    info!(
        provider = %provider.name(),
        model = %provider.model(),
        working_dir = %working_dir.display(),
        confirmation = config.safety.require_confirmation,
        planning = !yes && config.agent.enable_planning,
        "Agent session starting"
    );

    let renderer = tokio::spawn(render_events(events.subscribe()));

    if let Some(task) = message {
        let outcome = agent.run(&task).await;
        print_summary(&outcome);
        renderer.abort();
        if let Termination::Failed(e) = outcome.termination
            && !e.is_graceful()
        {
            return Err(e.into());
        }
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║         Kubrick · Interactive Mode           ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", provider.name());
    println!("  Model:     {}", provider.model());
    println!("  Directory: {}", working_dir.display());
    println!("  Tools:     {tool_names}");
    println!();
    println!("  Type a task and press Enter. 'exit' quits, 'clear' starts over.");
    println!();

    let mut conversation = agent.new_conversation();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = read_line().await? else {
            break;
        };
        let task = line.trim();
        match task {
            "" => continue,
            "exit" | "quit" => break,
            "clear" => {
                conversation = agent.new_conversation();
                println!("  Conversation cleared.");
                continue;
            }
            _ => {}
        }

        let outcome = agent.run_in(conversation, task).await;
        print_summary(&outcome);
        conversation = outcome.conversation;
    }

    renderer.abort();
    println!();
    println!("  Goodbye!");
    Ok(())
}

fn resolve_working_dir(
    requested: Option<PathBuf>,
    config: &AppConfig,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let dir = match requested.or_else(|| config.default_working_dir.as_ref().map(PathBuf::from)) {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    if !dir.is_dir() {
        return Err(format!("Working directory {} does not exist", dir.display()).into());
    }
    Ok(std::fs::canonicalize(&dir).unwrap_or(dir))
}

/// Read one line from stdin on the blocking pool, the same way the
/// permission prompter does. `None` at end of input.
async fn read_line() -> std::io::Result<Option<String>> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line)? {
            0 => Ok(None),
            _ => Ok(Some(line)),
        }
    })
    .await
    .map_err(std::io::Error::other)?
}

async fn render_events(mut rx: broadcast::Receiver<Arc<AgentEvent>>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let AgentEvent::AssistantDelta { content } = event.as_ref() {
                    print!("{content}");
                    let _ = std::io::stdout().flush();
                } else if let Some(line) = describe(&event) {
                    eprintln!("{line}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                eprintln!("  … {missed} events skipped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// One status line per event; `None` for events shown elsewhere.
fn describe(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::IterationStarted {
            iteration,
            max_iterations,
        } => Some(format!("\n  ── iteration {iteration}/{max_iterations} ──")),
        AgentEvent::AssistantDelta { .. } => None,
        AgentEvent::ToolCallIssued {
            tool_name,
            parameters,
            fallback,
            ..
        } => {
            let note = if *fallback { " (unfenced)" } else { "" };
            Some(format!("\n  → {tool_name}{note} {parameters}"))
        }
        AgentEvent::ToolCallFinished {
            tool_name,
            success,
            duration_ms,
            ..
        } => {
            let mark = if *success { "✓" } else { "✗" };
            Some(format!("  {mark} {tool_name} ({duration_ms} ms)"))
        }
        AgentEvent::ContextRewritten {
            action,
            tokens_before,
            tokens_after,
        } => Some(format!(
            "  [context {}: {tokens_before} → {tokens_after} tokens]",
            action.as_str()
        )),
        AgentEvent::PermissionPrompt { .. } => None,
        AgentEvent::PermissionDecided {
            action,
            allowed,
            scope,
        } => {
            let verdict = if *allowed { "allowed" } else { "denied" };
            Some(format!("  [{action}: {verdict} ({scope})]"))
        }
        AgentEvent::Warning { message } => Some(format!("  ⚠️  {message}")),
        AgentEvent::LoopTerminated { .. } => None,
    }
}

fn print_summary(outcome: &RunOutcome) {
    println!();
    match &outcome.termination {
        Termination::Completed { signal, .. } => eprintln!(
            "\n  Completed in {} iteration(s) with {} tool call(s) [{signal}]",
            outcome.iterations, outcome.tool_calls_executed
        ),
        Termination::Failed(e) if e.is_graceful() => eprintln!(
            "\n  Stopped after {} iteration(s) with {} tool call(s): {e}",
            outcome.iterations, outcome.tool_calls_executed
        ),
        Termination::Failed(e) => eprintln!("\n  [Error] {e}"),
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubrick_core::event::ContextAction;
    use kubrick_core::tool::{Action, ActionKind};

    #[test]
    fn describes_tool_and_context_events() {
        let issued = AgentEvent::ToolCallIssued {
            call_id: "call_1".into(),
            tool_name: "read_file".into(),
            parameters: serde_json::json!({"file_path": "main.rs"}),
            fallback: true,
        };
        let line = describe(&issued).unwrap();
        assert!(line.contains("read_file (unfenced)"));
        assert!(line.contains("main.rs"));

        let rewritten = AgentEvent::ContextRewritten {
            action: ContextAction::Summarized,
            tokens_before: 7000,
            tokens_after: 1200,
        };
        assert_eq!(
            describe(&rewritten).unwrap(),
            "  [context summarized: 7000 → 1200 tokens]"
        );

        let decided = AgentEvent::PermissionDecided {
            action: Action::new(ActionKind::WriteFile, "notes.md"),
            allowed: false,
            scope: "once".into(),
        };
        assert_eq!(describe(&decided).unwrap(), "  [write_file notes.md: denied (once)]");
    }

    #[test]
    fn deltas_are_not_described() {
        assert!(describe(&AgentEvent::AssistantDelta { content: "hi".into() }).is_none());
    }

    #[test]
    fn missing_working_dir_is_rejected() {
        let config = AppConfig::default();
        let err = resolve_working_dir(Some(PathBuf::from("/definitely/not/here")), &config).unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_working_dir(Some(dir.path().to_path_buf()), &config).unwrap();
        assert!(resolved.is_absolute());
    }
}
