//! Concurrent tool execution.
//!
//! Read-only calls of one turn run in parallel on a bounded pool; calls that
//! mutate the workspace run one at a time once every read has finished.
//! Every call yields exactly one [`ToolResult`], in the order the calls were
//! given. A read-only scheduler refuses every mutating call outright.

use futures::FutureExt;
use kubrick_config::SchedulerConfig;
use kubrick_core::error::AgentError;
use kubrick_core::event::{AgentEvent, EventBus};
use kubrick_core::tool::{ToolCall, ToolRegistry, ToolResult};
use kubrick_security::SafetyGate;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Runs tool calls behind the safety gate.
#[derive(Clone)]
pub struct ToolScheduler {
    registry: Arc<ToolRegistry>,
    gate: Arc<SafetyGate>,
    events: Option<Arc<EventBus>>,
    config: SchedulerConfig,
    read_only: bool,
}

impl ToolScheduler {
    pub fn new(registry: Arc<ToolRegistry>, gate: Arc<SafetyGate>, config: SchedulerConfig) -> Self {
        Self {
            registry,
            gate,
            events: None,
            config,
            read_only: false,
        }
    }

    /// A copy that refuses every call the registry does not class as
    /// read-only, used while planning.
    pub fn read_only(&self) -> Self {
        Self {
            read_only: true,
            ..self.clone()
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a batch of calls. The result vector matches `calls` in length
    /// and order.
    pub async fn execute(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut results: Vec<Option<ToolResult>> = vec![None; calls.len()];
        let (reads, writes): (Vec<usize>, Vec<usize>) =
            (0..calls.len()).partition(|&i| self.registry.is_read_only(&calls[i]));

        debug!(reads = reads.len(), writes = writes.len(), "Scheduling tool calls");

        if self.config.enable_parallel && reads.len() > 1 {
            self.run_parallel(calls, &reads, &mut results).await;
        } else {
            for &i in &reads {
                results[i] = Some(self.run_guarded(calls[i].clone()).await);
            }
        }

        for &i in &writes {
            results[i] = Some(self.run_guarded(calls[i].clone()).await);
        }

        results
            .into_iter()
            .zip(calls)
            .map(|(result, call)| {
                result.unwrap_or_else(|| {
                    ToolResult::failure(format!("Tool '{}' was cancelled", call.name)).for_call(call, 0)
                })
            })
            .collect()
    }

    async fn run_parallel(&self, calls: &[ToolCall], indices: &[usize], results: &mut [Option<ToolResult>]) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let mut set = JoinSet::new();

        for &i in indices {
            let this = self.clone();
            let call = calls[i].clone();
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (i, this.run_guarded(call).await)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((i, result)) => results[i] = Some(result),
                Err(e) => warn!(error = %e, "Tool task did not complete"),
            }
        }
    }

    /// Run one call, turning a panic into a failed result.
    async fn run_guarded(&self, call: ToolCall) -> ToolResult {
        let started = Instant::now();
        match AssertUnwindSafe(self.run_one(&call)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                warn!(tool = %call.name, "Tool panicked");
                let result = ToolResult::failure(
                    AgentError::ToolExecution {
                        tool_name: call.name.clone(),
                        reason: "the tool panicked".into(),
                    }
                    .to_string(),
                )
                .for_call(&call, started.elapsed().as_millis() as u64);
                self.finished(&result);
                result
            }
        }
    }

    async fn run_one(&self, call: &ToolCall) -> ToolResult {
        self.publish(AgentEvent::ToolCallIssued {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            parameters: call.parameters.clone(),
            fallback: call.fallback,
        });

        let started = Instant::now();
        let result = match self.registry.get(&call.name) {
            None => ToolResult::failure(format!(
                "Unknown tool '{}'. Available tools: {}",
                call.name,
                self.registry.names().join(", ")
            )),
            Some(_) if self.read_only && !self.registry.is_read_only(call) => {
                debug!(tool = %call.name, "Mutating call refused while planning");
                ToolResult::failure(format!(
                    "Tool '{}' is not allowed in planning mode (read-only)",
                    call.name
                ))
            }
            Some(tool) => match tool.action(&call.parameters) {
                Some(action) if !self.gate.authorize(&action).await.is_allowed() => {
                    debug!(tool = %call.name, action = %action, "Tool call denied");
                    ToolResult::failure(
                        AgentError::PermissionDenied {
                            subject: action.to_string(),
                        }
                        .to_string(),
                    )
                }
                _ => {
                    let timeout_secs = self.config.tool_timeout_secs;
                    match tokio::time::timeout(
                        Duration::from_secs(timeout_secs),
                        tool.execute(call.parameters.clone()),
                    )
                    .await
                    {
                        Ok(Ok(result)) => result,
                        Ok(Err(e)) => ToolResult::failure(e.to_string()),
                        Err(_) => {
                            warn!(tool = %call.name, timeout_secs, "Tool timed out");
                            ToolResult::failure(
                                AgentError::ToolTimeout {
                                    tool_name: call.name.clone(),
                                    timeout_secs,
                                }
                                .to_string(),
                            )
                        }
                    }
                }
            },
        }
        .for_call(call, started.elapsed().as_millis() as u64);

        self.finished(&result);
        result
    }

    fn finished(&self, result: &ToolResult) {
        debug!(
            tool = %result.tool_name,
            success = result.success,
            duration_ms = result.duration_ms,
            "Tool call finished"
        );
        self.publish(AgentEvent::ToolCallFinished {
            call_id: result.call_id.clone(),
            tool_name: result.tool_name.clone(),
            success: result.success,
            duration_ms: result.duration_ms,
        });
    }

    fn publish(&self, event: AgentEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}
