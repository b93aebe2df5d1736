//! The agent reasoning loop implementation.
//!
//! One task runs as `THINKING -> PARSING -> EXECUTING_TOOLS -> THINKING ...`
//! until a completion signal arrives on a turn with no tool calls left, or a
//! budget or guard ends it. Every exit hands the transcript back.
//!
//! Complex tasks can first run a planning phase: the same loop, restricted
//! to read-only tools, whose final answer is reviewed before execution.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kubrick_config::{AgentConfig, AppConfig};
use kubrick_core::error::{AgentError, ProviderError};
use kubrick_core::event::{AgentEvent, EventBus};
use kubrick_core::message::{Conversation, Message, Role};
use kubrick_core::provider::{Provider, ProviderRequest};
use kubrick_core::tool::ToolCall;
use kubrick_security::{PlanDecision, Prompter};
use tracing::{debug, info, warn};

use crate::completion::{CompletionDetector, CompletionSignal, PatternError};
use crate::context::token::estimate_messages_tokens;
use crate::context::{ContextManager, truncate_tool_output};
use crate::parser;
use crate::prompt;
use crate::scheduler::ToolScheduler;
use crate::strategy::{ExecutionMode, ExecutionPlan, ExecutionStrategy, TaskClassifier};

/// Appended when a turn neither calls a tool nor finishes the task.
const NUDGE: &str = "Continue with the next step. Call a tool, or say TASK_COMPLETE if the task is done.";
const PLANNING_NUDGE: &str =
    "Continue exploring with read-only tools, or write the implementation plan and say PLAN_COMPLETE.";
const PLAN_APPROVED: &str = "The plan is approved. Carry it out.";

/// The answer of a completed task.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalAnswer {
    pub text: String,
    pub signal: CompletionSignal,
}

#[derive(Debug, Clone)]
pub enum Termination {
    Completed { signal: CompletionSignal, answer: String },
    Failed(AgentError),
}

impl Termination {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Short reason used in events and logs.
    pub fn reason(&self) -> String {
        match self {
            Self::Completed { signal, .. } => signal.to_string(),
            Self::Failed(e) => e.to_string(),
        }
    }
}

/// Everything a finished run hands back, whatever the exit.
#[derive(Debug)]
pub struct RunOutcome {
    pub termination: Termination,
    pub conversation: Conversation,
    pub iterations: u32,
    pub tool_calls_executed: usize,
    pub warnings: Vec<String>,
    pub plan: ExecutionPlan,
}

impl RunOutcome {
    pub fn into_result(self) -> Result<FinalAnswer, AgentError> {
        match self.termination {
            Termination::Completed { signal, answer } => Ok(FinalAnswer { text: answer, signal }),
            Termination::Failed(e) => Err(e),
        }
    }
}

/// Mutable bookkeeping for one task.
struct LoopState {
    iteration: u32,
    tool_calls_this_turn: usize,
    tool_calls_executed: usize,
    started: Instant,
    consecutive_empty_responses: u32,
    consecutive_stuck_count: u32,
    pending_calls: VecDeque<ToolCall>,
    seen_signatures: HashSet<String>,
    seen_texts: HashSet<String>,
    produced_output: bool,
    warnings: Vec<String>,
}

impl LoopState {
    /// Fresh state for one phase; phases of a task share `started`.
    fn new(started: Instant) -> Self {
        Self {
            iteration: 0,
            tool_calls_this_turn: 0,
            tool_calls_executed: 0,
            started,
            consecutive_empty_responses: 0,
            consecutive_stuck_count: 0,
            pending_calls: VecDeque::new(),
            seen_signatures: HashSet::new(),
            seen_texts: HashSet::new(),
            produced_output: false,
            warnings: Vec::new(),
        }
    }

    /// Record a turn and report whether it did anything new.
    fn record_progress(&mut self, calls: &[ToolCall], text: &str) -> bool {
        if calls.is_empty() {
            let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
            self.seen_texts.insert(normalized)
        } else {
            calls
                .iter()
                .fold(false, |new, call| self.seen_signatures.insert(call.signature()) || new)
        }
    }
}

/// Model and token sizes for one task.
#[derive(Debug, Clone, PartialEq)]
struct TurnBudget {
    model: String,
    window_tokens: usize,
    /// Never more than half the window
    reserved_output_tokens: usize,
}

/// The core agent loop that orchestrates provider calls and tool execution.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    scheduler: ToolScheduler,
    context: ContextManager,
    detector: CompletionDetector,
    config: AgentConfig,
    temperature: f32,
    max_tool_result_chars: usize,
    system_prompt: String,
    events: Arc<EventBus>,
    reviewer: Option<Arc<dyn Prompter>>,
}

impl AgentLoop {
    /// Build a loop from the application config. Fails only when a pattern
    /// table does not compile.
    pub fn new(
        provider: Arc<dyn Provider>,
        scheduler: ToolScheduler,
        config: &AppConfig,
        events: Arc<EventBus>,
    ) -> Result<Self, PatternError> {
        let detector = CompletionDetector::from_config(&config.patterns)?;
        let system_prompt = prompt::system_prompt(Path::new("."), scheduler.registry());

        Ok(Self {
            context: ContextManager::new(config.context.clone()).with_summarizer(provider.clone()),
            provider,
            scheduler,
            detector,
            config: config.agent.clone(),
            temperature: config.default_temperature,
            max_tool_result_chars: config.context.max_tool_result_chars,
            system_prompt,
            events,
            reviewer: None,
        })
    }

    /// Review plans with `reviewer`. Without one, planning is skipped.
    pub fn with_plan_reviewer(mut self, reviewer: Arc<dyn Prompter>) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Start a fresh conversation for a new session.
    pub fn new_conversation(&self) -> Conversation {
        Conversation::with_system_prompt(self.system_prompt.clone())
    }

    /// Run `task` in a fresh conversation.
    pub async fn run(&self, task: &str) -> RunOutcome {
        self.run_in(self.new_conversation(), task).await
    }

    /// Run `task` as the next turn of an existing conversation.
    pub async fn run_in(&self, mut conversation: Conversation, task: &str) -> RunOutcome {
        if conversation.messages.first().is_none_or(|m| m.role != Role::System) {
            conversation.messages.insert(0, Message::system(self.system_prompt.clone()));
        }
        conversation.push(Message::user(task));

        let plan = if self.config.classify_tasks {
            let classification = TaskClassifier::classify(self.provider.as_ref(), task).await;
            ExecutionStrategy::for_classification(&classification, &self.config)
        } else {
            ExecutionStrategy::unclassified(&self.config, self.temperature)
        };

        let budget = self.turn_budget(&plan);
        info!(
            conversation_id = %conversation.id,
            mode = plan.mode.as_str(),
            model = %budget.model,
            max_iterations = plan.max_iterations,
            planning = plan.use_planning,
            "Starting task"
        );

        let started = Instant::now();
        let mut planning = LoopState::new(started);
        let reviewed = match &self.reviewer {
            Some(reviewer) if plan.use_planning => {
                self.plan_first(&mut conversation, task, &plan, &budget, reviewer.as_ref(), &mut planning)
                    .await
            }
            _ => Ok(()),
        };

        let mut state = LoopState::new(started);
        let termination = match reviewed {
            Ok(()) => {
                self.drive(&mut conversation, &plan, &budget, &self.scheduler, &mut state)
                    .await
            }
            Err(termination) => termination,
        };

        let iterations = planning.iteration + state.iteration;
        let tool_calls_executed = planning.tool_calls_executed + state.tool_calls_executed;
        let mut warnings = planning.warnings;
        warnings.append(&mut state.warnings);

        info!(
            conversation_id = %conversation.id,
            reason = %termination.reason(),
            completed = termination.is_completed(),
            iterations,
            tool_calls = tool_calls_executed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Task finished"
        );
        self.events.publish(AgentEvent::LoopTerminated {
            reason: termination.reason(),
            completed: termination.is_completed(),
            iterations,
        });

        RunOutcome {
            termination,
            conversation,
            iterations,
            tool_calls_executed,
            warnings,
            plan,
        }
    }

    /// Model for the plan's tier and the window it gets. The reply
    /// reservation is clamped so small windows still leave room for input.
    fn turn_budget(&self, plan: &ExecutionPlan) -> TurnBudget {
        let model = self
            .config
            .tier_model(self.provider.name(), plan.model_tier)
            .unwrap_or(self.provider.model())
            .to_string();
        let window_tokens = self.context.config().window_for(&model);
        let reserved_output_tokens = (plan.max_output_tokens as usize).min(window_tokens / 2);
        if reserved_output_tokens < plan.max_output_tokens as usize {
            debug!(
                model = %model,
                window_tokens,
                requested = plan.max_output_tokens,
                reserved_output_tokens,
                "Reply reservation clamped to half the window"
            );
        }
        TurnBudget {
            model,
            window_tokens,
            reserved_output_tokens,
        }
    }

    /// Explore read-only, then have the plan reviewed. On approval the plan
    /// and the reviewer's answer join `conversation`; otherwise the task ends
    /// with the returned termination.
    async fn plan_first(
        &self,
        conversation: &mut Conversation,
        task: &str,
        execution: &ExecutionPlan,
        budget: &TurnBudget,
        reviewer: &dyn Prompter,
        state: &mut LoopState,
    ) -> Result<(), Termination> {
        let plan = ExecutionStrategy::planning(execution, &self.config);
        info!(max_iterations = plan.max_iterations, "Planning before execution");

        let mut scratch = conversation.clone();
        scratch.push(Message::system(prompt::PLANNING_PROMPT));
        scratch.push(Message::user(prompt::planning_request(task)));

        let explored = self
            .drive(&mut scratch, &plan, budget, &self.scheduler.read_only(), state)
            .await;
        let text = match explored {
            Termination::Completed { answer, .. } => answer,
            Termination::Failed(e) if e.is_graceful() => {
                self.warn(state, format!("Planning ended early: {e}"));
                scratch
                    .last_with_role(Role::Assistant)
                    .map(|m| parser::parse(&m.content).prose)
                    .unwrap_or_default()
            }
            Termination::Failed(e) => return Err(Termination::Failed(e)),
        };

        let plan_text = text.replace("PLAN_COMPLETE", "").trim().to_string();
        if plan_text.is_empty() {
            self.warn(state, "Planning produced no plan; executing directly".to_string());
            return Ok(());
        }

        match reviewer.review_plan(&plan_text).await {
            PlanDecision::Approve => {
                info!("Plan approved");
                conversation.push(Message::assistant(plan_text));
                conversation.push(Message::user(PLAN_APPROVED));
                Ok(())
            }
            PlanDecision::Modify(changes) => {
                info!(%changes, "Plan approved with modifications");
                conversation.push(Message::assistant(plan_text));
                conversation.push(Message::user(format!("Plan modifications: {changes}")));
                Ok(())
            }
            PlanDecision::Reject => {
                info!("Plan rejected");
                conversation.push(Message::assistant(plan_text));
                Err(Termination::Failed(AgentError::PlanRejected))
            }
        }
    }

    async fn drive(
        &self,
        conversation: &mut Conversation,
        plan: &ExecutionPlan,
        budget: &TurnBudget,
        scheduler: &ToolScheduler,
        state: &mut LoopState,
    ) -> Termination {
        let total = Duration::from_secs(self.config.total_timeout_secs);
        let time_exceeded = || {
            Termination::Failed(AgentError::TimeBudgetExceeded {
                timeout_secs: self.config.total_timeout_secs,
            })
        };

        loop {
            if state.iteration >= plan.max_iterations {
                return Termination::Failed(AgentError::IterationBudgetExceeded {
                    max_iterations: plan.max_iterations,
                });
            }
            let Some(remaining) = total.checked_sub(state.started.elapsed()).filter(|d| !d.is_zero()) else {
                return time_exceeded();
            };

            state.iteration += 1;
            state.tool_calls_this_turn = 0;
            debug!(
                conversation_id = %conversation.id,
                iteration = state.iteration,
                pending = state.pending_calls.len(),
                "Agent loop iteration"
            );
            self.events.publish(AgentEvent::IterationStarted {
                iteration: state.iteration,
                max_iterations: plan.max_iterations,
            });

            // Deferred calls run before the model is asked anything new.
            if !state.pending_calls.is_empty() {
                self.execute_pending(conversation, scheduler, state).await;
                continue;
            }

            let reserved = budget.reserved_output_tokens;
            match self.context.fit(&mut conversation.messages, budget.window_tokens, reserved).await {
                Ok(report) => {
                    if let Some(action) = report.action {
                        self.events.publish(AgentEvent::ContextRewritten {
                            action,
                            tokens_before: report.tokens_before,
                            tokens_after: report.tokens_after,
                        });
                    }
                }
                Err(e) => return Termination::Failed(e),
            }

            let request = ProviderRequest::new(budget.model.clone(), conversation.messages.clone())
                .with_temperature(plan.temperature)
                .with_max_tokens(reserved as u32);

            let text = match tokio::time::timeout(remaining, self.stream_response(request)).await {
                Err(_) => return time_exceeded(),
                Ok(Err(ProviderError::ContextLengthExceeded(message))) => {
                    warn!(%message, "Provider rejected the context length");
                    return Termination::Failed(AgentError::ContextOverflow {
                        tokens: estimate_messages_tokens(&conversation.messages),
                        budget: budget.window_tokens.saturating_sub(reserved),
                    });
                }
                Ok(Err(e)) => return Termination::Failed(AgentError::Provider(e)),
                Ok(Ok(text)) => text,
            };

            if text.trim().is_empty() {
                state.consecutive_empty_responses += 1;
                let count = state.consecutive_empty_responses;
                warn!(count, "Empty response from provider");
                if count >= self.config.max_consecutive_empty_responses {
                    if state.produced_output {
                        let answer = conversation
                            .last_with_role(Role::Assistant)
                            .map(|m| m.content.clone())
                            .unwrap_or_default();
                        return Termination::Completed {
                            signal: CompletionSignal::EmptyResponse,
                            answer,
                        };
                    }
                    return Termination::Failed(AgentError::EmptyResponses { count });
                }
                continue;
            }
            state.consecutive_empty_responses = 0;

            conversation.push(Message::assistant(text.clone()));
            state.produced_output = true;

            if !plan.use_tools {
                return Termination::Completed {
                    signal: CompletionSignal::DirectAnswer,
                    answer: text.trim().to_string(),
                };
            }

            let parsed = parser::parse(&text);
            if parsed.used_fallback {
                self.warn(state, format!("Recovered {} tool call(s) from bare JSON", parsed.calls.len()));
            }
            if !parsed.errors.is_empty() {
                let details: Vec<String> = parsed.errors.iter().map(|e| e.message.clone()).collect();
                for detail in &details {
                    self.warn(state, format!("Malformed tool call: {detail}"));
                }
                conversation.push(Message::tool_result(
                    "tool_call_parser",
                    format!(
                        "Error: {}. Resend the call using the exact ```tool_call format with a JSON object holding \"tool\" and \"parameters\".",
                        details.join("; ")
                    ),
                ));
            }

            let progressed = state.record_progress(&parsed.calls, &text);

            if parsed.has_calls() {
                // A completion signal in this turn is ignored; the model
                // sees the results and has to confirm on a later turn.
                state.pending_calls.extend(parsed.calls);
                self.execute_pending(conversation, scheduler, state).await;
            } else if parsed.errors.is_empty() {
                if self.detector.looks_hallucinated(&text) {
                    self.warn(state, "Response contains a fabricated tool result".to_string());
                    return Termination::Failed(AgentError::HallucinatedToolResult);
                }
                if let Some(signal) = self.detector.evaluate(&text) {
                    return Termination::Completed {
                        signal,
                        answer: parsed.prose,
                    };
                }
                let nudge = match plan.mode {
                    ExecutionMode::Planning => PLANNING_NUDGE,
                    _ => NUDGE,
                };
                conversation.push(Message::user(nudge));
            }

            if progressed {
                state.consecutive_stuck_count = 0;
            } else {
                state.consecutive_stuck_count += 1;
                warn!(count = state.consecutive_stuck_count, "No progress this iteration");
                if state.consecutive_stuck_count >= self.config.stuck_threshold {
                    return Termination::Failed(AgentError::StuckLoop {
                        iterations: state.consecutive_stuck_count,
                    });
                }
            }
        }
    }

    /// Stream one response, forwarding deltas as events.
    async fn stream_response(&self, request: ProviderRequest) -> Result<String, ProviderError> {
        let mut rx = self.provider.stream(request).await?;
        let mut text = String::new();
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk?;
            if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
                self.events.publish(AgentEvent::AssistantDelta {
                    content: content.clone(),
                });
                text.push_str(&content);
            }
            if chunk.done {
                break;
            }
        }
        Ok(text)
    }

    /// Execute the next batch of pending calls and append their results.
    async fn execute_pending(&self, conversation: &mut Conversation, scheduler: &ToolScheduler, state: &mut LoopState) {
        let take = self.config.max_tools_per_turn.max(1).min(state.pending_calls.len());
        let batch: Vec<ToolCall> = state.pending_calls.drain(..take).collect();
        if !state.pending_calls.is_empty() {
            debug!(deferred = state.pending_calls.len(), "Deferring tool calls to the next iteration");
        }

        let results = scheduler.execute(&batch).await;
        for result in &results {
            let content = truncate_tool_output(
                &result.to_message_content(),
                &result.tool_name,
                self.max_tool_result_chars,
            );
            conversation.push(Message::tool_result(result.tool_name.clone(), content));
        }

        state.tool_calls_this_turn = batch.len();
        state.tool_calls_executed += batch.len();
        state.produced_output = true;
    }

    fn warn(&self, state: &mut LoopState, message: String) {
        warn!(%message, "Agent warning");
        self.events.publish(AgentEvent::Warning {
            message: message.clone(),
        });
        state.warnings.push(message);
    }
}
