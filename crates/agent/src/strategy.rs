//! Task classification and the execution plan derived from it.
//!
//! Before a task runs, one out-of-band request asks the model how involved
//! the task is. The answer sizes the loop: a greeting gets a single direct
//! reply, a one-file edit gets a short budget, a refactor gets the full one.

use kubrick_config::{AgentConfig, ModelTier};
use kubrick_core::message::Message;
use kubrick_core::provider::{Provider, ProviderRequest};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const CLASSIFIER_PROMPT: &str = r#"You are a task complexity classifier for a coding assistant.

Your job is to classify tasks into three tiers: CONVERSATIONAL, SIMPLE, or COMPLEX.

# Classification Criteria

**CONVERSATIONAL:**
- Greetings, questions, general chat
- Creative requests (poems, stories, jokes)
- Explanations or teaching
- No file operations or code changes needed
- No tools required
- Estimated 0 tool calls

**SIMPLE:**
- Single file operations (read, write, edit one file)
- Clear, specific scope with well-defined requirements
- Estimated 1-5 tool calls
- Examples: "Read config.py", "Create a hello world script", "List all Python files"

**COMPLEX:**
- Multi-file operations affecting multiple files
- Architectural changes or refactoring
- Uncertain scope requiring exploration
- Estimated >5 tool calls
- Examples: "Add logging to all Python files", "Refactor the authentication system", "Debug why the tests are failing"

# Response Format

Respond with ONLY a JSON object:
{
  "complexity": "SIMPLE",
  "reasoning": "Brief explanation why",
  "estimated_tool_calls": 2,
  "requires_tools": true
}

Respond with ONLY the JSON object, no other text."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskComplexity {
    Conversational,
    Simple,
    Complex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskClassification {
    pub complexity: TaskComplexity,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub estimated_tool_calls: u32,
    #[serde(default)]
    pub requires_tools: bool,
}

impl TaskClassification {
    /// Used whenever the classifier's answer can't be trusted.
    pub fn fallback(reasoning: impl Into<String>) -> Self {
        Self {
            complexity: TaskComplexity::Simple,
            reasoning: reasoning.into(),
            estimated_tool_calls: 3,
            requires_tools: true,
        }
    }
}

pub struct TaskClassifier;

impl TaskClassifier {
    /// Ask `provider` to classify `task`. Never fails: any provider error or
    /// unreadable reply yields [`TaskClassification::fallback`].
    pub async fn classify(provider: &dyn Provider, task: &str) -> TaskClassification {
        let request = ProviderRequest::new(
            provider.model(),
            vec![Message::system(CLASSIFIER_PROMPT), Message::user(task)],
        )
        .with_temperature(0.0)
        .with_max_tokens(200);

        let reply = match provider.complete(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Task classification failed, defaulting to SIMPLE");
                return TaskClassification::fallback(format!("Error: {e}"));
            }
        };

        match parse_classification(&reply) {
            Some(classification) => {
                info!(
                    complexity = ?classification.complexity,
                    reasoning = %classification.reasoning,
                    "Task classified"
                );
                classification
            }
            None => {
                warn!("Classification reply unreadable, defaulting to SIMPLE");
                TaskClassification::fallback("Parsing failed")
            }
        }
    }
}

/// Parse the span from the first `{` to the last `}` of a reply.
fn parse_classification(reply: &str) -> Option<TaskClassification> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end <= start {
        return None;
    }
    let mut value: serde_json::Value = serde_json::from_str(&reply[start..=end]).ok()?;
    // Models are loose about case.
    if let Some(complexity) = value.get_mut("complexity")
        && let Some(text) = complexity.as_str()
    {
        *complexity = serde_json::Value::String(text.to_uppercase());
    }
    serde_json::from_value(value).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Conversational,
    AgenticSimple,
    AgenticComplex,
    /// Read-only exploration that ends in a plan for review
    Planning,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversational => "conversational",
            Self::AgenticSimple => "agentic_simple",
            Self::AgenticComplex => "agentic_complex",
            Self::Planning => "planning",
        }
    }
}

/// Budgets and sampling settings for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    pub mode: ExecutionMode,
    pub max_iterations: u32,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// False means a single direct reply with no tool loop
    pub use_tools: bool,
    pub model_tier: ModelTier,
    /// Explore read-only and get the plan approved before executing
    pub use_planning: bool,
}

pub struct ExecutionStrategy;

impl ExecutionStrategy {
    pub fn for_classification(classification: &TaskClassification, config: &AgentConfig) -> ExecutionPlan {
        match classification.complexity {
            TaskComplexity::Conversational => ExecutionPlan {
                mode: ExecutionMode::Conversational,
                max_iterations: 1,
                temperature: 0.7,
                max_output_tokens: 1000,
                use_tools: false,
                model_tier: ModelTier::Fast,
                use_planning: false,
            },
            TaskComplexity::Simple => ExecutionPlan {
                mode: ExecutionMode::AgenticSimple,
                max_iterations: config.max_iterations.min(5),
                temperature: 0.4,
                max_output_tokens: 2000,
                use_tools: true,
                model_tier: ModelTier::Balanced,
                use_planning: false,
            },
            TaskComplexity::Complex => ExecutionPlan {
                mode: ExecutionMode::AgenticComplex,
                max_iterations: config.max_iterations,
                temperature: 0.3,
                max_output_tokens: 4000,
                use_tools: true,
                model_tier: ModelTier::Best,
                use_planning: config.enable_planning,
            },
        }
    }

    /// Plan used when classification is switched off: configured budgets,
    /// configured temperature.
    pub fn unclassified(config: &AgentConfig, temperature: f32) -> ExecutionPlan {
        ExecutionPlan {
            mode: ExecutionMode::AgenticComplex,
            max_iterations: config.max_iterations,
            temperature,
            max_output_tokens: config.max_output_tokens,
            use_tools: true,
            model_tier: ModelTier::Best,
            use_planning: false,
        }
    }

    /// Exploration phase run ahead of `execution`.
    pub fn planning(execution: &ExecutionPlan, config: &AgentConfig) -> ExecutionPlan {
        ExecutionPlan {
            mode: ExecutionMode::Planning,
            max_iterations: config.planning_max_iterations,
            use_planning: false,
            ..execution.clone()
        }
    }
}
