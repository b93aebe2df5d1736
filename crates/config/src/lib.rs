//! Configuration loading, validation, and management for Kubrick.
//!
//! Loads configuration from `~/.kubrick/config.toml` with environment
//! variable overrides. Every policy threshold the orchestration core uses
//! (iteration caps, timeouts, token thresholds, pattern tables) lives here and
//! is handed to each component at construction.

pub mod permissions;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use permissions::{PermissionFile, PermissionRule, RuleVerdict};

/// The root configuration structure.
///
/// Maps directly to `~/.kubrick/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default text-generation backend
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Directory tools operate in when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_working_dir: Option<String>,

    /// Agent loop budgets
    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool scheduling
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Context window management
    #[serde(default)]
    pub context: ContextConfig,

    /// Safety gate policy
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Heuristic pattern tables for completion and hallucination detection
    #[serde(default)]
    pub patterns: PatternConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "triton".into()
}
fn default_model() -> String {
    "llm_decoupled".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_working_dir", &self.default_working_dir)
            .field("agent", &self.agent)
            .field("scheduler", &self.scheduler)
            .field("context", &self.context)
            .field("safety", &self.safety)
            .field("patterns", &self.patterns)
            .field("providers", &self.providers)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Budgets for one task run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Tool calls executed per iteration; the rest wait for the next one
    #[serde(default = "default_max_tools_per_turn")]
    pub max_tools_per_turn: usize,

    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,

    /// Iterations without progress before the loop gives up
    #[serde(default = "default_stuck_threshold")]
    pub stuck_threshold: u32,

    #[serde(default = "default_empty_limit")]
    pub max_consecutive_empty_responses: u32,

    /// Tokens reserved for the model's reply
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Classify each task before running it and size the budgets to match
    #[serde(default = "default_true")]
    pub classify_tasks: bool,

    /// Explore read-only and have the plan reviewed before complex tasks
    #[serde(default = "default_true")]
    pub enable_planning: bool,

    #[serde(default = "default_planning_max_iterations")]
    pub planning_max_iterations: u32,

    /// Models per task tier, keyed by provider name. A missing entry or tier
    /// means the provider's configured model.
    #[serde(default = "default_model_tiers")]
    pub model_tiers: HashMap<String, ModelTiers>,
}

/// Model size picked for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    Balanced,
    Best,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelTiers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fast: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balanced: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best: Option<String>,
}

impl ModelTiers {
    pub fn model_for(&self, tier: ModelTier) -> Option<&str> {
        match tier {
            ModelTier::Fast => self.fast.as_deref(),
            ModelTier::Balanced => self.balanced.as_deref(),
            ModelTier::Best => self.best.as_deref(),
        }
    }
}

impl AgentConfig {
    /// Model `provider` should use for `tier`, if one is configured.
    pub fn tier_model(&self, provider: &str, tier: ModelTier) -> Option<&str> {
        self.model_tiers.get(provider)?.model_for(tier)
    }
}

fn default_max_iterations() -> u32 {
    15
}
fn default_max_tools_per_turn() -> usize {
    2
}
fn default_total_timeout() -> u64 {
    600
}
fn default_stuck_threshold() -> u32 {
    8
}
fn default_empty_limit() -> u32 {
    3
}
fn default_max_output_tokens() -> u32 {
    2048
}
fn default_planning_max_iterations() -> u32 {
    10
}
fn default_model_tiers() -> HashMap<String, ModelTiers> {
    let tiers = |fast: &str, balanced: &str, best: &str| ModelTiers {
        fast: Some(fast.into()),
        balanced: Some(balanced.into()),
        best: Some(best.into()),
    };
    HashMap::from([
        ("openai".to_string(), tiers("gpt-3.5-turbo", "gpt-4o", "gpt-4o")),
        (
            "anthropic".to_string(),
            tiers(
                "claude-haiku-4-5-20251001",
                "claude-sonnet-4-5-20250929",
                "claude-opus-4-1-20250805",
            ),
        ),
    ])
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_tools_per_turn: default_max_tools_per_turn(),
            total_timeout_secs: default_total_timeout(),
            stuck_threshold: default_stuck_threshold(),
            max_consecutive_empty_responses: default_empty_limit(),
            max_output_tokens: default_max_output_tokens(),
            classify_tasks: true,
            enable_planning: true,
            planning_max_iterations: default_planning_max_iterations(),
            model_tiers: default_model_tiers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run read-only calls of one turn concurrently
    #[serde(default = "default_true")]
    pub enable_parallel: bool,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_max_workers() -> usize {
    3
}
fn default_tool_timeout() -> u64 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enable_parallel: true,
            max_workers: default_max_workers(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_trim_threshold")]
    pub trim_threshold: f64,

    #[serde(default = "default_summarize_threshold")]
    pub summarize_threshold: f64,

    /// Usage ratio trimming aims for
    #[serde(default = "default_trim_target")]
    pub trim_target: f64,

    #[serde(default = "default_min_messages")]
    pub min_messages_to_keep: usize,

    #[serde(default = "default_max_tool_result_chars")]
    pub max_tool_result_chars: usize,

    #[serde(default = "default_max_summary_tokens")]
    pub max_summary_tokens: u32,

    #[serde(default = "default_context_window")]
    pub default_context_window: usize,

    /// Force a window size regardless of model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window_override: Option<usize>,

    /// Known context window sizes, keyed by model name
    #[serde(default = "default_context_windows")]
    pub context_windows: HashMap<String, usize>,
}

fn default_trim_threshold() -> f64 {
    0.75
}
fn default_summarize_threshold() -> f64 {
    0.85
}
fn default_trim_target() -> f64 {
    0.60
}
fn default_min_messages() -> usize {
    4
}
fn default_max_tool_result_chars() -> usize {
    10_000
}
fn default_max_summary_tokens() -> u32 {
    500
}
fn default_context_window() -> usize {
    8192
}
fn default_context_windows() -> HashMap<String, usize> {
    [
        ("gpt-4", 8192),
        ("gpt-4-32k", 32_768),
        ("gpt-4-turbo", 128_000),
        ("gpt-4o", 128_000),
        ("gpt-3.5-turbo", 16_385),
        ("claude-sonnet-4-5-20250929", 200_000),
        ("claude-opus-4-1-20250805", 200_000),
        ("claude-haiku-4-5-20251001", 200_000),
        ("llm_decoupled", 8192),
    ]
    .into_iter()
    .map(|(model, window)| (model.to_string(), window))
    .collect()
}

impl ContextConfig {
    /// Context window for a model, honouring the override.
    pub fn window_for(&self, model: &str) -> usize {
        self.context_window_override.unwrap_or_else(|| {
            self.context_windows
                .get(model)
                .copied()
                .unwrap_or(self.default_context_window)
        })
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trim_threshold: default_trim_threshold(),
            summarize_threshold: default_summarize_threshold(),
            trim_target: default_trim_target(),
            min_messages_to_keep: default_min_messages(),
            max_tool_result_chars: default_max_tool_result_chars(),
            max_summary_tokens: default_max_summary_tokens(),
            default_context_window: default_context_window(),
            context_window_override: None,
            context_windows: default_context_windows(),
        }
    }
}

/// A destructive-command pattern and the reason shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DangerRule {
    pub pattern: String,
    pub description: String,
}

impl DangerRule {
    fn new(pattern: &str, description: &str) -> Self {
        Self {
            pattern: pattern.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Ask before dangerous commands and file mutations
    #[serde(default = "default_true")]
    pub require_confirmation: bool,

    /// Ask before every shell command, not only dangerous ones
    #[serde(default)]
    pub confirm_all_commands: bool,

    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Commands that only observe the workspace and may run in parallel
    #[serde(default = "default_read_only_commands")]
    pub read_only_commands: Vec<String>,

    /// Checked in order; the first match names the danger
    #[serde(default = "default_danger_rules")]
    pub dangerous_patterns: Vec<DangerRule>,
}

fn default_max_file_size_mb() -> u64 {
    10
}

fn default_danger_rules() -> Vec<DangerRule> {
    vec![
        DangerRule::new(r"\brm\s+-[a-zA-Z]*[rR][a-zA-Z]*\s+/(?:\*|\s|$)", "Recursive delete of the filesystem root"),
        DangerRule::new(r"\brm\s+-[a-zA-Z]*[rR][a-zA-Z]*\s+~", "Recursive delete of the home directory"),
        DangerRule::new(r"\brm\s+-[a-zA-Z]*[rR][a-zA-Z]*\s+\*", "Recursive delete of everything in the directory"),
        DangerRule::new(r"\brm\s+(?:-[a-zA-Z]+\s+)*-[a-zA-Z]*[rR]", "Recursive delete"),
        DangerRule::new(r"\brm\s+.*--recursive", "Recursive delete"),
        DangerRule::new(r"\bsudo\b", "Privilege escalation"),
        DangerRule::new(r"\bdoas\b", "Privilege escalation"),
        DangerRule::new(r"(?:^|[;&|]\s*)su(?:\s|$)", "Switching user"),
        DangerRule::new(r"\bchmod\s+(?:-[a-zA-Z]+\s+)*0?777\b", "World-writable permissions"),
        DangerRule::new(r"\bchown\s+(?:-[a-zA-Z]+\s+)*-[a-zA-Z]*R", "Recursive ownership change"),
        DangerRule::new(r">\s*/dev/(?:sd|hd|nvme|xvd|vd|mmcblk|disk)", "Writing to a raw device"),
        DangerRule::new(r"\bgit\s+push\b.*\s(?:--force|-f)\b", "Force push"),
        DangerRule::new(r"\bgit\s+reset\s+--hard\b", "Discarding uncommitted changes"),
        DangerRule::new(r"\bgit\s+clean\s+-[a-zA-Z]*f", "Deleting untracked files"),
        DangerRule::new(r"\bmkfs(?:\.[a-z0-9]+)?\b", "Formatting a filesystem"),
        DangerRule::new(r"\b(?:fdisk|parted|wipefs)\b", "Disk partitioning"),
        DangerRule::new(r"\bdd\b.*\bof=/dev/", "Raw disk write"),
        DangerRule::new(r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:", "Fork bomb"),
        DangerRule::new(r"\b(?:curl|wget)\b.*\|\s*(?:sudo\s+)?(?:ba|z|k|da)?sh\b", "Piping a download into a shell"),
        DangerRule::new(r"\beval\b.*\$\(", "Evaluating command substitution"),
        DangerRule::new(r"\b(?:shutdown|reboot|halt|poweroff)\b", "Stopping the machine"),
    ]
}

fn default_read_only_commands() -> Vec<String> {
    [
        "ls", "cat", "head", "tail", "pwd", "wc", "grep", "rg", "find", "tree", "which",
        "file", "stat", "du", "df", "whoami", "date", "echo", "diff",
        "git status", "git log", "git diff", "git show", "git branch",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            require_confirmation: true,
            confirm_all_commands: false,
            max_file_size_mb: default_max_file_size_mb(),
            read_only_commands: default_read_only_commands(),
            dangerous_patterns: default_danger_rules(),
        }
    }
}

/// Which signals a continuation phrase overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuationPrecedence {
    /// Continuation beats explicit markers and conclusive phrasing
    All,
    /// Continuation beats conclusive phrasing only; markers still end the task
    Heuristics,
}

/// Heuristic tables. Regexes use the `regex-lite` syntax; continuation and
/// conclusive patterns match case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Literal sentinels that end the task
    #[serde(default = "default_completion_markers")]
    pub completion_markers: Vec<String>,

    #[serde(default = "default_continuation_patterns")]
    pub continuation: Vec<String>,

    #[serde(default = "default_conclusive_patterns")]
    pub conclusive: Vec<String>,

    /// Text that looks like a tool result the model wrote itself
    #[serde(default = "default_hallucination_patterns")]
    pub hallucination: Vec<String>,

    #[serde(default = "default_precedence")]
    pub continuation_precedence: ContinuationPrecedence,
}

fn default_completion_markers() -> Vec<String> {
    ["TASK_COMPLETE", "PLAN_COMPLETE", "[COMPLETE]", "[DONE]"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_continuation_patterns() -> Vec<String> {
    [
        r"\bnow,? let(?:['’]s| me| us)\b",
        r"\bnext,? (?:i['’]ll|i will|let['’]s|let me|we['’]ll|we will|i need to)\b",
        r"\bneeds? to (?:verify|check|test|run|fix|update|confirm|make sure)\b",
        r"\bi['’]ll (?:now|next|then|also|continue)\b",
        r"\blet me (?:check|verify|read|look|run|test|fix|update|create|see|examine|inspect|try)\b",
        r"\b(?:still|also) need to\b",
        r"\bbefore (?:i|we) (?:finish|wrap up|conclude)\b",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_conclusive_patterns() -> Vec<String> {
    [
        r"\bhere(?:['’]s| is| are) (?:the |a |an |your )?(?:final |complete |updated |finished |full )?(?:poem|story|summary|result|results|answer|implementation|code|script|essay|report|list|haiku|explanation|overview|solution|version)\b",
        r"\b(?:task|work|changes|implementation|refactor|fix)(?: is| are| has been| have been)? (?:now )?(?:complete|completed|done|finished)\b",
        r"\bi(?:['’]ve| have) (?:successfully )?(?:completed|finished|implemented|created|written|updated|fixed)\b",
        r"\blet me know if you (?:need|have|want|would like)\b",
        r"\beverything(?:['’]s| is) (?:set|ready|done|in place)\b",
        r"\bthat should do it\b",
        r"\b(?:all set|good to go)\b",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_hallucination_patterns() -> Vec<String> {
    [
        r"(?m)^\s*Tool execution results:",
        r"(?m)^Tool: [a-z_]+\s*\n(?:Result|Error):",
        r#""success"\s*:\s*(?:true|false)\s*,\s*"(?:result|output|error)"\s*:"#,
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_precedence() -> ContinuationPrecedence {
    ContinuationPrecedence::All
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            completion_markers: default_completion_markers(),
            continuation: default_continuation_patterns(),
            conclusive: default_conclusive_patterns(),
            hallucination: default_hallucination_patterns(),
            continuation_precedence: default_precedence(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.kubrick/config.toml).
    ///
    /// Environment overrides, highest priority first:
    /// - `KUBRICK_API_KEY`, `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`
    /// - `KUBRICK_PROVIDER`, `KUBRICK_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("KUBRICK_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("KUBRICK_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("KUBRICK_MODEL") {
            config.default_model = model;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".kubrick")
    }

    /// Where directory-scoped permission decisions are stored.
    pub fn permissions_path() -> PathBuf {
        Self::config_dir().join("permissions.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let ctx = &self.context;
        if !(0.0 < ctx.trim_target
            && ctx.trim_target < ctx.trim_threshold
            && ctx.trim_threshold <= ctx.summarize_threshold
            && ctx.summarize_threshold <= 1.0)
        {
            return Err(ConfigError::ValidationError(
                "context thresholds must satisfy 0 < trim_target < trim_threshold <= summarize_threshold <= 1".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError("agent.max_iterations must be at least 1".into()));
        }

        if self.agent.max_tools_per_turn == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tools_per_turn must be at least 1".into(),
            ));
        }

        if self.scheduler.max_workers == 0 {
            return Err(ConfigError::ValidationError("scheduler.max_workers must be at least 1".into()));
        }

        if self.agent.planning_max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.planning_max_iterations must be at least 1".into(),
            ));
        }

        // Every window a model can end up with must leave room for the reply
        let reply = self.agent.max_output_tokens as usize;
        let windows = std::iter::once(("context.default_context_window".to_string(), ctx.default_context_window))
            .chain(
                ctx.context_window_override
                    .map(|w| ("context.context_window_override".to_string(), w)),
            )
            .chain(
                ctx.context_windows
                    .iter()
                    .map(|(model, w)| (format!("context.context_windows.\"{model}\""), *w)),
            );
        for (name, window) in windows {
            if reply >= window {
                return Err(ConfigError::ValidationError(format!(
                    "agent.max_output_tokens ({reply}) must be smaller than {name} ({window})"
                )));
            }
        }

        Ok(())
    }

    /// API key for a provider: its own entry first, then the global key.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some() || self.providers.values().any(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_working_dir: None,
            agent: AgentConfig::default(),
            scheduler: SchedulerConfig::default(),
            context: ContextConfig::default(),
            safety: SafetyConfig::default(),
            patterns: PatternConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to write config file at {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
