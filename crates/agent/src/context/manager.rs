//! Token-budget enforcement over the message history.

use kubrick_config::ContextConfig;
use kubrick_core::error::AgentError;
use kubrick_core::event::ContextAction;
use kubrick_core::message::{Message, Role};
use kubrick_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::token::{estimate_message_tokens, estimate_messages_tokens};

const SUMMARIZER_PROMPT: &str = "You are a conversation summarizer. Create concise summaries.";

/// Characters a middle-out truncation always leaves in place.
const MIN_KEEP_CHARS: usize = 32;
/// Room left for the truncation marker when sizing a cut.
const MARKER_ALLOWANCE: usize = 80;

/// How full the context is, derived fresh on every call to
/// [`ContextManager::fit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextBudget {
    pub window_tokens: usize,
    pub reserved_output_tokens: usize,
    pub used_tokens: usize,
    pub usage_ratio: f64,
}

impl ContextBudget {
    pub fn measure(messages: &[Message], window_tokens: usize, reserved_output_tokens: usize) -> Self {
        let used_tokens = estimate_messages_tokens(messages);
        let available = available_tokens(window_tokens, reserved_output_tokens);
        Self {
            window_tokens,
            reserved_output_tokens,
            used_tokens,
            usage_ratio: used_tokens as f64 / available as f64,
        }
    }

    /// Tokens the history may use once the reply is reserved.
    pub fn available_tokens(&self) -> usize {
        available_tokens(self.window_tokens, self.reserved_output_tokens)
    }
}

fn available_tokens(window: usize, reserved: usize) -> usize {
    window.saturating_sub(reserved).max(1)
}

/// What [`ContextManager::fit`] did.
#[derive(Debug, Clone)]
pub struct ContextReport {
    /// `None` when the history was left untouched
    pub action: Option<ContextAction>,
    pub tokens_before: usize,
    pub tokens_after: usize,
    /// Measured after the rewrite
    pub budget: ContextBudget,
}

/// Keeps a conversation inside the model's context window.
///
/// The first message is treated as the system prompt when it has the system
/// role; it is never dropped or summarized.
pub struct ContextManager {
    config: ContextConfig,
    summarizer: Option<Arc<dyn Provider>>,
}

impl ContextManager {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            summarizer: None,
        }
    }

    /// Provider asked out-of-band to summarize old turns.
    pub fn with_summarizer(mut self, provider: Arc<dyn Provider>) -> Self {
        self.summarizer = Some(provider);
        self
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Rewrite `messages` in place so they fit the budget.
    ///
    /// Fails with [`AgentError::ContextOverflow`] only when the system prompt
    /// alone does not fit.
    pub async fn fit(
        &self,
        messages: &mut Vec<Message>,
        window_tokens: usize,
        reserved_output_tokens: usize,
    ) -> Result<ContextReport, AgentError> {
        let before = ContextBudget::measure(messages, window_tokens, reserved_output_tokens);
        let available = before.available_tokens();
        debug!(
            tokens = before.used_tokens,
            available,
            usage_ratio = before.usage_ratio,
            "Context usage"
        );

        let mut action = None;
        if self.config.enabled && before.usage_ratio >= self.config.trim_threshold {
            let target = (available as f64 * self.config.trim_target) as usize;

            if before.usage_ratio < self.config.summarize_threshold {
                if self.trim(messages, target) {
                    action = Some(ContextAction::Trimmed);
                }
            } else if self.summarize(messages).await {
                action = Some(ContextAction::Summarized);
            }

            if estimate_messages_tokens(messages) >= available {
                self.reset(messages, available)?;
                action = Some(ContextAction::Reset);
            }

            // Too few messages to drop: cut the largest one instead
            let current = estimate_messages_tokens(messages);
            if current >= before.used_tokens && shrink_largest(messages, current.saturating_sub(target).max(1)) {
                action = Some(match action {
                    Some(ContextAction::Reset) => ContextAction::Reset,
                    _ => ContextAction::Truncated,
                });
            }
        }

        let budget = ContextBudget::measure(messages, window_tokens, reserved_output_tokens);
        if let Some(action) = action {
            info!(
                action = action.as_str(),
                tokens_before = before.used_tokens,
                tokens_after = budget.used_tokens,
                "Context rewritten"
            );
        }
        Ok(ContextReport {
            action,
            tokens_before: before.used_tokens,
            tokens_after: budget.used_tokens,
            budget,
        })
    }

    /// Drop the oldest middle messages until the projected usage reaches
    /// `target_tokens`, keeping the last `min_messages_to_keep`.
    fn trim(&self, messages: &mut Vec<Message>, target_tokens: usize) -> bool {
        let pinned = pinned_len(messages);
        let keep = self.config.min_messages_to_keep;
        if messages.len() <= pinned + keep {
            return false;
        }

        let recent_start = messages.len() - keep;
        let mut used: usize = messages[..pinned]
            .iter()
            .chain(&messages[recent_start..])
            .map(estimate_message_tokens)
            .sum();

        let middle = &messages[pinned..recent_start];
        let mut keep_from = middle.len();
        for (i, msg) in middle.iter().enumerate().rev() {
            let tokens = estimate_message_tokens(msg);
            if used + tokens > target_tokens {
                break;
            }
            used += tokens;
            keep_from = i;
        }

        let dropped = keep_from;
        if dropped == 0 {
            return false;
        }
        messages.drain(pinned..pinned + dropped);
        messages.insert(
            pinned,
            Message::system(format!(
                "[Context Note] {dropped} older messages trimmed to manage context."
            )),
        );
        info!(dropped, "Trimmed older messages");
        true
    }

    /// Replace the middle of the history with a single summary message.
    async fn summarize(&self, messages: &mut Vec<Message>) -> bool {
        let pinned = pinned_len(messages);
        let keep = self.config.min_messages_to_keep;
        if messages.len() <= pinned + keep {
            return false;
        }

        let recent_start = messages.len() - keep;
        let summary = self.summary_for(&messages[pinned..recent_start]).await;
        messages.splice(pinned..recent_start, [Message::system(summary)]);
        true
    }

    async fn summary_for(&self, middle: &[Message]) -> String {
        let fallback = format!(
            "[Context Summary] {} messages were compressed to manage context window limits.",
            middle.len()
        );
        let Some(provider) = &self.summarizer else {
            return fallback;
        };

        let transcript = middle
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content_for_chat()))
            .collect::<Vec<_>>()
            .join("\n\n");
        let request = ProviderRequest::new(
            provider.model(),
            vec![
                Message::system(SUMMARIZER_PROMPT),
                Message::user(format!(
                    "Summarize this conversation segment in under {} tokens, focusing on key decisions, code changes, and important context:\n\n{transcript}",
                    self.config.max_summary_tokens
                )),
            ],
        )
        .with_temperature(0.3)
        .with_max_tokens(self.config.max_summary_tokens);

        match provider.complete(request).await {
            Ok(summary) if !summary.trim().is_empty() => {
                info!(summarized = middle.len(), "Summarized conversation history");
                format!("[Context Summary]\n{}", summary.trim())
            }
            Ok(_) => {
                warn!("Summarizer returned nothing; using a static note");
                fallback
            }
            Err(e) => {
                warn!(error = %e, "Summarization failed; using a static note");
                fallback
            }
        }
    }

    /// Keep only the system prompt and the most recent user request.
    fn reset(&self, messages: &mut Vec<Message>, available: usize) -> Result<(), AgentError> {
        let pinned = pinned_len(messages);
        let system_tokens = estimate_messages_tokens(&messages[..pinned]);
        if system_tokens > available {
            return Err(AgentError::ContextOverflow {
                tokens: system_tokens,
                budget: available,
            });
        }

        let last_user = messages[pinned..]
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_else(|| "...".into());

        warn!(dropped = messages.len() - pinned, "Context critically full; emergency reset");
        messages.truncate(pinned);
        messages.push(Message::user(format!(
            "[CONTEXT_RESET] Previous conversation exceeded context limits. Starting fresh. Last message: {last_user}"
        )));

        // A reset history must leave the window strictly below full
        let total = estimate_messages_tokens(messages);
        if total >= available {
            shrink_largest(messages, total - available + 1);
        }
        let total = estimate_messages_tokens(messages);
        if total > available {
            return Err(AgentError::ContextOverflow {
                tokens: total,
                budget: available,
            });
        }
        Ok(())
    }
}

fn pinned_len(messages: &[Message]) -> usize {
    usize::from(messages.first().is_some_and(|m| m.role == Role::System))
}

/// Truncate the largest unpinned message middle-out, freeing roughly
/// `tokens_to_free`. Returns false when nothing could be shortened enough
/// to lower the estimate.
fn shrink_largest(messages: &mut [Message], tokens_to_free: usize) -> bool {
    let pinned = pinned_len(messages);
    let Some(index) = (pinned..messages.len()).max_by_key(|&i| messages[i].content.len()) else {
        return false;
    };

    let content = &messages[index].content;
    let total_chars = content.chars().count();
    if total_chars <= MIN_KEEP_CHARS {
        return false;
    }
    let keep = total_chars
        .saturating_sub(tokens_to_free * 4 + MARKER_ALLOWANCE)
        .max(MIN_KEEP_CHARS);
    let shortened = truncate_middle(content, keep, "to fit the context window");

    // At least one whole token must go
    if shortened.len() + 4 > content.len() {
        return false;
    }
    messages[index].content = shortened;
    true
}

/// Keep `keep_chars` characters, 70 % from the start and 30 % from the end.
fn truncate_middle(text: &str, keep_chars: usize, reason: &str) -> String {
    let total = text.chars().count();
    if total <= keep_chars {
        return text.to_string();
    }
    let head_chars = keep_chars * 7 / 10;
    let tail_chars = keep_chars - head_chars;
    splice_marker(
        text,
        head_chars,
        tail_chars,
        &format!("\n\n... [truncated {} characters {reason}] ...\n\n", total - keep_chars),
    )
}

fn splice_marker(text: &str, head_chars: usize, tail_chars: usize, marker: &str) -> String {
    let total = text.chars().count();
    let head_end = text.char_indices().nth(head_chars).map_or(text.len(), |(i, _)| i);
    let tail_start = text
        .char_indices()
        .nth(total - tail_chars)
        .map_or(text.len(), |(i, _)| i);
    format!("{}{marker}{}", &text[..head_end], &text[tail_start..])
}

/// Cap a tool's output before it enters the history, keeping the first 70 %
/// and the last 30 % of `max_chars`.
pub fn truncate_tool_output(output: &str, tool_name: &str, max_chars: usize) -> String {
    let total = output.chars().count();
    if total <= max_chars {
        return output.to_string();
    }
    let head_chars = max_chars * 7 / 10;
    let tail_chars = max_chars * 3 / 10;
    splice_marker(
        output,
        head_chars,
        tail_chars,
        &format!(
            "\n\n... [truncated {} characters from {tool_name} output] ...\n\n",
            total - max_chars
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use kubrick_core::error::ProviderError;

    const WINDOW: usize = 1000;
    const RESERVED: usize = 200; // 800 tokens available

    fn history(turns: usize) -> Vec<Message> {
        let mut messages = vec![Message::system("You are Kubrick.")];
        for i in 0..turns {
            let body = format!("{i:03}{}", "x".repeat(97)); // 100 bytes, 29 tokens each
            messages.push(if i % 2 == 0 {
                Message::user(body)
            } else {
                Message::assistant(body)
            });
        }
        messages
    }

    fn manager() -> ContextManager {
        ContextManager::new(ContextConfig::default())
    }

    #[tokio::test]
    async fn under_threshold_is_untouched() {
        let mut messages = history(10);
        let snapshot: Vec<String> = messages.iter().map(|m| m.id.clone()).collect();

        let report = manager().fit(&mut messages, WINDOW, RESERVED).await.unwrap();
        assert!(report.action.is_none());
        assert_eq!(report.tokens_before, report.tokens_after);
        assert_eq!(messages.iter().map(|m| m.id.clone()).collect::<Vec<_>>(), snapshot);
    }

    #[tokio::test]
    async fn trim_drops_oldest_and_leaves_note() {
        let mut messages = history(22); // 646 tokens, ratio ~0.81
        let system_id = messages[0].id.clone();
        let last_id = messages.last().unwrap().id.clone();

        let report = manager().fit(&mut messages, WINDOW, RESERVED).await.unwrap();
        assert_eq!(report.action, Some(ContextAction::Trimmed));
        assert!(report.tokens_after < report.tokens_before);
        assert!(report.budget.usage_ratio < 0.75);

        assert_eq!(messages[0].id, system_id);
        assert_eq!(messages[1].role, Role::System);
        assert_eq!(
            messages[1].content,
            "[Context Note] 6 older messages trimmed to manage context."
        );
        assert_eq!(messages.last().unwrap().id, last_id);
        assert_eq!(messages.len(), 1 + 1 + 12 + 4);
    }

    #[tokio::test]
    async fn summarize_uses_provider() {
        let provider = Arc::new(ScriptedProvider::new(["Created hello.py and ran it."]));
        let manager = manager().with_summarizer(provider.clone());
        let mut messages = history(25); // 733 tokens, ratio ~0.92

        let report = manager.fit(&mut messages, WINDOW, RESERVED).await.unwrap();
        assert_eq!(report.action, Some(ContextAction::Summarized));
        assert_eq!(messages.len(), 1 + 1 + 4);
        assert_eq!(messages[1].content, "[Context Summary]\nCreated hello.py and ran it.");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].messages[0].content.contains("conversation summarizer"));
        assert!(requests[0].messages[1].content.contains("under 500 tokens"));
        assert_eq!(requests[0].max_tokens, Some(500));
    }

    #[tokio::test]
    async fn summarize_falls_back_to_static_note() {
        let provider = Arc::new(ScriptedProvider::from_results(vec![Err(ProviderError::Network(
            "connection refused".into(),
        ))]));
        let manager = manager().with_summarizer(provider);
        let mut messages = history(25);

        let report = manager.fit(&mut messages, WINDOW, RESERVED).await.unwrap();
        assert_eq!(report.action, Some(ContextAction::Summarized));
        assert_eq!(
            messages[1].content,
            "[Context Summary] 21 messages were compressed to manage context window limits."
        );
    }

    #[tokio::test]
    async fn emergency_reset_keeps_system_and_last_user_message() {
        let mut messages = vec![
            Message::system("You are Kubrick."),
            Message::user("Refactor the parser"),
            Message::assistant("a".repeat(4000)),
        ];
        let report = manager().fit(&mut messages, WINDOW, RESERVED).await.unwrap();

        assert_eq!(report.action, Some(ContextAction::Reset));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "You are Kubrick.");
        assert_eq!(
            messages[1].content,
            "[CONTEXT_RESET] Previous conversation exceeded context limits. Starting fresh. Last message: Refactor the parser"
        );
        assert!(report.tokens_after <= 800);
    }

    #[tokio::test]
    async fn reset_shrinks_an_oversized_last_message() {
        let mut messages = vec![Message::system("You are Kubrick."), Message::user("b".repeat(6000))];
        let report = manager().fit(&mut messages, WINDOW, RESERVED).await.unwrap();

        assert_eq!(report.action, Some(ContextAction::Reset));
        assert!(messages[1].content.starts_with("[CONTEXT_RESET]"));
        assert!(messages[1].content.contains("[truncated"));
        assert!(report.tokens_after <= 800);
    }

    #[tokio::test]
    async fn exactly_full_context_is_reset() {
        // 8 tokens of system prompt plus 792 of user message fill all 800
        let mut messages = vec![Message::system("You are Kubrick."), Message::user("c".repeat(3152))];
        assert_eq!(ContextBudget::measure(&messages, WINDOW, RESERVED).usage_ratio, 1.0);

        let report = manager().fit(&mut messages, WINDOW, RESERVED).await.unwrap();

        assert_eq!(report.action, Some(ContextAction::Reset));
        assert!(messages[1].content.starts_with("[CONTEXT_RESET]"));
        assert!(report.tokens_after < 800);
        assert!(report.budget.usage_ratio < 1.0);
    }

    #[tokio::test]
    async fn oversized_system_prompt_is_an_overflow() {
        let mut messages = vec![Message::system("s".repeat(4000)), Message::user("hi")];
        let err = manager().fit(&mut messages, WINDOW, RESERVED).await.unwrap_err();
        assert!(matches!(err, AgentError::ContextOverflow { budget: 800, .. }));
    }

    #[tokio::test]
    async fn few_messages_fall_back_to_truncation() {
        let mut messages = vec![
            Message::system("You are Kubrick."),
            Message::user("Read the log"),
            Message::tool_result("read_file", "l".repeat(2400)),
            Message::assistant("It is long."),
        ];
        let report = manager().fit(&mut messages, WINDOW, RESERVED).await.unwrap();

        assert_eq!(report.action, Some(ContextAction::Truncated));
        assert!(report.tokens_after < report.tokens_before);
        assert_eq!(messages.len(), 4);
        assert!(messages[2].content.contains("to fit the context window"));
        assert_eq!(messages[0].content, "You are Kubrick.");
    }

    #[tokio::test]
    async fn usage_always_decreases_above_threshold() {
        for turns in 20..40 {
            let mut messages = history(turns);
            let system_id = messages[0].id.clone();
            let before = ContextBudget::measure(&messages, WINDOW, RESERVED);

            let report = manager().fit(&mut messages, WINDOW, RESERVED).await.unwrap();
            if before.usage_ratio >= 0.75 {
                assert!(
                    report.budget.usage_ratio < before.usage_ratio,
                    "turns={turns}: {} -> {}",
                    before.usage_ratio,
                    report.budget.usage_ratio
                );
            } else {
                assert!(report.action.is_none());
            }
            assert_eq!(messages[0].id, system_id);
        }
    }

    #[tokio::test]
    async fn disabled_manager_leaves_history_alone() {
        let config = ContextConfig {
            enabled: false,
            ..ContextConfig::default()
        };
        let mut messages = history(40);
        let report = ContextManager::new(config).fit(&mut messages, WINDOW, RESERVED).await.unwrap();
        assert!(report.action.is_none());
        assert_eq!(messages.len(), 41);
    }

    #[test]
    fn tool_output_truncation_keeps_head_and_tail() {
        assert_eq!(truncate_tool_output("short", "read_file", 10_000), "short");

        let output = format!("{}{}", "h".repeat(15_000), "t".repeat(5_000));
        let truncated = truncate_tool_output(&output, "read_file", 10_000);
        assert!(truncated.starts_with(&"h".repeat(7_000)));
        assert!(truncated.ends_with(&"t".repeat(3_000)));
        assert!(truncated.contains("... [truncated 10000 characters from read_file output] ..."));
    }

    #[test]
    fn tool_output_truncation_is_char_safe() {
        let output = "é".repeat(50);
        let truncated = truncate_tool_output(&output, "run_command", 10);
        assert!(truncated.starts_with("ééééééé\n"));
        assert!(truncated.ends_with("\nééé"));
        assert!(truncated.contains("[truncated 40 characters from run_command output]"));
    }
}
