//! Deciding whether a response finishes the task.

use kubrick_config::{ContinuationPrecedence, PatternConfig};
use regex_lite::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the loop considered the task finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CompletionSignal {
    /// An explicit sentinel such as `TASK_COMPLETE`
    Marker(String),
    /// The text reads like a final answer
    Conclusive,
    /// The model stopped answering after doing useful work
    EmptyResponse,
    /// A conversational task answered in a single turn
    DirectAnswer,
}

impl fmt::Display for CompletionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Marker(marker) => write!(f, "explicit_marker:{marker}"),
            Self::Conclusive => f.write_str("conclusive_response"),
            Self::EmptyResponse => f.write_str("empty_response"),
            Self::DirectAnswer => f.write_str("direct_answer"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid pattern '{pattern}': {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}

/// Compiled completion, continuation and hallucination tables.
#[derive(Debug)]
pub struct CompletionDetector {
    markers: Vec<String>,
    continuation: Vec<Regex>,
    conclusive: Vec<Regex>,
    hallucination: Vec<Regex>,
    precedence: ContinuationPrecedence,
}

fn compile(patterns: &[String], case_insensitive: bool) -> Result<Vec<Regex>, PatternError> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|e| PatternError {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

impl CompletionDetector {
    pub fn from_config(config: &PatternConfig) -> Result<Self, PatternError> {
        Ok(Self {
            markers: config.completion_markers.clone(),
            continuation: compile(&config.continuation, true)?,
            conclusive: compile(&config.conclusive, true)?,
            hallucination: compile(&config.hallucination, false)?,
            precedence: config.continuation_precedence,
        })
    }

    /// Whether the model says it still has work to do.
    pub fn wants_to_continue(&self, text: &str) -> bool {
        self.continuation.iter().any(|re| re.is_match(text))
    }

    pub fn marker(&self, text: &str) -> Option<&str> {
        self.markers
            .iter()
            .find(|m| text.contains(m.as_str()))
            .map(String::as_str)
    }

    pub fn looks_conclusive(&self, text: &str) -> bool {
        self.conclusive.iter().any(|re| re.is_match(text))
    }

    /// Text that imitates tool output although no tool ran.
    pub fn looks_hallucinated(&self, text: &str) -> bool {
        self.hallucination.iter().any(|re| re.is_match(text))
    }

    /// Evaluate a non-empty response that carried no tool calls.
    ///
    /// Continuation phrasing beats conclusive phrasing; under
    /// [`ContinuationPrecedence::All`] it beats explicit markers too.
    pub fn evaluate(&self, text: &str) -> Option<CompletionSignal> {
        if text.trim().is_empty() {
            return None;
        }

        let continuing = self.wants_to_continue(text);
        if continuing && self.precedence == ContinuationPrecedence::All {
            return None;
        }
        if let Some(marker) = self.marker(text) {
            return Some(CompletionSignal::Marker(marker.to_string()));
        }
        if !continuing && self.looks_conclusive(text) {
            return Some(CompletionSignal::Conclusive);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> CompletionDetector {
        CompletionDetector::from_config(&PatternConfig::default()).unwrap()
    }

    #[test]
    fn explicit_markers_complete() {
        let d = detector();
        for text in [
            "All edits applied. TASK_COMPLETE",
            "PLAN_COMPLETE",
            "Finished [DONE]",
            "[COMPLETE] The function now validates its input.",
        ] {
            assert!(matches!(d.evaluate(text), Some(CompletionSignal::Marker(_))), "{text}");
        }
        assert_eq!(
            d.evaluate("TASK_COMPLETE: created hello.py"),
            Some(CompletionSignal::Marker("TASK_COMPLETE".into()))
        );
    }

    #[test]
    fn conclusive_phrasing_completes() {
        let d = detector();
        for text in [
            "Here's the poem you asked for:\n\nRoses are red...",
            "The refactor is complete. Let me know if you need anything else.",
            "I've successfully implemented the parser.",
            "Everything is in place.",
        ] {
            assert_eq!(d.evaluate(text), Some(CompletionSignal::Conclusive), "{text}");
        }
    }

    #[test]
    fn continuation_wins_over_conclusive() {
        let d = detector();
        assert_eq!(d.evaluate("I've created the file. Now let me verify it compiles."), None);
        assert_eq!(d.evaluate("The fix is done, but I still need to run the tests."), None);
        assert_eq!(d.evaluate("Next, I'll update the README."), None);
    }

    #[test]
    fn continuation_precedence_is_tunable() {
        let text = "TASK_COMPLETE for step one. Now let me check the second file.";
        assert_eq!(detector().evaluate(text), None);

        let config = PatternConfig {
            continuation_precedence: ContinuationPrecedence::Heuristics,
            ..PatternConfig::default()
        };
        let d = CompletionDetector::from_config(&config).unwrap();
        assert_eq!(d.evaluate(text), Some(CompletionSignal::Marker("TASK_COMPLETE".into())));
        assert_eq!(d.evaluate("I've fixed it. Now let me run the tests."), None);
    }

    #[test]
    fn ordinary_text_continues() {
        let d = detector();
        assert_eq!(d.evaluate("I looked at main.rs; it defines three functions."), None);
        assert_eq!(d.evaluate("   "), None);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(detector().evaluate("EVERYTHING IS READY."), Some(CompletionSignal::Conclusive));
    }

    #[test]
    fn detects_fabricated_tool_results() {
        let d = detector();
        assert!(d.looks_hallucinated("Tool execution results:\n\nTool: read_file\nResult: fn main() {}"));
        assert!(d.looks_hallucinated("Tool: run_command\nResult: ok"));
        assert!(d.looks_hallucinated(r#"{"success": true, "result": "file written"}"#));
        assert!(!d.looks_hallucinated("I will call the read_file tool next."));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let config = PatternConfig {
            conclusive: vec!["(unclosed".into()],
            ..PatternConfig::default()
        };
        let err = CompletionDetector::from_config(&config).unwrap_err();
        assert_eq!(err.pattern, "(unclosed");
    }

    #[test]
    fn signal_display() {
        assert_eq!(CompletionSignal::Marker("[DONE]".into()).to_string(), "explicit_marker:[DONE]");
        assert_eq!(CompletionSignal::EmptyResponse.to_string(), "empty_response");
    }
}
