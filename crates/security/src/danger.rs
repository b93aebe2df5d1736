//! Shell command danger classification.
//!
//! An ordered table of regexes describes destructive operations. The first
//! rule that matches names the danger; commands matching no rule are safe.

use kubrick_config::DangerRule;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// A danger rule whose pattern failed to compile.
#[derive(Debug, thiserror::Error)]
#[error("Invalid danger pattern '{pattern}': {reason}")]
pub struct DangerPatternError {
    pub pattern: String,
    pub reason: String,
}

/// The verdict of [`DangerClassifier::classify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "lowercase")]
pub enum Danger {
    Safe,
    Dangerous { reason: String },
}

impl Danger {
    pub fn is_dangerous(&self) -> bool {
        matches!(self, Self::Dangerous { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Safe => None,
            Self::Dangerous { reason } => Some(reason),
        }
    }
}

/// Compiled danger table.
#[derive(Debug, Clone)]
pub struct DangerClassifier {
    rules: Vec<(Regex, String)>,
}

impl DangerClassifier {
    pub fn from_rules(rules: &[DangerRule]) -> Result<Self, DangerPatternError> {
        let rules = rules
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|re| (re, rule.description.clone()))
                    .map_err(|e| DangerPatternError {
                        pattern: rule.pattern.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn classify(&self, command: &str) -> Danger {
        let command = command.trim();
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(command))
            .map(|(_, description)| Danger::Dangerous {
                reason: description.clone(),
            })
            .unwrap_or(Danger::Safe)
    }
}
