//! Persisted permission decisions.
//!
//! Directory-scoped answers to the safety prompt ("always allow edits in this
//! project", "never run commands here") outlive the process. They are kept in
//! `~/.kubrick/permissions.toml` as a flat list of rules. A rule without a
//! directory applies everywhere; such global rules are only ever written by
//! hand.

use kubrick_core::tool::ActionKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleVerdict {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Absolute directory the rule is bound to; `None` means every directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,

    pub action: ActionKind,

    pub verdict: RuleVerdict,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionFile {
    #[serde(default)]
    pub rules: Vec<PermissionRule>,
}

impl PermissionFile {
    /// Load rules; a missing file is an empty rule set.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |reason: String| ConfigError::WriteError {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| write_err(e.to_string()))
    }

    /// Insert a rule, replacing any earlier verdict for the same directory and action.
    pub fn upsert(&mut self, rule: PermissionRule) {
        self.rules
            .retain(|r| !(r.directory == rule.directory && r.action == rule.action));
        self.rules.push(rule);
    }
}
