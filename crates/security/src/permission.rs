//! Permission decisions and the in-process decision cache.

use kubrick_config::{PermissionRule, RuleVerdict};
use kubrick_core::tool::{Action, ActionKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How long a decision stays in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// This invocation only
    Once,
    /// Until the process exits
    Session,
    /// Persisted for the working directory
    Directory,
    /// Persisted for every directory; only loaded from storage
    Global,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Session => "session",
            Self::Directory => "directory",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

impl From<RuleVerdict> for Verdict {
    fn from(v: RuleVerdict) -> Self {
        match v {
            RuleVerdict::Allow => Self::Allow,
            RuleVerdict::Deny => Self::Deny,
        }
    }
}

impl From<Verdict> for RuleVerdict {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Allow => Self::Allow,
            Verdict::Deny => Self::Deny,
        }
    }
}

/// A verdict on a subject and how far it reaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub subject: Action,
    pub scope: Scope,
    pub verdict: Verdict,
}

impl PermissionDecision {
    pub fn new(subject: Action, scope: Scope, verdict: Verdict) -> Self {
        Self { subject, scope, verdict }
    }
}

/// Decisions the gate has already reached.
///
/// Session decisions are keyed by the exact action. Directory and global
/// rules are keyed by action kind and cover every subject of that kind.
#[derive(Debug, Default)]
pub struct PermissionCache {
    subjects: HashMap<Action, Verdict>,
    directory: HashMap<(String, ActionKind), Verdict>,
    global: HashMap<ActionKind, Verdict>,
}

impl PermissionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache from persisted rules.
    pub fn load_rules(&mut self, rules: &[PermissionRule]) {
        for rule in rules {
            let verdict = Verdict::from(rule.verdict);
            match &rule.directory {
                Some(dir) => {
                    self.directory.insert((dir.clone(), rule.action), verdict);
                }
                None => {
                    self.global.insert(rule.action, verdict);
                }
            }
        }
    }

    /// Record a decision. `Once` decisions are not cached.
    pub fn record(&mut self, decision: &PermissionDecision, directory: &str) {
        let kind = decision.subject.kind;
        match decision.scope {
            Scope::Once => {}
            Scope::Session => {
                self.subjects.insert(decision.subject.clone(), decision.verdict);
            }
            Scope::Directory => {
                self.directory.insert((directory.to_string(), kind), decision.verdict);
            }
            Scope::Global => {
                self.global.insert(kind, decision.verdict);
            }
        }
    }

    /// Look up a cached verdict.
    ///
    /// A deny at any scope wins. An exact-subject allow is honoured for every
    /// subject; kind-wide allows only cover subjects that are not dangerous.
    pub fn lookup(&self, action: &Action, directory: &str, dangerous: bool) -> Option<(Verdict, Scope)> {
        let exact = self.subjects.get(action).copied();
        let in_dir = self.directory.get(&(directory.to_string(), action.kind)).copied();
        let global = self.global.get(&action.kind).copied();

        let candidates = [
            (exact, Scope::Session),
            (in_dir, Scope::Directory),
            (global, Scope::Global),
        ];

        if let Some((_, scope)) = candidates.iter().find(|(v, _)| *v == Some(Verdict::Deny)) {
            return Some((Verdict::Deny, *scope));
        }

        if exact == Some(Verdict::Allow) {
            return Some((Verdict::Allow, Scope::Session));
        }

        if dangerous {
            return None;
        }

        candidates[1..]
            .iter()
            .find(|(v, _)| *v == Some(Verdict::Allow))
            .map(|(_, scope)| (Verdict::Allow, *scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(subject: &str) -> Action {
        Action::new(ActionKind::RunCommand, subject)
    }

    #[test]
    fn empty_cache_has_no_opinion() {
        let cache = PermissionCache::new();
        assert_eq!(cache.lookup(&cmd("ls"), "/w", false), None);
    }

    #[test]
    fn once_decisions_are_not_remembered() {
        let mut cache = PermissionCache::new();
        cache.record(&PermissionDecision::new(cmd("make"), Scope::Once, Verdict::Allow), "/w");
        assert_eq!(cache.lookup(&cmd("make"), "/w", false), None);
    }

    #[test]
    fn session_allow_is_exact_subject() {
        let mut cache = PermissionCache::new();
        cache.record(&PermissionDecision::new(cmd("rm -rf build"), Scope::Session, Verdict::Allow), "/w");
        assert_eq!(
            cache.lookup(&cmd("rm -rf build"), "/w", true),
            Some((Verdict::Allow, Scope::Session))
        );
        assert_eq!(cache.lookup(&cmd("rm -rf dist"), "/w", true), None);
    }

    #[test]
    fn directory_allow_covers_only_safe_subjects() {
        let mut cache = PermissionCache::new();
        cache.record(&PermissionDecision::new(cmd("make"), Scope::Directory, Verdict::Allow), "/w");

        assert_eq!(
            cache.lookup(&cmd("cargo build"), "/w", false),
            Some((Verdict::Allow, Scope::Directory))
        );
        assert_eq!(cache.lookup(&cmd("sudo make install"), "/w", true), None);
        assert_eq!(cache.lookup(&cmd("cargo build"), "/elsewhere", false), None);
    }

    #[test]
    fn deny_at_any_scope_wins() {
        let mut cache = PermissionCache::new();
        cache.record(&PermissionDecision::new(cmd("make"), Scope::Session, Verdict::Allow), "/w");
        cache.load_rules(&[PermissionRule {
            directory: None,
            action: ActionKind::RunCommand,
            verdict: RuleVerdict::Deny,
        }]);
        assert_eq!(
            cache.lookup(&cmd("make"), "/w", false),
            Some((Verdict::Deny, Scope::Global))
        );
    }

    #[test]
    fn persisted_directory_rules_are_loaded() {
        let mut cache = PermissionCache::new();
        cache.load_rules(&[PermissionRule {
            directory: Some("/w".into()),
            action: ActionKind::WriteFile,
            verdict: RuleVerdict::Allow,
        }]);
        let write = Action::new(ActionKind::WriteFile, "/w/src/main.rs");
        assert_eq!(cache.lookup(&write, "/w", false), Some((Verdict::Allow, Scope::Directory)));

        let edit = Action::new(ActionKind::EditFile, "/w/src/main.rs");
        assert_eq!(cache.lookup(&edit, "/w", false), None);
    }
}
