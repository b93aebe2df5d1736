//! Asking the user whether a side effect may proceed, and whether a plan
//! should be carried out.

use async_trait::async_trait;
use kubrick_core::tool::Action;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::Mutex;

use crate::permission::{Scope, Verdict};

/// What the gate shows the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub action: Action,
    /// Reason the command was classified dangerous, if it was
    pub danger: Option<String>,
    /// Working directory the decision would be bound to
    pub directory: String,
}

/// The five answers offered for every prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptChoice {
    AllowOnce,
    AllowSession,
    AllowDirectory,
    DenyOnce,
    DenyDirectory,
}

impl PromptChoice {
    pub const ALL: [PromptChoice; 5] = [
        Self::AllowOnce,
        Self::AllowSession,
        Self::AllowDirectory,
        Self::DenyOnce,
        Self::DenyDirectory,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::AllowOnce => "Yes, just this once",
            Self::AllowSession => "Yes, for this conversation",
            Self::AllowDirectory => "Yes, always in this directory",
            Self::DenyOnce => "No, not this time",
            Self::DenyDirectory => "No, never in this directory",
        }
    }

    pub fn verdict(&self) -> Verdict {
        match self {
            Self::AllowOnce | Self::AllowSession | Self::AllowDirectory => Verdict::Allow,
            Self::DenyOnce | Self::DenyDirectory => Verdict::Deny,
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Self::AllowOnce | Self::DenyOnce => Scope::Once,
            Self::AllowSession => Scope::Session,
            Self::AllowDirectory | Self::DenyDirectory => Scope::Directory,
        }
    }

    /// Parse a typed answer: a menu number or a short keyword.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "1" | "y" | "yes" => Some(Self::AllowOnce),
            "2" | "s" | "session" => Some(Self::AllowSession),
            "3" | "a" | "always" => Some(Self::AllowDirectory),
            "4" | "n" | "no" => Some(Self::DenyOnce),
            "5" | "never" => Some(Self::DenyDirectory),
            _ => None,
        }
    }
}

/// Review outcome for a proposed implementation plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanDecision {
    Approve,
    /// Carry out the plan with these changes
    Modify(String),
    Reject,
}

impl PlanDecision {
    /// Parse the menu answer. An empty answer approves; modifications are
    /// collected separately.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "" | "1" | "a" | "approve" | "y" | "yes" => Some(Self::Approve),
            "2" | "m" | "modify" => Some(Self::Modify(String::new())),
            "3" | "r" | "reject" | "n" | "no" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Source of permission answers and plan reviews.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn ask(&self, request: &PermissionRequest) -> PromptChoice;

    async fn review_plan(&self, plan: &str) -> PlanDecision;
}

/// Interactive prompt on stderr/stdin.
///
/// Reading stdin blocks, so it runs on the blocking pool. Unreadable or
/// unrecognised input is treated as "No, not this time".
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn ask(&self, request: &PermissionRequest) -> PromptChoice {
        let request = request.clone();
        tokio::task::spawn_blocking(move || prompt_blocking(&request))
            .await
            .unwrap_or(PromptChoice::DenyOnce)
    }

    async fn review_plan(&self, plan: &str) -> PlanDecision {
        let plan = plan.to_string();
        tokio::task::spawn_blocking(move || review_blocking(&plan))
            .await
            .unwrap_or(PlanDecision::Reject)
    }
}

fn read_answer() -> Option<String> {
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line),
    }
}

fn review_blocking(plan: &str) -> PlanDecision {
    eprintln!();
    eprintln!("📋 Proposed plan");
    for line in plan.lines() {
        eprintln!("   {line}");
    }
    eprintln!("   1. Approve and carry it out");
    eprintln!("   2. Modify before carrying it out");
    eprintln!("   3. Reject");
    eprint!("   Choice [1-3, default 1]: ");
    let _ = io::stderr().flush();

    let Some(answer) = read_answer() else {
        return PlanDecision::Reject;
    };
    match PlanDecision::parse(&answer) {
        Some(PlanDecision::Modify(_)) => {
            eprint!("   Modifications: ");
            let _ = io::stderr().flush();
            match read_answer().map(|m| m.trim().to_string()) {
                Some(m) if !m.is_empty() => PlanDecision::Modify(m),
                _ => PlanDecision::Approve,
            }
        }
        Some(decision) => decision,
        None => PlanDecision::Reject,
    }
}

fn prompt_blocking(request: &PermissionRequest) -> PromptChoice {
    eprintln!();
    eprintln!("🔒 Permission required: {}", request.action.kind);
    eprintln!("   {}", summarize_subject(&request.action.subject, 120));
    if let Some(reason) = &request.danger {
        eprintln!("   ⚠️  {reason}");
    }
    for (i, choice) in PromptChoice::ALL.iter().enumerate() {
        eprintln!("   {}. {}", i + 1, choice.label());
    }
    eprint!("   Choice [1-5]: ");
    let _ = io::stderr().flush();

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return PromptChoice::DenyOnce;
    }
    PromptChoice::parse(&line).unwrap_or(PromptChoice::DenyOnce)
}

/// Shorten a subject for display, on a character boundary.
pub fn summarize_subject(subject: &str, max_chars: usize) -> String {
    let mut chars = subject.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{truncated}…")
    } else {
        subject.to_string()
    }
}

/// Answers from a script, for tests and non-interactive runs.
///
/// Once the script runs out every request gets the fallback answer, and
/// every plan is approved.
#[derive(Debug)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<PromptChoice>>,
    fallback: PromptChoice,
    asked: Mutex<Vec<PermissionRequest>>,
    plan_decisions: Mutex<VecDeque<PlanDecision>>,
    reviewed: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = PromptChoice>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            fallback: PromptChoice::DenyOnce,
            asked: Mutex::new(Vec::new()),
            plan_decisions: Mutex::new(VecDeque::new()),
            reviewed: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with the same choice.
    pub fn always(choice: PromptChoice) -> Self {
        Self::new([]).with_fallback(choice)
    }

    pub fn with_fallback(mut self, choice: PromptChoice) -> Self {
        self.fallback = choice;
        self
    }

    pub fn with_plan_decisions(self, decisions: impl IntoIterator<Item = PlanDecision>) -> Self {
        Self {
            plan_decisions: Mutex::new(decisions.into_iter().collect()),
            ..self
        }
    }

    /// Requests seen so far, in order.
    pub fn asked(&self) -> Vec<PermissionRequest> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    /// Plans reviewed so far, in order.
    pub fn reviewed_plans(&self) -> Vec<String> {
        self.reviewed.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn ask(&self, request: &PermissionRequest) -> PromptChoice {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(request.clone());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut a| a.pop_front())
            .unwrap_or(self.fallback)
    }

    async fn review_plan(&self, plan: &str) -> PlanDecision {
        if let Ok(mut reviewed) = self.reviewed.lock() {
            reviewed.push(plan.to_string());
        }
        self.plan_decisions
            .lock()
            .ok()
            .and_then(|mut d| d.pop_front())
            .unwrap_or(PlanDecision::Approve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubrick_core::tool::ActionKind;

    fn request(subject: &str) -> PermissionRequest {
        PermissionRequest {
            action: Action::new(ActionKind::RunCommand, subject),
            danger: None,
            directory: "/w".into(),
        }
    }

    #[test]
    fn choices_map_to_verdict_and_scope() {
        assert_eq!(PromptChoice::AllowOnce.verdict(), Verdict::Allow);
        assert_eq!(PromptChoice::AllowSession.scope(), Scope::Session);
        assert_eq!(PromptChoice::AllowDirectory.scope(), Scope::Directory);
        assert_eq!(PromptChoice::DenyOnce.verdict(), Verdict::Deny);
        assert_eq!(PromptChoice::DenyDirectory.scope(), Scope::Directory);
    }

    #[test]
    fn parse_accepts_numbers_and_keywords() {
        assert_eq!(PromptChoice::parse("1\n"), Some(PromptChoice::AllowOnce));
        assert_eq!(PromptChoice::parse(" Y "), Some(PromptChoice::AllowOnce));
        assert_eq!(PromptChoice::parse("session"), Some(PromptChoice::AllowSession));
        assert_eq!(PromptChoice::parse("3"), Some(PromptChoice::AllowDirectory));
        assert_eq!(PromptChoice::parse("no"), Some(PromptChoice::DenyOnce));
        assert_eq!(PromptChoice::parse("5"), Some(PromptChoice::DenyDirectory));
        assert_eq!(PromptChoice::parse("maybe"), None);
    }

    #[test]
    fn labels_are_distinct() {
        let labels: std::collections::HashSet<_> = PromptChoice::ALL.iter().map(|c| c.label()).collect();
        assert_eq!(labels.len(), 5);
    }

    #[test]
    fn summarize_subject_truncates_on_char_boundary() {
        let long = "🦀".repeat(200);
        let summary = summarize_subject(&long, 80);
        assert!(summary.ends_with('…'));
        assert_eq!(summary.chars().count(), 81);
        assert_eq!(summarize_subject("ls -la", 80), "ls -la");
    }

    #[tokio::test]
    async fn scripted_prompter_replays_then_falls_back() {
        let prompter = ScriptedPrompter::new([PromptChoice::AllowSession]);
        assert_eq!(prompter.ask(&request("make")).await, PromptChoice::AllowSession);
        assert_eq!(prompter.ask(&request("make test")).await, PromptChoice::DenyOnce);

        let asked = prompter.asked();
        assert_eq!(asked.len(), 2);
        assert_eq!(asked[1].action.subject, "make test");
    }

    #[test]
    fn plan_answers() {
        assert_eq!(PlanDecision::parse("\n"), Some(PlanDecision::Approve));
        assert_eq!(PlanDecision::parse("approve"), Some(PlanDecision::Approve));
        assert_eq!(PlanDecision::parse("2"), Some(PlanDecision::Modify(String::new())));
        assert_eq!(PlanDecision::parse(" R "), Some(PlanDecision::Reject));
        assert_eq!(PlanDecision::parse("later"), None);
    }

    #[tokio::test]
    async fn scripted_plan_reviews_replay_then_approve() {
        let prompter = ScriptedPrompter::new([]).with_plan_decisions([PlanDecision::Modify("skip tests".into())]);
        assert_eq!(
            prompter.review_plan("## Plan A").await,
            PlanDecision::Modify("skip tests".into())
        );
        assert_eq!(prompter.review_plan("## Plan B").await, PlanDecision::Approve);
        assert_eq!(prompter.reviewed_plans(), vec!["## Plan A", "## Plan B"]);
        assert!(prompter.asked().is_empty());
    }

    #[tokio::test]
    async fn always_prompter() {
        let prompter = ScriptedPrompter::always(PromptChoice::AllowOnce);
        for _ in 0..3 {
            assert_eq!(prompter.ask(&request("ls")).await, PromptChoice::AllowOnce);
        }
    }
}
