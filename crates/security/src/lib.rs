//! Safety gate for Kubrick: every file mutation and shell command is vetted
//! here before it runs.
//!
//! Provides:
//! - **Danger classification**: an ordered regex table flags destructive commands
//! - **Permission cache**: once/session/directory/global decisions
//! - **Prompting**: the [`Prompter`] trait, with terminal and scripted implementations
//! - **Persistence**: directory decisions saved through a [`PermissionStore`]

pub mod danger;
pub mod gate;
pub mod permission;
pub mod prompter;
pub mod store;

pub use danger::{Danger, DangerClassifier, DangerPatternError};
pub use gate::SafetyGate;
pub use permission::{PermissionCache, PermissionDecision, Scope, Verdict};
pub use prompter::{PermissionRequest, PlanDecision, PromptChoice, Prompter, ScriptedPrompter, TerminalPrompter};
pub use store::{FilePermissionStore, InMemoryPermissionStore, PermissionStore, PermissionStoreError};
