//! The safety gate: every side effect passes through [`SafetyGate::authorize`].

use kubrick_config::{PermissionRule, SafetyConfig};
use kubrick_core::event::{AgentEvent, EventBus};
use kubrick_core::tool::{Action, ActionKind};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::danger::{Danger, DangerClassifier, DangerPatternError};
use crate::permission::{PermissionCache, PermissionDecision, Scope, Verdict};
use crate::prompter::{PermissionRequest, Prompter};
use crate::store::{InMemoryPermissionStore, PermissionStore};

/// Mediates file mutations and shell commands.
///
/// Decisions are cached for the process lifetime; directory decisions are
/// also written through the [`PermissionStore`]. Only one prompt is shown at
/// a time, and the cache is consulted again once the prompt lock is held so a
/// decision reached while waiting is reused.
pub struct SafetyGate {
    require_confirmation: bool,
    confirm_all_commands: bool,
    classifier: DangerClassifier,
    directory: String,
    prompter: Arc<dyn Prompter>,
    store: Arc<dyn PermissionStore>,
    events: Option<Arc<EventBus>>,
    cache: Mutex<PermissionCache>,
    prompt_lock: tokio::sync::Mutex<()>,
}

impl SafetyGate {
    pub fn new(
        config: &SafetyConfig,
        working_dir: &Path,
        prompter: Arc<dyn Prompter>,
    ) -> Result<Self, DangerPatternError> {
        let directory = std::fs::canonicalize(working_dir)
            .unwrap_or_else(|_| working_dir.to_path_buf())
            .display()
            .to_string();

        Ok(Self {
            require_confirmation: config.require_confirmation,
            confirm_all_commands: config.confirm_all_commands,
            classifier: DangerClassifier::from_rules(&config.dangerous_patterns)?,
            directory,
            prompter,
            store: Arc::new(InMemoryPermissionStore::new()),
            events: None,
            cache: Mutex::new(PermissionCache::new()),
            prompt_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Use a persistent store and seed the cache from it.
    pub fn with_store(mut self, store: Arc<dyn PermissionStore>) -> Self {
        match store.load() {
            Ok(rules) => {
                debug!(count = rules.len(), "Loaded persisted permission rules");
                self.cache_mut().load_rules(&rules);
            }
            Err(e) => warn!(error = %e, "Failed to load permission rules; starting empty"),
        }
        self.store = store;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// The directory decisions are bound to.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn classify_danger(&self, command: &str) -> Danger {
        self.classifier.classify(command)
    }

    /// Decide whether `action` may run, prompting the user when needed.
    pub async fn authorize(&self, action: &Action) -> Verdict {
        let danger = match action.kind {
            ActionKind::RunCommand => self.classify_danger(&action.subject),
            _ => Danger::Safe,
        };
        let dangerous = danger.is_dangerous();

        if let Some(verdict) = self.cached(action, dangerous) {
            return verdict;
        }

        if !self.require_confirmation || !self.needs_prompt(action, dangerous) {
            debug!(action = %action, "Allowed without confirmation");
            return Verdict::Allow;
        }

        let _prompt = self.prompt_lock.lock().await;
        if let Some(verdict) = self.cached(action, dangerous) {
            return verdict;
        }

        let request = PermissionRequest {
            action: action.clone(),
            danger: danger.reason().map(String::from),
            directory: self.directory.clone(),
        };
        self.publish(AgentEvent::PermissionPrompt {
            action: action.clone(),
            danger: request.danger.clone(),
        });

        let choice = self.prompter.ask(&request).await;
        let decision = PermissionDecision::new(action.clone(), choice.scope(), choice.verdict());
        self.cache_mut().record(&decision, &self.directory);

        if decision.scope == Scope::Directory {
            let rule = PermissionRule {
                directory: Some(self.directory.clone()),
                action: action.kind,
                verdict: decision.verdict.into(),
            };
            if let Err(e) = self.store.save(rule) {
                warn!(error = %e, "Failed to persist permission rule");
            }
        }

        info!(
            action = %action,
            verdict = ?decision.verdict,
            scope = %decision.scope,
            "Permission decided"
        );
        self.publish_decision(action, decision.verdict, decision.scope);
        decision.verdict
    }

    fn needs_prompt(&self, action: &Action, dangerous: bool) -> bool {
        dangerous
            || action.kind.is_file_mutation()
            || (action.kind == ActionKind::RunCommand && self.confirm_all_commands)
    }

    fn cached(&self, action: &Action, dangerous: bool) -> Option<Verdict> {
        let (verdict, scope) = self.cache_mut().lookup(action, &self.directory, dangerous)?;
        debug!(action = %action, ?verdict, %scope, "Cached permission");
        self.publish_decision(action, verdict, scope);
        Some(verdict)
    }

    fn cache_mut(&self) -> MutexGuard<'_, PermissionCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish_decision(&self, action: &Action, verdict: Verdict, scope: Scope) {
        self.publish(AgentEvent::PermissionDecided {
            action: action.clone(),
            allowed: verdict.is_allowed(),
            scope: scope.as_str().to_string(),
        });
    }

    fn publish(&self, event: AgentEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}
