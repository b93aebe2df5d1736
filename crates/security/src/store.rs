//! Persistence hook for directory-scoped decisions.

use kubrick_config::{ConfigError, PermissionFile, PermissionRule};
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum PermissionStoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Permission store lock poisoned")]
    Poisoned,
}

/// Where persisted permission rules come from and go to.
pub trait PermissionStore: Send + Sync {
    fn load(&self) -> Result<Vec<PermissionRule>, PermissionStoreError>;

    /// Persist a rule, replacing any earlier rule for the same directory and action.
    fn save(&self, rule: PermissionRule) -> Result<(), PermissionStoreError>;
}

/// Rules that live only as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    file: Mutex<PermissionFile>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<PermissionRule>) -> Self {
        Self {
            file: Mutex::new(PermissionFile { rules }),
        }
    }
}

impl PermissionStore for InMemoryPermissionStore {
    fn load(&self) -> Result<Vec<PermissionRule>, PermissionStoreError> {
        let file = self.file.lock().map_err(|_| PermissionStoreError::Poisoned)?;
        Ok(file.rules.clone())
    }

    fn save(&self, rule: PermissionRule) -> Result<(), PermissionStoreError> {
        let mut file = self.file.lock().map_err(|_| PermissionStoreError::Poisoned)?;
        file.upsert(rule);
        Ok(())
    }
}

/// Rules kept in a TOML file (normally `~/.kubrick/permissions.toml`).
#[derive(Debug)]
pub struct FilePermissionStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl FilePermissionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl PermissionStore for FilePermissionStore {
    fn load(&self) -> Result<Vec<PermissionRule>, PermissionStoreError> {
        Ok(PermissionFile::load_from(&self.path)?.rules)
    }

    fn save(&self, rule: PermissionRule) -> Result<(), PermissionStoreError> {
        let _guard = self.lock.lock().map_err(|_| PermissionStoreError::Poisoned)?;
        let mut file = PermissionFile::load_from(&self.path)?;
        file.upsert(rule);
        file.save_to(&self.path)?;
        tracing::debug!(path = %self.path.display(), "Saved permission rule");
        Ok(())
    }
}
