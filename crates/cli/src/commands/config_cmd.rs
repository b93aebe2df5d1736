//! `kubrick config`: configuration management commands.

use kubrick_config::{AppConfig, ConfigError};
use std::path::Path;

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_path().display());
    Ok(())
}

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    write_default(&path, force)?;
    println!("  ✅ Wrote default config to {}", path.display());
    Ok(())
}

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}

fn write_default(path: &Path, force: bool) -> Result<(), ConfigError> {
    let write_error = |reason: String| ConfigError::WriteError {
        path: path.to_path_buf(),
        reason,
    };
    if path.exists() && !force {
        return Err(write_error("file exists (use --force to overwrite)".into()));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
    }
    std::fs::write(path, AppConfig::default_toml()).map_err(|e| write_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        assert!(config_path().to_str().unwrap().ends_with("config.toml"));
    }

    #[test]
    fn init_writes_a_loadable_file_and_refuses_to_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        write_default(&path, false).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.agent.max_iterations, 15);

        let err = write_default(&path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        write_default(&path, true).unwrap();
    }
}
