//! `kubrick doctor`: diagnose configuration and provider health.

use kubrick_config::AppConfig;

/// Providers that run locally and need no key.
const KEYLESS_PROVIDERS: &[&str] = &["triton", "ollama", "vllm", "llamacpp"];

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Kubrick Doctor: System Diagnostics");
    println!("=====================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found at {}", config_path.display());
    } else {
        println!("  ⚠️  No config file, using defaults (run `kubrick config init`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config file before running the agent.");
            return Ok(());
        }
    };

    println!("     Provider: {}", config.default_provider);
    println!("     Model:    {}", config.default_model);
    println!(
        "     Window:   {} tokens",
        config.context.window_for(&config.default_model)
    );

    if config.api_key_for(&config.default_provider).is_some() {
        println!("  ✅ API key configured");
    } else if KEYLESS_PROVIDERS.contains(&config.default_provider.as_str()) {
        println!("  ✅ No API key needed for {}", config.default_provider);
    } else {
        println!("  ⚠️  No API key configured (set KUBRICK_API_KEY or add api_key to config.toml)");
        issues += 1;
    }

    let router = kubrick_providers::build_from_config(&config);
    match router.default() {
        Some(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider '{}' is reachable", provider.name()),
            Ok(false) => {
                println!("  ❌ Provider '{}' did not report healthy", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider '{}' health check failed: {e}", provider.name());
                issues += 1;
            }
        },
        None => {
            println!("  ❌ No default provider could be built");
            issues += 1;
        }
    }

    let permissions = AppConfig::permissions_path();
    match kubrick_config::PermissionFile::load_from(&permissions) {
        Ok(file) => println!("  ✅ {} saved permission rule(s)", file.rules.len()),
        Err(e) => {
            println!("  ❌ Permission file unreadable: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
