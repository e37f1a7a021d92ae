//! Configuration loading

use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::Config;

/// Load configuration from a config file and environment variables
///
/// Config file search order:
/// 1. `explicit` (the `--config` argument)
/// 2. `MULTIAUTH_CONFIG_PATH` environment variable
/// 3. ./config.yaml (current working directory)
/// 4. /config/config.yaml (container mount path)
/// 5. Fall back to environment variables only
///
/// Runs before logging is initialized, so progress goes to stderr.
pub fn load_config(explicit: Option<&str>) -> Result<Config> {
    let config_path = explicit
        .map(ToString::to_string)
        .or_else(|| {
            std::env::var("MULTIAUTH_CONFIG_PATH")
                .ok()
                .filter(|p| Path::new(p).exists())
        })
        .or_else(|| {
            ["config.yaml", "/config/config.yaml"]
                .into_iter()
                .find(|p| Path::new(p).exists())
                .map(ToString::to_string)
        });

    let config = if let Some(path) = config_path {
        if !Path::new(&path).exists() {
            return Err(anyhow::anyhow!("Config file not found: {path}"));
        }
        eprintln!("Loading config from {path}");
        Config::from_file(&path).map_err(|e| anyhow::anyhow!("Failed to load {path}: {e}"))?
    } else {
        eprintln!("No config file found, using environment variables");
        Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?
    };

    // Fail fast on misconfigurations
    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Config validation error: {error}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    Ok(config)
}

/// Log the effective configuration once logging is up
pub fn log_config_summary(config: &Config) {
    let enabled: Vec<&str> = crate::ProviderKey::ALL
        .into_iter()
        .filter(|key| config.auth.is_enabled(*key))
        .map(|key| key.as_str())
        .collect();

    info!("Configuration loaded and validated successfully");
    info!("HTTP address: {}", config.http_address());
    info!("Hub prefix: {}", config.server.normalized_base_url());
    info!(providers = ?enabled, "Enabled identity providers");
}
