//! YAML configuration loading and saving
//!
//! Loading never fails: a missing or broken file falls back to defaults so a
//! typo in the config never leaves the controller dead on stage.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load a configuration from a YAML file, or `T::default()`
///
/// Read and parse failures are logged and fall back to the defaults.
/// Partial files fill the gaps from `#[serde(default)]`.
///
/// # Arguments
/// * `path` - YAML file, usually from [`default_config_path`]
///
/// # Example
///
/// ```ignore
/// let automix: AutomixConfig = load_config(&default_config_path(AUTOMIX_CONFIG_FILE));
/// ```
///
/// [`default_config_path`]: super::default_config_path
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("Config {:?} not found, using defaults", path);
        return T::default();
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            log::warn!("Failed to read config {:?}: {}, using defaults", path, e);
            return T::default();
        }
    };

    match serde_yaml::from_str::<T>(&contents) {
        Ok(config) => {
            log::info!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("Failed to parse config {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Write a configuration as YAML, creating parent directories
///
/// # Errors
/// Fails on I/O or serialization errors.
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config {:?}", path))?;

    log::info!("Saved config to {:?}", path);
    Ok(())
}
