//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `{repo}/.scopeward/config.toml` (repository layer)
//! 3. Apply `SCOPEWARD_*` env var fallbacks for fields the repo left unset
//! 4. Deserialize merged tree → `Config`
//! 5. Validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::{deep_merge, has_field, set_string_field};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Directory (relative to the repository root) holding Scopeward state.
pub const CONFIG_DIR: &str = ".scopeward";

/// Environment variables consulted when the repository config is silent.
const ENV_MAPPINGS: &[(&str, &str)] = &[
    ("SCOPEWARD_LOG_LEVEL", "logging.level"),
    ("SCOPEWARD_LOG_FORMAT", "logging.format"),
];

/// Path of the repository config file.
#[must_use]
pub fn repo_config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(CONFIG_DIR).join("config.toml")
}

/// Load the configuration for `repo_root` using the process environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the repository config file is malformed or
/// the merged configuration fails validation.
pub fn load(repo_root: &Path) -> ConfigResult<Config> {
    let env_vars: HashMap<String, String> = std::env::vars().collect();
    load_with_env(repo_root, &env_vars)
}

/// Load the configuration for `repo_root` with an explicit environment.
///
/// # Errors
///
/// See [`load`].
pub fn load_with_env<S: std::hash::BuildHasher>(
    repo_root: &Path,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<Config> {
    // 1. Parse embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    // 2. Repository config.
    let repo_path = repo_config_path(repo_root);
    let overlay = try_load_file(&repo_path)?;
    if let Some(overlay) = &overlay {
        deep_merge(&mut merged, overlay);
        debug!(path = %repo_path.display(), "loaded repository config");
    }

    // 3. Env fallbacks for fields the repository did not set.
    for (var_name, field_path) in ENV_MAPPINGS {
        let set_by_repo = overlay.as_ref().is_some_and(|o| has_field(o, field_path));
        if set_by_repo {
            continue;
        }
        if let Some(val) = env_vars.get(*var_name) {
            debug!(var = var_name, field = field_path, "applying env var fallback");
            set_string_field(&mut merged, field_path, val);
        }
    }

    // 4. Deserialize.
    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: repo_path.display().to_string(),
                source: e,
            })?;

    // 5. Validate.
    validate::validate(&config)?;
    Ok(config)
}

/// Parse a config from a TOML string (no layering), then validate it.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the string cannot be parsed or validated.
pub fn from_toml_str(content: &str) -> ConfigResult<Config> {
    let config: Config = toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: "<inline>".to_owned(),
        source: e,
    })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if the file doesn't exist.
///
/// Uses a single read operation to avoid TOCTOU races (no separate
/// exists/metadata checks before reading).
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}
