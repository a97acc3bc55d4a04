//! Post-merge configuration validation.
//!
//! Validates that deserialized [`Config`](crate::Config) values are usable
//! so that request-time code never has to second-guess the configuration.

use scopeward_core::{normalize_rel_path, normalize_root};

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, DomainSection};

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_domains(config)?;
    validate_loops(config)?;
    validate_proposals(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_domain(name: &str, section: &DomainSection) -> ConfigResult<()> {
    for (idx, root) in section.roots.iter().enumerate() {
        normalize_root(root).map_err(|e| ConfigError::ValidationError {
            field: format!("domains.{name}.roots[{idx}]"),
            message: e.to_string(),
        })?;
    }
    Ok(())
}

fn validate_domains(config: &Config) -> ConfigResult<()> {
    if let Some(story) = &config.domains.story {
        validate_domain("story", story)?;
    }
    Ok(())
}

fn validate_loops(config: &Config) -> ConfigResult<()> {
    let dir = normalize_rel_path(&config.loops.directory).map_err(|e| {
        ConfigError::ValidationError {
            field: "loops.directory".to_owned(),
            message: e.to_string(),
        }
    })?;
    if dir.is_empty() || dir.is_repo_root() {
        return Err(ConfigError::ValidationError {
            field: "loops.directory".to_owned(),
            message: "must name a directory inside the repository".to_owned(),
        });
    }
    Ok(())
}

/// Upper bound for the approval resolver deadline (one hour).
const APPROVAL_TIMEOUT_UPPER_BOUND_SECS: u64 = 3600;

fn validate_proposals(config: &Config) -> ConfigResult<()> {
    let secs = config.proposals.approval_timeout_secs;
    if secs == 0 || secs > APPROVAL_TIMEOUT_UPPER_BOUND_SECS {
        return Err(ConfigError::ValidationError {
            field: "proposals.approval_timeout_secs".to_owned(),
            message: format!(
                "approval_timeout_secs must be between 1 and {APPROVAL_TIMEOUT_UPPER_BOUND_SECS}"
            ),
        });
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        });
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopeward_core::Policy;

    fn story(roots: &[&str]) -> Config {
        let mut config = Config::default();
        config.domains.story = Some(DomainSection {
            roots: roots.iter().map(|r| (*r).to_owned()).collect(),
            policy: Policy::Hard,
        });
        config
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_story_roots_valid() {
        assert!(validate(&story(&["content/story", "./assets/story/", "."])).is_ok());
    }

    #[test]
    fn test_escaping_root_rejected() {
        let err = validate(&story(&["content", "../outside"])).unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "domains.story.roots[1]");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_absolute_root_rejected() {
        assert!(validate(&story(&["/etc"])).is_err());
    }

    #[test]
    fn test_loops_directory_must_be_inside_repo() {
        let mut config = Config::default();
        config.loops.directory = "../loops".to_owned();
        assert!(validate(&config).is_err());

        config.loops.directory = ".".to_owned();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_approval_timeout_rejected() {
        let mut config = Config::default();
        config.proposals.approval_timeout_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_owned();
        assert!(validate(&config).is_err());
    }
}
