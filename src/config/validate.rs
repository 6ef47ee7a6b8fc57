// src/config/validate.rs

use std::collections::HashSet;

use globset::Glob;
use regex::Regex;

use crate::config::model::{ConfigFile, DebounceSection, RawConfigFile, ScopeConfig};
use crate::errors::{ReloadqError, Result};

/// Longest accepted debounce window.
pub const MAX_WINDOW_MS: u64 = 60 * 60 * 1000;

/// Dotted Java package name, or empty for the default package.
const PACKAGE_PATTERN: &str = r"^([A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*)?$";

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ReloadqError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_scopes(cfg)?;
    validate_debounce(&cfg.debounce)?;
    validate_sink(cfg)?;
    validate_scopes(&cfg.scope)?;
    Ok(())
}

fn ensure_has_scopes(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scope.is_empty() {
        return Err(ReloadqError::ConfigError(
            "config must contain at least one [[scope]] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_debounce(debounce: &DebounceSection) -> Result<()> {
    for (name, value) in [
        ("file_watch_ms", debounce.file_watch_ms),
        ("live_redefinition_ms", debounce.live_redefinition_ms),
    ] {
        if value > MAX_WINDOW_MS {
            return Err(ReloadqError::ConfigError(format!(
                "[debounce].{name} must be <= {MAX_WINDOW_MS} (got {value})"
            )));
        }
    }
    Ok(())
}

fn validate_sink(cfg: &RawConfigFile) -> Result<()> {
    if let Some(cmd) = &cfg.sink.cmd {
        if cmd.trim().is_empty() {
            return Err(ReloadqError::ConfigError(
                "[sink].cmd must not be empty; omit it to only log reconciliations".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_scopes(scopes: &[ScopeConfig]) -> Result<()> {
    let package_re = Regex::new(PACKAGE_PATTERN)
        .map_err(|e| ReloadqError::ConfigError(format!("package pattern: {e}")))?;
    let mut seen = HashSet::new();

    for (i, scope) in scopes.iter().enumerate() {
        if scope.context.trim().is_empty() {
            return Err(ReloadqError::ConfigError(format!(
                "scope #{} has an empty `context`",
                i + 1
            )));
        }
        if !package_re.is_match(&scope.base_package) {
            return Err(ReloadqError::ConfigError(format!(
                "scope '{}' has invalid base_package '{}'",
                scope.context, scope.base_package
            )));
        }
        if !seen.insert((scope.context.as_str(), scope.base_package.as_str())) {
            return Err(ReloadqError::ConfigError(format!(
                "scope '{}' registers base_package '{}' twice",
                scope.context, scope.base_package
            )));
        }
        if scope.roots.is_empty() || scope.roots.iter().any(|r| r.trim().is_empty()) {
            return Err(ReloadqError::ConfigError(format!(
                "scope '{}' must list at least one non-empty root",
                scope.context
            )));
        }
        for pattern in scope.artifacts.iter().flatten() {
            Glob::new(pattern).map_err(|e| {
                ReloadqError::ConfigError(format!(
                    "scope '{}' has invalid artifact pattern '{}': {}",
                    scope.context, pattern, e
                ))
            })?;
        }
    }
    Ok(())
}
