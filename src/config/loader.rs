// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] for
/// the semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    ConfigFile::try_from(raw_config)
}

/// `Reloadq.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Reloadq.toml")
}

/// Directory scope roots are resolved against.
///
/// The config file's parent directory, or the current working directory for
/// a bare file name like `Reloadq.toml`.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::errors::ReloadqError;
    use crate::types::{AnalyzerKind, ReconcilePolicy};

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_full_config() {
        let file = write_config(
            r#"
            [debounce]
            file_watch_ms = 250

            [reconcile]
            policy = "strict"
            analyzer = "bytes"

            [sink]
            cmd = "true"

            [[scope]]
            context = "app"
            base_package = "com.example"
            roots = ["target/classes"]
            "#,
        );

        let cfg = load_and_validate(file.path()).unwrap();
        assert_eq!(cfg.debounce.file_watch_ms, 250);
        assert_eq!(cfg.debounce.live_redefinition_ms, 0);
        assert_eq!(cfg.reconcile.policy, ReconcilePolicy::Strict);
        assert_eq!(cfg.reconcile.analyzer, AnalyzerKind::Bytes);
        assert_eq!(cfg.sink.cmd.as_deref(), Some("true"));
        assert_eq!(cfg.scope.len(), 1);
        assert_eq!(cfg.scope[0].artifacts, None);
    }

    #[test]
    fn defaults_apply_when_sections_are_missing() {
        let file = write_config(
            r#"
            [[scope]]
            context = "app"
            roots = ["out"]
            "#,
        );

        let cfg = load_and_validate(file.path()).unwrap();
        assert_eq!(cfg.debounce.file_watch_ms, 600);
        assert_eq!(cfg.reconcile.policy, ReconcilePolicy::Strict);
        assert_eq!(cfg.reconcile.analyzer, AnalyzerKind::ClassShape);
        assert_eq!(cfg.sink.cmd, None);
        assert_eq!(cfg.scope[0].base_package, "");
    }

    #[test]
    fn bad_toml_and_missing_file_are_reported() {
        let file = write_config("[[scope]\ncontext = ");
        assert!(matches!(
            load_from_path(file.path()),
            Err(ReloadqError::TomlError(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_from_path(dir.path().join("missing.toml")),
            Err(ReloadqError::IoError(_))
        ));
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        let file = write_config(
            r#"
            [reconcile]
            policy = "sometimes"
            "#,
        );
        assert!(matches!(
            load_from_path(file.path()),
            Err(ReloadqError::TomlError(_))
        ));
    }

    #[test]
    fn root_dir_of_bare_file_name_is_cwd() {
        assert_eq!(
            config_root_dir(Path::new("conf/Reloadq.toml")),
            PathBuf::from("conf")
        );
        assert!(config_root_dir(Path::new("Reloadq.toml")).is_absolute());
    }
}
