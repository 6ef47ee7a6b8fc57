// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::{ConfigFile, ScopeConfig};
use crate::event::{BaseScope, ContextId};
use crate::fs::FileSystem;

/// Artifact pattern used when a scope does not list its own.
pub const DEFAULT_ARTIFACT_PATTERN: &str = "**/*.class";

/// Compiled watch settings for one `(context, base package)` scope.
///
/// Patterns are matched against paths relative to one of the scope's roots,
/// e.g. `"com/example/Foo.class"`.
#[derive(Clone)]
pub struct ScopeWatchProfile {
    context: ContextId,
    scope: BaseScope,
    roots: Vec<PathBuf>,
    artifacts: GlobSet,
}

impl fmt::Debug for ScopeWatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeWatchProfile")
            .field("context", &self.context)
            .field("scope", &self.scope)
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

impl ScopeWatchProfile {
    pub fn new(
        context: ContextId,
        scope: BaseScope,
        roots: Vec<PathBuf>,
        artifact_patterns: &[String],
    ) -> Result<Self> {
        Ok(Self {
            context,
            scope,
            roots,
            artifacts: compile_globs(artifact_patterns)?,
        })
    }

    pub fn context(&self) -> &ContextId {
        &self.context
    }

    pub fn scope(&self) -> &BaseScope {
        &self.scope
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// True if `rel_path` is a tracked artifact, e.g. `"com/example/Foo.class"`.
    pub fn is_artifact(&self, rel_path: &str) -> bool {
        self.artifacts.is_match(rel_path)
    }

    /// The root `path` lives under, if any.
    pub fn root_of(&self, path: &Path) -> Option<&Path> {
        self.roots
            .iter()
            .find(|root| path.starts_with(root))
            .map(PathBuf::as_path)
    }
}

fn compile_globs(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    if patterns.is_empty() {
        builder.add(Glob::new(DEFAULT_ARTIFACT_PATTERN)?);
    }
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .with_context(|| format!("invalid artifact glob pattern: {pattern}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Build one profile per `[[scope]]` entry.
///
/// Relative roots are resolved against `base_dir` (the directory holding the
/// config file) and canonicalized when they exist, so they line up with the
/// absolute paths the OS watcher reports.
pub fn build_profiles_from_config(
    cfg: &ConfigFile,
    base_dir: &Path,
    fs: &dyn FileSystem,
) -> Result<Vec<ScopeWatchProfile>> {
    cfg.scope
        .iter()
        .map(|scope| build_profile(scope, base_dir, fs))
        .collect()
}

fn build_profile(scope: &ScopeConfig, base_dir: &Path, fs: &dyn FileSystem) -> Result<ScopeWatchProfile> {
    let roots = scope
        .roots
        .iter()
        .map(|root| {
            let joined = base_dir.join(root);
            fs.canonicalize(&joined).unwrap_or(joined)
        })
        .collect();
    ScopeWatchProfile::new(
        ContextId::from(scope.context.as_str()),
        BaseScope::from(scope.base_package.as_str()),
        roots,
        scope.artifacts.as_deref().unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(patterns: &[&str]) -> ScopeWatchProfile {
        let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        ScopeWatchProfile::new(
            "app".into(),
            "com.example".into(),
            vec![PathBuf::from("/work/target/classes")],
            &patterns,
        )
        .unwrap()
    }

    #[test]
    fn default_pattern_tracks_class_files() {
        let p = profile(&[]);
        assert!(p.is_artifact("com/example/Foo.class"));
        assert!(p.is_artifact("com/example/Foo$Inner.class"));
        assert!(!p.is_artifact("com/example/app.properties"));
    }

    #[test]
    fn custom_patterns_replace_default() {
        let p = profile(&["**/*Controller.class"]);
        assert!(p.is_artifact("com/example/web/HomeController.class"));
        assert!(!p.is_artifact("com/example/Foo.class"));
    }

    #[test]
    fn invalid_glob_is_rejected() {
        let patterns = vec!["[".to_string()];
        assert!(ScopeWatchProfile::new("app".into(), "x".into(), vec![], &patterns).is_err());
    }

    #[test]
    fn profiles_resolve_roots_against_base_dir() {
        use crate::config::RawConfigFile;
        use crate::fs::mock::MockFileSystem;

        let raw: RawConfigFile = toml::from_str(
            r#"
            [[scope]]
            context = "app"
            base_package = "com.example"
            roots = ["target/classes", "/abs/out"]
            artifacts = ["**/*.class"]
            "#,
        )
        .unwrap();
        let cfg = ConfigFile::try_from(raw).unwrap();

        let profiles =
            build_profiles_from_config(&cfg, Path::new("/project"), &MockFileSystem::new()).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].context().as_str(), "app");
        assert_eq!(
            profiles[0].roots(),
            &[PathBuf::from("/project/target/classes"), PathBuf::from("/abs/out")]
        );
    }

    #[test]
    fn root_lookup() {
        let p = profile(&[]);
        assert_eq!(
            p.root_of(Path::new("/work/target/classes/com/example/Foo.class")),
            Some(Path::new("/work/target/classes"))
        );
        assert_eq!(p.root_of(Path::new("/elsewhere/Foo.class")), None);
    }
}
