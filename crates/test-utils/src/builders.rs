#![allow(dead_code)]

use reloadq::config::{
    ConfigFile, DebounceSection, RawConfigFile, ReconcileSection, ScopeConfig, SinkSection,
};
use reloadq::types::{AnalyzerKind, ReconcilePolicy};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                debounce: DebounceSection::default(),
                reconcile: ReconcileSection::default(),
                sink: SinkSection::default(),
                scope: vec![],
            },
        }
    }

    pub fn with_scope(mut self, scope: ScopeConfig) -> Self {
        self.config.scope.push(scope);
        self
    }

    pub fn file_watch_ms(mut self, ms: u64) -> Self {
        self.config.debounce.file_watch_ms = ms;
        self
    }

    pub fn live_redefinition_ms(mut self, ms: u64) -> Self {
        self.config.debounce.live_redefinition_ms = ms;
        self
    }

    pub fn policy(mut self, policy: ReconcilePolicy) -> Self {
        self.config.reconcile.policy = policy;
        self
    }

    pub fn analyzer(mut self, analyzer: AnalyzerKind) -> Self {
        self.config.reconcile.analyzer = analyzer;
        self
    }

    pub fn sink_cmd(mut self, cmd: &str) -> Self {
        self.config.sink.cmd = Some(cmd.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ScopeConfig`.
pub struct ScopeConfigBuilder {
    scope: ScopeConfig,
}

impl ScopeConfigBuilder {
    pub fn new(context: &str, base_package: &str) -> Self {
        Self {
            scope: ScopeConfig {
                context: context.to_string(),
                base_package: base_package.to_string(),
                roots: vec![],
                artifacts: None,
            },
        }
    }

    pub fn root(mut self, root: impl AsRef<std::path::Path>) -> Self {
        self.scope
            .roots
            .push(root.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn artifact(mut self, pattern: &str) -> Self {
        self.scope
            .artifacts
            .get_or_insert_with(Vec::new)
            .push(pattern.to_string());
        self
    }

    pub fn build(self) -> ScopeConfig {
        self.scope
    }
}
