// src/config/model.rs

use serde::Deserialize;
use tokio::time::Duration;

use crate::engine::DebounceWindows;
use crate::types::{AnalyzerKind, ReconcilePolicy};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [debounce]
/// file_watch_ms = 600
/// live_redefinition_ms = 0
///
/// [reconcile]
/// policy = "strict"
/// analyzer = "class-shape"
///
/// [sink]
/// cmd = "echo reload $RELOADQ_UNIT"
///
/// [[scope]]
/// context = "app"
/// base_package = "com.example"
/// roots = ["target/classes"]
/// ```
///
/// Everything except `[[scope]]` is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub debounce: DebounceSection,

    #[serde(default)]
    pub reconcile: ReconcileSection,

    #[serde(default)]
    pub sink: SinkSection,

    #[serde(default)]
    pub scope: Vec<ScopeConfig>,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub debounce: DebounceSection,
    pub reconcile: ReconcileSection,
    pub sink: SinkSection,
    pub scope: Vec<ScopeConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            debounce: raw.debounce,
            reconcile: raw.reconcile,
            sink: raw.sink,
            scope: raw.scope,
        }
    }
}

/// `[debounce]` section, in milliseconds.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DebounceSection {
    #[serde(default = "default_file_watch_ms")]
    pub file_watch_ms: u64,

    #[serde(default)]
    pub live_redefinition_ms: u64,
}

fn default_file_watch_ms() -> u64 {
    DebounceWindows::DEFAULT_FILE_WATCH.as_millis() as u64
}

impl Default for DebounceSection {
    fn default() -> Self {
        Self {
            file_watch_ms: default_file_watch_ms(),
            live_redefinition_ms: 0,
        }
    }
}

impl DebounceSection {
    pub fn windows(&self) -> DebounceWindows {
        DebounceWindows {
            file_watch: Duration::from_millis(self.file_watch_ms),
            live_redefinition: Duration::from_millis(self.live_redefinition_ms),
        }
    }
}

/// `[reconcile]` section.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ReconcileSection {
    #[serde(default)]
    pub policy: ReconcilePolicy,

    #[serde(default)]
    pub analyzer: AnalyzerKind,
}

/// `[sink]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SinkSection {
    /// Shell command run per reconciliation. If `None`, reconciliations are
    /// only logged.
    #[serde(default)]
    pub cmd: Option<String>,
}

/// One `[[scope]]` entry: a base package tracked inside one context.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    pub context: String,

    /// Dotted package name; `""` tracks every unit of the context.
    #[serde(default)]
    pub base_package: String,

    /// Class output directories, relative to the config file.
    pub roots: Vec<String>,

    /// Glob patterns (relative to a root) of artifacts worth watching.
    /// Defaults to `["**/*.class"]`.
    #[serde(default)]
    pub artifacts: Option<Vec<String>>,
}
