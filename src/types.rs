use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which detection channel produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// A running context had a unit redefined in place.
    LiveRedefinition,
    /// A compiled artifact changed on disk.
    FileWatch,
}

impl ChannelKind {
    pub fn label(self) -> &'static str {
        match self {
            ChannelKind::LiveRedefinition => "live",
            ChannelKind::FileWatch => "file",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind of a raw filesystem event, already stripped of platform detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Create,
    Modify,
    Delete,
}

impl FsEventKind {
    /// Only creation and modification can bring new code into a scope.
    pub fn is_relevant(self) -> bool {
        matches!(self, FsEventKind::Create | FsEventKind::Modify)
    }
}

/// How live redefinitions are filtered before they reach the merge queue.
///
/// - `Strict`: redefinitions the analyzer deems insignificant are dropped.
/// - `Always`: every redefinition reconciles; the analyzer verdict is only
///   logged (fail open).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReconcilePolicy {
    Always,
    #[default]
    Strict,
}

impl FromStr for ReconcilePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "always" => Ok(ReconcilePolicy::Always),
            "strict" => Ok(ReconcilePolicy::Strict),
            other => Err(format!(
                "invalid reconcile policy: {other} (expected \"always\" or \"strict\")"
            )),
        }
    }
}

/// Which semantic analyzer to build for live redefinitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AnalyzerKind {
    Always,
    Bytes,
    #[default]
    ClassShape,
}

impl FromStr for AnalyzerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "always" => Ok(AnalyzerKind::Always),
            "bytes" => Ok(AnalyzerKind::Bytes),
            "class-shape" | "class_shape" => Ok(AnalyzerKind::ClassShape),
            other => Err(format!(
                "invalid analyzer: {other} (expected \"always\", \"bytes\" or \"class-shape\")"
            )),
        }
    }
}
