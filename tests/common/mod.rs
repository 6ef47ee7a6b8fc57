#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Duration;

use reloadq::analyze::build_analyzer;
use reloadq::channel::{FileWatchChannel, LiveRedefinitionChannel};
use reloadq::engine::{Coordinator, DebounceWindows, ExecutionReport, Scheduler};
use reloadq::event::{BaseScope, ContextId};
use reloadq::fs::mock::MockFileSystem;
use reloadq::types::{AnalyzerKind, ReconcilePolicy};
use reloadq::watch::ScopeWatchProfile;

pub use reloadq_test_utils::{
    init_tracing, with_timeout, ClassFileBuilder, ConfigFileBuilder, RecordingSink,
    ScopeConfigBuilder,
};

pub const CONTEXT: &str = "app";
pub const SCOPE: &str = "com.example";
pub const ROOT: &str = "/work/classes";

/// Coordinator plus both channels, wired to a recording sink.
pub struct Harness {
    pub coordinator: Arc<Coordinator>,
    pub live: LiveRedefinitionChannel,
    pub files: FileWatchChannel,
    pub fs: MockFileSystem,
    pub sink: RecordingSink,
    pub reports: mpsc::UnboundedReceiver<ExecutionReport>,
}

pub struct HarnessBuilder {
    sink: RecordingSink,
    policy: ReconcilePolicy,
    analyzer: AnalyzerKind,
    windows: DebounceWindows,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            sink: RecordingSink::new(),
            policy: ReconcilePolicy::Always,
            analyzer: AnalyzerKind::ClassShape,
            windows: DebounceWindows::default(),
        }
    }

    pub fn sink(mut self, sink: RecordingSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn policy(mut self, policy: ReconcilePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn analyzer(mut self, analyzer: AnalyzerKind) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn live_window(mut self, window: Duration) -> Self {
        self.windows.live_redefinition = window;
        self
    }

    /// Must be called inside a Tokio runtime.
    pub fn build(self) -> Harness {
        let (tx, reports) = mpsc::unbounded_channel();
        let scheduler =
            Scheduler::new(Arc::new(self.sink.clone()), self.windows, Some(tx)).unwrap();
        let coordinator = Arc::new(Coordinator::new(
            scheduler,
            build_analyzer(self.analyzer),
            self.policy,
        ));
        coordinator.register_scope(ContextId::from(CONTEXT), BaseScope::from(SCOPE));

        let profile = ScopeWatchProfile::new(
            ContextId::from(CONTEXT),
            BaseScope::from(SCOPE),
            vec![ROOT.into()],
            &[],
        )
        .unwrap();
        let fs = MockFileSystem::new();
        let files = FileWatchChannel::new(
            Arc::clone(&coordinator),
            Arc::new(fs.clone()),
            vec![profile],
        );

        Harness {
            live: LiveRedefinitionChannel::new(Arc::clone(&coordinator)),
            coordinator,
            files,
            fs,
            sink: self.sink,
            reports,
        }
    }
}

pub fn harness() -> Harness {
    HarnessBuilder::new().build()
}

pub fn ctx() -> ContextId {
    ContextId::from(CONTEXT)
}

/// Path of the class file for `unit` under the mock root.
pub fn class_path(unit: &str) -> std::path::PathBuf {
    std::path::Path::new(ROOT).join(format!("{}.class", unit.replace('.', "/")))
}

/// Put a class file for `unit` on the mock filesystem and return its path.
pub fn put_class(fs: &MockFileSystem, unit: &str) -> std::path::PathBuf {
    let path = class_path(unit);
    fs.add_file(&path, ClassFileBuilder::new(unit).build());
    path
}
