use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, Semaphore};
use tokio::time::{Duration, Instant};
use reloadq::errors::ReloadqError;
use reloadq::exec::{ReconcileCommand, ReconciliationSink, SinkFuture};

/// One call the sink received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub command: ReconcileCommand,
    pub started_at: Instant,
}

#[derive(Default)]
struct State {
    calls: Mutex<Vec<RecordedCall>>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    gate: Option<Arc<Semaphore>>,
    delay: Option<Duration>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    finished: AtomicUsize,
    changed: Notify,
}

/// A sink that:
/// - records every command it is handed, with the (possibly paused) time
/// - optionally holds each call until a permit is released on its gate
/// - optionally sleeps per call
/// - fails or panics for selected units
/// - tracks how many calls overlap
#[derive(Clone, Default)]
pub struct RecordingSink {
    state: Arc<State>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call waits for one permit of the returned semaphore.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let sink = Self {
            state: Arc::new(State {
                gate: Some(Arc::clone(&gate)),
                ..State::default()
            }),
        };
        (sink, gate)
    }

    /// Every call takes `delay` to complete.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            state: Arc::new(State {
                delay: Some(delay),
                ..State::default()
            }),
        }
    }

    pub fn fail_unit(&self, unit: &str) {
        self.state.failing.lock().unwrap().insert(unit.to_string());
    }

    pub fn panic_unit(&self, unit: &str) {
        self.state.panicking.lock().unwrap().insert(unit.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.calls.lock().unwrap().len()
    }

    /// Units in call order.
    pub fn units(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.command.unit.to_string())
            .collect()
    }

    pub fn finished(&self) -> usize {
        self.state.finished.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.state.max_active.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` calls have started.
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let changed = self.state.changed.notified();
            if self.call_count() >= n {
                return;
            }
            changed.await;
        }
    }

    /// Wait until at least `n` calls have returned.
    pub async fn wait_for_finished(&self, n: usize) {
        loop {
            let changed = self.state.changed.notified();
            if self.finished() >= n {
                return;
            }
            changed.await;
        }
    }
}

impl ReconciliationSink for RecordingSink {
    fn reconcile(&self, command: ReconcileCommand) -> SinkFuture<'_> {
        let state = Arc::clone(&self.state);

        Box::pin(async move {
            let unit = command.unit.to_string();
            {
                let mut calls = state.calls.lock().unwrap();
                calls.push(RecordedCall {
                    command,
                    started_at: Instant::now(),
                });
            }
            let now_active = state.active.fetch_add(1, Ordering::SeqCst) + 1;
            state.max_active.fetch_max(now_active, Ordering::SeqCst);
            state.changed.notify_waiters();

            if let Some(gate) = &state.gate {
                gate.acquire().await.unwrap().forget();
            }
            if let Some(delay) = state.delay {
                tokio::time::sleep(delay).await;
            }

            state.active.fetch_sub(1, Ordering::SeqCst);
            state.finished.fetch_add(1, Ordering::SeqCst);
            state.changed.notify_waiters();

            if state.panicking.lock().unwrap().contains(&unit) {
                panic!("sink panicked for {unit}");
            }
            if state.failing.lock().unwrap().contains(&unit) {
                return Err(ReloadqError::Sink(format!("refused to reload {unit}")));
            }
            Ok(())
        })
    }
}
