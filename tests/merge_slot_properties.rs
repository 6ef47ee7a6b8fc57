// tests/merge_slot_properties.rs

use std::sync::Arc;

use proptest::prelude::*;
use tokio::time::{Duration, Instant};

use reloadq::engine::{FireDecision, IngestOutcome, KeySlot};
use reloadq::event::{ChangeEvent, Payload};
use reloadq::types::ChannelKind;

#[derive(Debug, Clone)]
enum Op {
    /// An event `advance_ms` after the previous step.
    Ingest { advance_ms: u16, live: bool, tag: u8 },
    /// The driver of the pending command wakes up.
    Wake { advance_ms: u16 },
    /// The running execution returns.
    Finish,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..800u16, any::<bool>(), any::<u8>())
            .prop_map(|(advance_ms, live, tag)| Op::Ingest { advance_ms, live, tag }),
        2 => (0..800u16).prop_map(|advance_ms| Op::Wake { advance_ms }),
        1 => Just(Op::Finish),
    ]
}

fn event(live: bool, tag: u8, at: Instant) -> ChangeEvent {
    ChangeEvent {
        source: if live {
            ChannelKind::LiveRedefinition
        } else {
            ChannelKind::FileWatch
        },
        context: "app".into(),
        scope: "com.example".into(),
        unit: "com.example.Foo".into(),
        payload: Payload::Bytes(Arc::from(vec![tag])),
        observed_at: at,
    }
}

fn window(live: bool) -> Duration {
    if live {
        Duration::ZERO
    } else {
        Duration::from_millis(600)
    }
}

proptest! {
    /// Every ingested event ends up in exactly one released or pending
    /// command, a released command always carries the latest payload it saw,
    /// nothing is released before its quiet window elapsed, and no two
    /// executions overlap.
    #[test]
    fn merge_slot_invariants(ops in proptest::collection::vec(op_strategy(), 1..60)) {
        let mut slot = KeySlot::new();
        let mut now = Instant::now();
        let mut ingested: u32 = 0;
        let mut released: u32 = 0;
        let mut running: Option<u64> = None;
        let mut last_generation: Option<u64> = None;
        let mut last_tag: Option<u8> = None;

        for op in ops {
            match op {
                Op::Ingest { advance_ms, live, tag } => {
                    now += Duration::from_millis(advance_ms as u64);
                    let outcome = slot.ingest(event(live, tag, now), now, window(live));
                    ingested += 1;
                    last_tag = Some(tag);
                    match outcome {
                        IngestOutcome::Successor { .. } => prop_assert!(running.is_some()),
                        IngestOutcome::Created { .. } => prop_assert!(running.is_none()),
                        IngestOutcome::Merged { merged, .. } => prop_assert!(merged >= 2),
                    }
                    prop_assert_eq!(
                        slot.pending().map(|p| p.scheduled_fire_time),
                        Some(now + window(live))
                    );
                }
                Op::Wake { advance_ms } => {
                    now += Duration::from_millis(advance_ms as u64);
                    let Some((generation, fire_at)) =
                        slot.pending().map(|p| (p.generation, p.scheduled_fire_time))
                    else {
                        continue;
                    };
                    match slot.poll(generation, now) {
                        FireDecision::Release(cmd) => {
                            prop_assert!(now >= fire_at);
                            prop_assert!(running.is_none(), "overlapping executions");
                            if let Some(prev) = last_generation {
                                prop_assert!(cmd.generation > prev);
                            }
                            prop_assert_eq!(cmd.latest_payload.bytes(), last_tag.as_ref().map(std::slice::from_ref));
                            released += cmd.merged;
                            last_generation = Some(cmd.generation);
                            running = Some(cmd.generation);
                        }
                        FireDecision::Wait(at) => prop_assert!(now < at),
                        FireDecision::Blocked => prop_assert!(running.is_some()),
                        FireDecision::Stale => prop_assert!(false, "pending command reported stale"),
                    }
                }
                Op::Finish => {
                    if let Some(generation) = running.take() {
                        let done = slot.complete(generation);
                        prop_assert!(!done.detached);
                        if let Some((g, _)) = done.resume {
                            prop_assert_eq!(slot.pending().map(|p| p.generation), Some(g));
                        }
                    }
                }
            }

            prop_assert_eq!(slot.in_flight(), running);
            let pending = slot.pending().map_or(0, |p| p.merged);
            prop_assert_eq!(released + pending, ingested);
        }
    }
}
