// src/channel/live.rs

use std::sync::Arc;

use crate::engine::{Coordinator, Disposition};
use crate::event::{ContextId, UnitId};

/// Entry point for runtime redefinition hooks.
///
/// The hook reports a unit that was just (re)defined in a running context,
/// together with its previous bytes when the runtime still had them.
#[derive(Debug, Clone)]
pub struct LiveRedefinitionChannel {
    coordinator: Arc<Coordinator>,
}

impl LiveRedefinitionChannel {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// `unit` may be given in internal form (`com/example/Foo`); it is
    /// normalized to `com.example.Foo`.
    pub fn on_redefine(
        &self,
        context: &ContextId,
        unit: &str,
        old: Option<Vec<u8>>,
        new: Vec<u8>,
    ) -> Disposition {
        let unit = UnitId::from(unit.replace('/', "."));
        self.coordinator
            .ingest_live(context, &unit, old.map(Arc::from), Arc::from(new))
    }
}
