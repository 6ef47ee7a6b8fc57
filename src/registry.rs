// src/registry.rs

//! Which units each owning context has loaded.
//!
//! The live-redefinition channel writes here; the filesystem channel only
//! reads. A file event for a unit its context has already loaded is
//! redundant, because redefinition of that unit is reported by the live
//! channel.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::event::{ContextId, UnitId};

#[derive(Debug, Default)]
struct LoadedUnit {
    /// Last representation seen through the live channel, if any.
    representation: Option<Arc<[u8]>>,
}

type UnitTable = DashMap<UnitId, LoadedUnit>;

/// Concurrent `(context, unit) -> loaded` map.
///
/// Each context gets its own inner table, so writers in different contexts
/// never contend and a teardown drops a whole context in one step.
#[derive(Debug, Default)]
pub struct LoadedUnitRegistry {
    contexts: DashMap<ContextId, Arc<UnitTable>>,
}

impl LoadedUnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, context: &ContextId) -> Arc<UnitTable> {
        if let Some(table) = self.contexts.get(context) {
            return Arc::clone(&table);
        }
        Arc::clone(&self.contexts.entry(context.clone()).or_default())
    }

    /// Mark `unit` as loaded in `context`. Returns true if it was not before.
    pub fn mark_loaded(&self, context: &ContextId, unit: &UnitId) -> bool {
        let table = self.table(context);
        let mut newly = false;
        table.entry(unit.clone()).or_insert_with(|| {
            newly = true;
            LoadedUnit::default()
        });
        if newly {
            debug!(%context, %unit, "unit marked loaded");
        }
        newly
    }

    pub fn is_loaded(&self, context: &ContextId, unit: &UnitId) -> bool {
        self.contexts
            .get(context)
            .is_some_and(|table| table.contains_key(unit))
    }

    /// Store `bytes` as the latest representation of `unit`, returning the
    /// previous one. Also marks the unit loaded.
    pub fn swap_representation(
        &self,
        context: &ContextId,
        unit: &UnitId,
        bytes: Arc<[u8]>,
    ) -> Option<Arc<[u8]>> {
        let table = self.table(context);
        let mut entry = table.entry(unit.clone()).or_default();
        entry.representation.replace(bytes)
    }

    /// Drop everything known about `context`. Returns how many units it had.
    pub fn forget_context(&self, context: &ContextId) -> usize {
        match self.contexts.remove(context) {
            Some((_, table)) => {
                debug!(%context, units = table.len(), "forgot context");
                table.len()
            }
            None => 0,
        }
    }

    pub fn loaded_count(&self, context: &ContextId) -> usize {
        self.contexts.get(context).map_or(0, |table| table.len())
    }
}
