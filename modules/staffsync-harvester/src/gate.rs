//! Write suppression via the cached baseline document.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use staffsync_common::{material_change, ProfileDocument};
use staffsync_graph::SideCache;

/// Outcome of comparing a fresh document against the cached baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// No baseline exists; the entity has never been synchronized.
    FirstSync,
    /// Only fetch metadata differs; skip the graph write.
    Unchanged,
    /// At least one material field differs.
    Changed,
}

pub struct ChangeGate {
    cache: Arc<dyn SideCache>,
}

impl ChangeGate {
    pub fn new(cache: Arc<dyn SideCache>) -> Self {
        Self { cache }
    }

    pub async fn check(&self, entity_id: &str, fresh: &ProfileDocument) -> Result<GateDecision> {
        let decision = match self.cache.get(entity_id).await? {
            None => GateDecision::FirstSync,
            Some(baseline) if material_change(&baseline, fresh) => GateDecision::Changed,
            Some(_) => GateDecision::Unchanged,
        };
        debug!(entity_id, ?decision, "change gate");
        Ok(decision)
    }

    /// Persist `doc` as the new baseline, replacing any prior record whole.
    pub async fn store(
        &self,
        entity_id: &str,
        doc: &ProfileDocument,
        summary: &str,
    ) -> Result<()> {
        self.cache.put(entity_id, doc, summary).await
    }
}
