//! Per-entity sync pipeline and batch driver.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{error, info, warn};

use staffsync_common::{
    HarvestStats, PropertyTable, SyncError, SyncOutcome, SyncStatus,
};
use staffsync_graph::{GraphStore, SideCache};

use crate::fetcher::ProfileFetcher;
use crate::gate::{ChangeGate, GateDecision};
use crate::reconciler::{latest_profile_url, ClaimReconciler};
use crate::resolver::IdentifierResolver;

/// Shared collaborators wired once at startup.
#[derive(Clone)]
pub struct SyncDeps {
    pub store: Arc<dyn GraphStore>,
    pub fetcher: Arc<dyn ProfileFetcher>,
    pub resolver: Arc<dyn IdentifierResolver>,
    pub cache: Arc<dyn SideCache>,
    pub props: Arc<PropertyTable>,
}

/// Drives one entity through fetch, reconcile, cache and commit.
///
/// Each entity's pipeline is sequential and touches only that entity's
/// claims and cache record, so batches run entities concurrently with no
/// coordination.
pub struct SyncOrchestrator {
    deps: SyncDeps,
}

impl SyncOrchestrator {
    pub fn new(deps: SyncDeps) -> Self {
        Self { deps }
    }

    /// Process one entity to a terminal status. Never panics on a bad
    /// entity; every short-circuit becomes a reported failure.
    pub async fn process(&self, entity_id: &str) -> SyncOutcome {
        let status = match self.run_pipeline(entity_id).await {
            Ok(status) => status,
            Err(err) => {
                warn!(entity_id, stage = err.stage(), error = %err, "sync failed");
                SyncStatus::Failed(err)
            }
        };
        SyncOutcome {
            entity_id: entity_id.to_string(),
            status,
        }
    }

    async fn run_pipeline(&self, entity_id: &str) -> Result<SyncStatus, SyncError> {
        let deps = &self.deps;

        let entity = deps
            .store
            .get_entity(entity_id)
            .await?
            .ok_or(SyncError::EntityNotFound)?;

        let reconciler = ClaimReconciler::new(&deps.props, deps.resolver.as_ref());
        if !reconciler.is_human(&entity) {
            return Err(SyncError::NotHumanEntity);
        }

        let url = latest_profile_url(&entity, &deps.props).ok_or(SyncError::NoProfileUrl)?;

        let doc = deps.fetcher.fetch(&url).await?;
        if !doc.is_success() {
            return Err(SyncError::FetchFailure(doc.http_status));
        }
        if doc.name.is_none() {
            return Err(SyncError::MalformedPage);
        }

        let gate = ChangeGate::new(deps.cache.clone());
        let decision = gate.check(entity_id, &doc).await?;
        if decision == GateDecision::Unchanged {
            info!(entity_id, %url, "no material change, write suppressed");
            return Ok(SyncStatus::Unchanged);
        }

        let change = reconciler.reconcile(&entity, &doc);

        // Baseline first, then commit. A commit failure after this point
        // leaves the cache ahead of the graph until the profile next
        // changes; see the failure taxonomy notes in DESIGN.md.
        gate.store(
            entity_id,
            &doc,
            "Updated cached staff profile source information",
        )
        .await?;
        match decision {
            GateDecision::FirstSync => info!(entity_id, "cached baseline created"),
            _ => info!(entity_id, "cached baseline refreshed"),
        }

        if change.is_empty() {
            info!(entity_id, %url, "profile changed but no claim edits derived");
            return Ok(SyncStatus::Unchanged);
        }

        let receipt = deps
            .store
            .commit(
                &entity,
                &change,
                "Updated person item from staff profile source information",
            )
            .await
            .map_err(|err| SyncError::CommitFailure(err.to_string()))?;
        info!(
            entity_id,
            %url,
            revision = receipt.revision_id,
            properties = change.claims.len(),
            "entity committed"
        );
        Ok(SyncStatus::Written {
            revision_id: receipt.revision_id,
        })
    }

    /// Run a batch of entity ids with bounded concurrency.
    pub async fn run(&self, entity_ids: &[String], max_concurrent: usize) -> HarvestStats {
        let max_concurrent = max_concurrent.max(1);
        let mut stats = HarvestStats::default();
        let mut outcomes = futures::stream::iter(entity_ids)
            .map(|id| self.process(id))
            .buffer_unordered(max_concurrent);
        while let Some(outcome) = outcomes.next().await {
            stats.record(outcome);
        }
        for (entity_id, err) in &stats.failures {
            error!(%entity_id, stage = err.stage(), error = %err, "entity not synchronized");
        }
        info!(
            processed = stats.processed,
            written = stats.written,
            unchanged = stats.unchanged,
            failed = stats.failed,
            "harvest run complete"
        );
        stats
    }
}
