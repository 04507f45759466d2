use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use staffsync_common::{CacheRecord, ProfileDocument, CACHE_SCHEMA_VERSION};

use crate::client::WikiClient;

/// Per-entity baseline storage for change detection.
///
/// Holds the last profile document written to the graph, keyed by entity
/// id. Absent means "never synchronized". Records are replaced whole and
/// never deleted by this subsystem.
#[async_trait]
pub trait SideCache: Send + Sync {
    async fn get(&self, entity_id: &str) -> Result<Option<ProfileDocument>>;
    async fn put(&self, entity_id: &str, doc: &ProfileDocument, summary: &str) -> Result<()>;
}

/// Talk-page backed cache: the baseline document lives as versioned YAML
/// on `Item_talk:{id}`. Unparseable or stale-schema pages read back as a
/// miss rather than feeding garbage into the diff.
pub struct TalkPageCache {
    client: WikiClient,
}

impl TalkPageCache {
    pub fn new(client: WikiClient) -> Self {
        Self { client }
    }

    fn page_title(entity_id: &str) -> String {
        format!("Item_talk:{entity_id}")
    }
}

#[async_trait]
impl SideCache for TalkPageCache {
    async fn get(&self, entity_id: &str) -> Result<Option<ProfileDocument>> {
        let title = Self::page_title(entity_id);
        let response = self
            .client
            .get(&[
                ("action", "query"),
                ("prop", "revisions"),
                ("titles", &title),
                ("rvprop", "content"),
                ("rvslots", "main"),
                ("formatversion", "2"),
            ])
            .await
            .with_context(|| format!("reading cache page {title}"))?;

        let page = &response["query"]["pages"][0];
        if page.get("missing").is_some() {
            return Ok(None);
        }
        let text = match page["revisions"][0]["slots"]["main"]["content"].as_str() {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Ok(None),
        };

        let record: CacheRecord = match serde_yaml::from_str(text) {
            Ok(record) => record,
            Err(e) => {
                warn!(entity = entity_id, error = %e, "Unparseable cache page, treating as miss");
                return Ok(None);
            }
        };
        if record.version != CACHE_SCHEMA_VERSION {
            warn!(
                entity = entity_id,
                version = record.version,
                "Stale cache schema, treating as miss"
            );
            return Ok(None);
        }
        Ok(Some(record.profile))
    }

    async fn put(&self, entity_id: &str, doc: &ProfileDocument, summary: &str) -> Result<()> {
        let title = Self::page_title(entity_id);
        let text = serde_yaml::to_string(&CacheRecord::new(doc.clone()))
            .context("serializing cache record")?;

        let response = self
            .client
            .post(&[
                ("action", "edit"),
                ("title", &title),
                ("text", &text),
                ("summary", summary),
            ])
            .await
            .with_context(|| format!("writing cache page {title}"))?;

        if let Some(error) = response.get("error") {
            bail!(
                "cache page edit rejected: {}",
                error["info"].as_str().unwrap_or("unknown")
            );
        }
        info!(entity = entity_id, "Updated cached profile baseline");
        Ok(())
    }
}
