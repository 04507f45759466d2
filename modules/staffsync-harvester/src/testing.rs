//! Test doubles for the collaborator seams.
//!
//! Builder-style mocks: seed them with canned entities, profiles and
//! lookup rows, run the pipeline, then assert on the recorded calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use staffsync_common::{
    Claim, ChangeSet, CommitError, CommitReceipt, GraphEntity, ProfileDocument, PropertyTable,
    Value,
};
use staffsync_graph::{GraphStore, SideCache};

use crate::fetcher::ProfileFetcher;
use crate::resolver::IdentifierResolver;

pub fn test_props() -> PropertyTable {
    PropertyTable::default()
}

pub fn test_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().unwrap()
}

/// A successful profile document with only a name filled in.
pub fn profile_doc(name: &str) -> ProfileDocument {
    let mut doc = ProfileDocument::empty(
        "https://example.gov/staff-profiles/jdoe",
        200,
        test_timestamp(),
    );
    doc.name = Some(name.to_string());
    doc
}

/// A human entity whose website claim points at `profile_url`.
pub fn human_entity(id: &str, label: &str, profile_url: &str) -> GraphEntity {
    let props = test_props();
    let mut entity = GraphEntity {
        id: id.to_string(),
        label: label.to_string(),
        ..Default::default()
    };
    entity.claims.insert(
        props.instance_of,
        vec![Claim::new(Value::ItemRef(props.human_class))],
    );
    entity.claims.insert(
        props.official_website,
        vec![Claim::new(Value::Url(profile_url.to_string()))],
    );
    entity
}

// --- ProfileFetcher ---

#[derive(Default)]
pub struct MockProfileFetcher {
    responses: HashMap<String, ProfileDocument>,
    fetches: AtomicUsize,
}

impl MockProfileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_profile(mut self, url: &str, doc: ProfileDocument) -> Self {
        self.responses.insert(url.to_string(), doc);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileFetcher for MockProfileFetcher {
    async fn fetch(&self, url: &str) -> Result<ProfileDocument> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(url) {
            Some(doc) => Ok(doc.clone()),
            None => Ok(ProfileDocument::empty(url, 404, test_timestamp())),
        }
    }
}

// --- GraphStore ---

#[derive(Default)]
struct StoreInner {
    entities: HashMap<String, GraphEntity>,
    commits: Vec<(String, ChangeSet, String)>,
    fail_on_commit: bool,
}

/// In-memory store. Commits apply the change set to the stored entity so
/// a second pipeline run reads back the post-commit claim state.
#[derive(Default)]
pub struct MockGraphStore {
    inner: Mutex<StoreInner>,
}

impl MockGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(self, entity: GraphEntity) -> Self {
        self.inner
            .lock()
            .unwrap()
            .entities
            .insert(entity.id.clone(), entity);
        self
    }

    pub fn failing_commits(self) -> Self {
        self.inner.lock().unwrap().fail_on_commit = true;
        self
    }

    pub fn commit_count(&self) -> usize {
        self.inner.lock().unwrap().commits.len()
    }

    pub fn last_change(&self, entity_id: &str) -> Option<ChangeSet> {
        self.inner
            .lock()
            .unwrap()
            .commits
            .iter()
            .rev()
            .find(|(id, _, _)| id == entity_id)
            .map(|(_, change, _)| change.clone())
    }

    pub fn entity(&self, id: &str) -> Option<GraphEntity> {
        self.inner.lock().unwrap().entities.get(id).cloned()
    }

    pub fn claims_for(&self, entity_id: &str, prop: &str) -> Vec<Claim> {
        self.entity(entity_id)
            .map(|e| e.claims_for(prop).to_vec())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GraphStore for MockGraphStore {
    async fn get_entity(&self, id: &str) -> Result<Option<GraphEntity>> {
        Ok(self.inner.lock().unwrap().entities.get(id).cloned())
    }

    async fn commit(
        &self,
        entity: &GraphEntity,
        change: &ChangeSet,
        summary: &str,
    ) -> Result<CommitReceipt, CommitError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_on_commit {
            return Err(CommitError::Transport("mock commit failure".to_string()));
        }
        let stored = inner
            .entities
            .entry(entity.id.clone())
            .or_insert_with(|| entity.clone());
        if let Some(label) = &change.label {
            stored.label = label.clone();
        }
        if let Some(description) = &change.description {
            stored.description = Some(description.clone());
        }
        if let Some(aliases) = &change.aliases {
            stored.aliases = aliases.clone();
        }
        for (prop, claims) in &change.claims {
            stored.claims.insert(prop.clone(), claims.clone());
        }
        let revision = inner.commits.len() as u64 + 1;
        inner
            .commits
            .push((entity.id.clone(), change.clone(), summary.to_string()));
        Ok(CommitReceipt {
            entity_id: entity.id.clone(),
            revision_id: Some(revision),
        })
    }
}

// --- SideCache ---

#[derive(Default)]
pub struct MockSideCache {
    records: Mutex<HashMap<String, ProfileDocument>>,
    puts: Mutex<Vec<String>>,
    fail_on_get: bool,
}

impl MockSideCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cached(self, entity_id: &str, doc: ProfileDocument) -> Self {
        self.records
            .lock()
            .unwrap()
            .insert(entity_id.to_string(), doc);
        self
    }

    pub fn failing_gets(mut self) -> Self {
        self.fail_on_get = true;
        self
    }

    pub fn put_count(&self) -> usize {
        self.puts.lock().unwrap().len()
    }

    pub fn cached(&self, entity_id: &str) -> Option<ProfileDocument> {
        self.records.lock().unwrap().get(entity_id).cloned()
    }
}

#[async_trait]
impl SideCache for MockSideCache {
    async fn get(&self, entity_id: &str) -> Result<Option<ProfileDocument>> {
        if self.fail_on_get {
            return Err(anyhow!("mock cache read failure"));
        }
        Ok(self.records.lock().unwrap().get(entity_id).cloned())
    }

    async fn put(&self, entity_id: &str, doc: &ProfileDocument, _summary: &str) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .insert(entity_id.to_string(), doc.clone());
        self.puts.lock().unwrap().push(entity_id.to_string());
        Ok(())
    }
}

// --- IdentifierResolver ---

#[derive(Default)]
pub struct MockResolver {
    org_by_url: HashMap<String, String>,
    org_by_name: HashMap<String, String>,
    titles: HashMap<String, String>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_org_url(mut self, url: &str, item: &str) -> Self {
        self.org_by_url.insert(url.to_string(), item.to_string());
        self
    }

    pub fn on_org_name(mut self, name: &str, item: &str) -> Self {
        self.org_by_name.insert(name.to_string(), item.to_string());
        self
    }

    pub fn on_title(mut self, title: &str, item: &str) -> Self {
        self.titles.insert(title.to_string(), item.to_string());
        self
    }
}

impl IdentifierResolver for MockResolver {
    fn resolve_organization(&self, name: &str, url: &str) -> Option<String> {
        self.org_by_url
            .get(url)
            .or_else(|| self.org_by_name.get(name))
            .cloned()
    }

    fn resolve_title(&self, title: &str) -> Option<String> {
        self.titles.get(title).cloned()
    }
}
