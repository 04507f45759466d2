use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::SyncError;

// --- Claim value model ---

/// Wikibase datatype identifiers for properties we write.
pub type PropertyId = String;

/// A typed claim value. Mirrors the Wikibase snak datatypes this system
/// actually writes: item links, URLs, plain strings, external identifiers,
/// and day-precision timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Link to another entity by its opaque id (e.g. "Q44210").
    ItemRef(String),
    Url(String),
    Str(String),
    ExternalId(String),
    /// Wikibase time string, e.g. "+2024-03-01T00:00:00Z" with precision 11 (day).
    Time { value: String, precision: u8 },
}

impl Value {
    /// Convert a timestamp to a day-precision Wikibase time value
    /// (truncated to midnight UTC).
    pub fn day(ts: DateTime<Utc>) -> Self {
        Value::Time {
            value: format!("+{}", ts.format("%Y-%m-%dT00:00:00Z")),
            precision: 11,
        }
    }

    /// The item id if this value is an entity link.
    pub fn item_id(&self) -> Option<&str> {
        match self {
            Value::ItemRef(id) => Some(id),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::ItemRef(id) => write!(f, "{id}"),
            Value::Url(u) => write!(f, "{u}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::ExternalId(id) => write!(f, "{id}"),
            Value::Time { value, .. } => write!(f, "{value}"),
        }
    }
}

/// A (property, value) assertion with optional qualifiers and references.
///
/// `statement_id` carries the server-side statement id for claims read from
/// the graph; claims built fresh by the reconciler leave it `None`. The
/// store uses it to update preserved claims in place instead of duplicating
/// them.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    pub value: Value,
    pub qualifiers: Vec<(PropertyId, Value)>,
    pub references: Vec<(PropertyId, Value)>,
    pub statement_id: Option<String>,
}

impl Claim {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            qualifiers: Vec::new(),
            references: Vec::new(),
            statement_id: None,
        }
    }

    pub fn with_qualifier(mut self, prop: &str, value: Value) -> Self {
        self.qualifiers.push((prop.to_string(), value));
        self
    }

    pub fn with_reference(mut self, prop: &str, value: Value) -> Self {
        self.references.push((prop.to_string(), value));
        self
    }

    /// Look up the first qualifier value for a property.
    pub fn qualifier(&self, prop: &str) -> Option<&Value> {
        self.qualifiers
            .iter()
            .find(|(p, _)| p == prop)
            .map(|(_, v)| v)
    }
}

// --- Entity ---

/// A knowledge-graph entity as read from the store. Labels, descriptions
/// and aliases are scoped to the single configured locale.
#[derive(Debug, Clone, Default)]
pub struct GraphEntity {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub aliases: Vec<String>,
    pub claims: BTreeMap<PropertyId, Vec<Claim>>,
}

impl GraphEntity {
    pub fn claims_for(&self, prop: &str) -> &[Claim] {
        self.claims.get(prop).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any claim on `prop` links to the given item id.
    pub fn has_item_claim(&self, prop: &str, item_id: &str) -> bool {
        self.claims_for(prop)
            .iter()
            .any(|c| c.value.item_id() == Some(item_id))
    }
}

// --- Change set ---

/// The full set of edits the reconciler wants applied to one entity.
///
/// Built up in memory and applied atomically by the store at commit time,
/// so "what changed" is inspectable and testable without network I/O.
/// Claim lists are replace-all per property key: the committed claim set
/// for a listed property becomes exactly the listed claims.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub label: Option<String>,
    pub description: Option<String>,
    /// Full replacement alias list, when the displaced label is archived.
    pub aliases: Option<Vec<String>>,
    pub claims: BTreeMap<PropertyId, Vec<Claim>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.description.is_none()
            && self.aliases.is_none()
            && self.claims.is_empty()
    }

    pub fn set_claims(&mut self, prop: &str, claims: Vec<Claim>) {
        self.claims.insert(prop.to_string(), claims);
    }
}

/// Receipt returned by a successful entity commit.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    pub entity_id: String,
    pub revision_id: Option<u64>,
}

// --- Batch run reporting ---

/// Terminal status of one entity pipeline.
#[derive(Debug)]
pub enum SyncStatus {
    /// Entity committed to the graph.
    Written { revision_id: Option<u64> },
    /// Cache showed no material change; graph write suppressed.
    Unchanged,
    /// Pipeline short-circuited at some stage.
    Failed(SyncError),
}

#[derive(Debug)]
pub struct SyncOutcome {
    pub entity_id: String,
    pub status: SyncStatus,
}

/// Aggregated results of a batch run.
#[derive(Debug, Default)]
pub struct HarvestStats {
    pub processed: usize,
    pub written: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub failures: Vec<(String, SyncError)>,
}

impl HarvestStats {
    pub fn record(&mut self, outcome: SyncOutcome) {
        self.processed += 1;
        match outcome.status {
            SyncStatus::Written { .. } => self.written += 1,
            SyncStatus::Unchanged => self.unchanged += 1,
            SyncStatus::Failed(err) => {
                self.failed += 1;
                self.failures.push((outcome.entity_id, err));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn day_value_truncates_to_midnight() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 14, 22, 9).single().unwrap();
        assert_eq!(
            Value::day(ts),
            Value::Time {
                value: "+2024-03-01T00:00:00Z".to_string(),
                precision: 11,
            }
        );
    }

    #[test]
    fn change_set_emptiness() {
        let mut change = ChangeSet::default();
        assert!(change.is_empty());
        change.set_claims("P1", vec![Claim::new(Value::ItemRef("Q3".into()))]);
        assert!(!change.is_empty());
    }

    #[test]
    fn has_item_claim_matches_by_id() {
        let mut entity = GraphEntity {
            id: "Q77".into(),
            ..Default::default()
        };
        entity
            .claims
            .insert("P1".into(), vec![Claim::new(Value::ItemRef("Q3".into()))]);
        assert!(entity.has_item_claim("P1", "Q3"));
        assert!(!entity.has_item_claim("P1", "Q4"));
        assert!(!entity.has_item_claim("P2", "Q3"));
    }
}
