use std::collections::{BTreeMap, HashSet};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value as Json};
use tracing::{debug, info};

use staffsync_common::error::CommitError;
use staffsync_common::{ChangeSet, Claim, CommitReceipt, GraphEntity, PropertyId, Value};

use crate::client::WikiClient;

/// Entity read and change-set commit operations on the knowledge graph.
///
/// The reconciler builds a [`ChangeSet`] in memory; `commit` is the single
/// point where it is flushed. Claim lists in the change set are
/// replace-all per property: after a successful commit the property's
/// claim set is exactly the submitted list.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn get_entity(&self, id: &str) -> Result<Option<GraphEntity>>;

    async fn commit(
        &self,
        entity: &GraphEntity,
        change: &ChangeSet,
        summary: &str,
    ) -> Result<CommitReceipt, CommitError>;
}

const CALENDAR_GREGORIAN: &str = "http://www.wikidata.org/entity/Q1985727";

/// Live Wikibase-backed store. Owns all wire-format knowledge: statement
/// JSON decode on read, change-set encode (including removals) on commit.
pub struct WikibaseStore {
    client: WikiClient,
    locale: String,
}

impl WikibaseStore {
    pub fn new(client: WikiClient) -> Self {
        Self {
            client,
            locale: "en".to_string(),
        }
    }
}

#[async_trait]
impl GraphStore for WikibaseStore {
    async fn get_entity(&self, id: &str) -> Result<Option<GraphEntity>> {
        let response = self
            .client
            .get(&[("action", "wbgetentities"), ("ids", id)])
            .await?;

        let entity_json = &response["entities"][id];
        if entity_json.is_null() || entity_json.get("missing").is_some() {
            return Ok(None);
        }

        let entity = decode_entity(id, entity_json, &self.locale)
            .with_context(|| format!("decoding entity {id}"))?;
        debug!(entity = id, claims = entity.claims.len(), "Fetched entity");
        Ok(Some(entity))
    }

    async fn commit(
        &self,
        entity: &GraphEntity,
        change: &ChangeSet,
        summary: &str,
    ) -> Result<CommitReceipt, CommitError> {
        let data = encode_change_set(entity, change, &self.locale);
        let data_text = data.to_string();

        let response = self
            .client
            .post(&[
                ("action", "wbeditentity"),
                ("id", &entity.id),
                ("data", &data_text),
                ("summary", summary),
            ])
            .await
            .map_err(|e| CommitError::Transport(e.to_string()))?;

        if let Some(error) = response.get("error") {
            return Err(CommitError::Api {
                code: error["code"].as_str().unwrap_or("unknown").to_string(),
                info: error["info"].as_str().unwrap_or_default().to_string(),
            });
        }

        let revision_id = response["entity"]["lastrevid"].as_u64();
        info!(entity = %entity.id, revision = ?revision_id, "Committed entity");
        Ok(CommitReceipt {
            entity_id: entity.id.clone(),
            revision_id,
        })
    }
}

// --- Decode: entity JSON → GraphEntity ---

fn decode_entity(id: &str, entity: &Json, locale: &str) -> Result<GraphEntity> {
    let label = entity["labels"][locale]["value"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let description = entity["descriptions"][locale]["value"]
        .as_str()
        .map(str::to_string);
    let aliases = entity["aliases"][locale]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|a| a["value"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let mut claims: BTreeMap<PropertyId, Vec<Claim>> = BTreeMap::new();
    if let Some(props) = entity["claims"].as_object() {
        for (prop, statements) in props {
            let list = statements
                .as_array()
                .ok_or_else(|| anyhow!("claims for {prop} is not an array"))?
                .iter()
                .filter_map(decode_statement)
                .collect::<Vec<_>>();
            if !list.is_empty() {
                claims.insert(prop.clone(), list);
            }
        }
    }

    Ok(GraphEntity {
        id: id.to_string(),
        label,
        description,
        aliases,
        claims,
    })
}

/// Decode one statement. Statements whose main snak carries no value
/// (novalue/somevalue) are skipped.
fn decode_statement(statement: &Json) -> Option<Claim> {
    let value = decode_snak(&statement["mainsnak"])?;

    let mut qualifiers = Vec::new();
    if let Some(quals) = statement["qualifiers"].as_object() {
        for (prop, snaks) in quals {
            for snak in snaks.as_array().into_iter().flatten() {
                if let Some(v) = decode_snak(snak) {
                    qualifiers.push((prop.clone(), v));
                }
            }
        }
    }

    let mut references = Vec::new();
    for reference in statement["references"].as_array().into_iter().flatten() {
        if let Some(snak_groups) = reference["snaks"].as_object() {
            for (prop, snaks) in snak_groups {
                for snak in snaks.as_array().into_iter().flatten() {
                    if let Some(v) = decode_snak(snak) {
                        references.push((prop.clone(), v));
                    }
                }
            }
        }
    }

    Some(Claim {
        value,
        qualifiers,
        references,
        statement_id: statement["id"].as_str().map(str::to_string),
    })
}

fn decode_snak(snak: &Json) -> Option<Value> {
    if snak["snaktype"].as_str() != Some("value") {
        return None;
    }
    let datavalue = &snak["datavalue"];
    match datavalue["type"].as_str()? {
        "wikibase-entityid" => Some(Value::ItemRef(
            datavalue["value"]["id"].as_str()?.to_string(),
        )),
        "time" => Some(Value::Time {
            value: datavalue["value"]["time"].as_str()?.to_string(),
            precision: datavalue["value"]["precision"].as_u64().unwrap_or(11) as u8,
        }),
        "string" => {
            let text = datavalue["value"].as_str()?.to_string();
            match snak["datatype"].as_str() {
                Some("url") => Some(Value::Url(text)),
                Some("external-id") => Some(Value::ExternalId(text)),
                _ => Some(Value::Str(text)),
            }
        }
        _ => None,
    }
}

// --- Encode: ChangeSet → wbeditentity data ---

/// Build the `wbeditentity` data payload for a change set.
///
/// For each claim-carrying property: preserved claims (those with a
/// statement id) are re-submitted in place, fresh claims are added, and
/// any existing statement of that property absent from the submitted list
/// is marked for removal. Properties not named in the change set are left
/// untouched.
fn encode_change_set(entity: &GraphEntity, change: &ChangeSet, locale: &str) -> Json {
    let mut data = serde_json::Map::new();

    if let Some(label) = &change.label {
        data.insert(
            "labels".to_string(),
            json!({ locale: { "language": locale, "value": label } }),
        );
    }
    if let Some(description) = &change.description {
        data.insert(
            "descriptions".to_string(),
            json!({ locale: { "language": locale, "value": description } }),
        );
    }
    if let Some(aliases) = &change.aliases {
        let list: Vec<Json> = aliases
            .iter()
            .map(|a| json!({ "language": locale, "value": a }))
            .collect();
        data.insert("aliases".to_string(), json!({ locale: list }));
    }

    let mut statements = Vec::new();
    for (prop, claims) in &change.claims {
        let submitted_ids: HashSet<&str> = claims
            .iter()
            .filter_map(|c| c.statement_id.as_deref())
            .collect();

        for claim in claims {
            statements.push(encode_statement(prop, claim));
        }
        for existing in entity.claims_for(prop) {
            if let Some(id) = existing.statement_id.as_deref() {
                if !submitted_ids.contains(id) {
                    statements.push(json!({ "id": id, "remove": "" }));
                }
            }
        }
    }
    if !statements.is_empty() {
        data.insert("claims".to_string(), Json::Array(statements));
    }

    Json::Object(data)
}

fn encode_statement(prop: &str, claim: &Claim) -> Json {
    let mut statement = serde_json::Map::new();
    statement.insert("mainsnak".to_string(), encode_snak(prop, &claim.value));
    statement.insert("type".to_string(), json!("statement"));
    statement.insert("rank".to_string(), json!("normal"));

    if !claim.qualifiers.is_empty() {
        let mut groups: BTreeMap<&str, Vec<Json>> = BTreeMap::new();
        for (qprop, qvalue) in &claim.qualifiers {
            groups
                .entry(qprop.as_str())
                .or_default()
                .push(encode_snak(qprop, qvalue));
        }
        statement.insert("qualifiers".to_string(), json!(groups));
    }

    if !claim.references.is_empty() {
        let mut groups: BTreeMap<&str, Vec<Json>> = BTreeMap::new();
        for (rprop, rvalue) in &claim.references {
            groups
                .entry(rprop.as_str())
                .or_default()
                .push(encode_snak(rprop, rvalue));
        }
        statement.insert("references".to_string(), json!([{ "snaks": groups }]));
    }

    if let Some(id) = &claim.statement_id {
        statement.insert("id".to_string(), json!(id));
    }

    Json::Object(statement)
}

fn encode_snak(prop: &str, value: &Value) -> Json {
    let (datatype, datavalue) = match value {
        Value::ItemRef(id) => (
            "wikibase-item",
            json!({ "type": "wikibase-entityid",
                    "value": { "entity-type": "item", "id": id } }),
        ),
        Value::Url(url) => ("url", json!({ "type": "string", "value": url })),
        Value::Str(s) => ("string", json!({ "type": "string", "value": s })),
        Value::ExternalId(id) => ("external-id", json!({ "type": "string", "value": id })),
        Value::Time { value, precision } => (
            "time",
            json!({ "type": "time",
                    "value": { "time": value, "timezone": 0, "before": 0, "after": 0,
                               "precision": precision, "calendarmodel": CALENDAR_GREGORIAN } }),
        ),
    };
    json!({
        "snaktype": "value",
        "property": prop,
        "datatype": datatype,
        "datavalue": datavalue,
    })
}
