//! Profile-to-claims reconciliation.
//!
//! Maps a freshly scraped [`ProfileDocument`] onto an entity's current
//! claims and produces the [`ChangeSet`] to commit. Tracked properties use
//! a replace-all merge: newly derived values are asserted fresh while
//! existing claims carrying other values are preserved and resubmitted, so
//! historical data (a prior employer, an old profile URL) survives every
//! sync cycle.

use tracing::debug;

use staffsync_common::{
    Claim, ChangeSet, GraphEntity, ProfileDocument, PropertyTable, Value,
};

use crate::resolver::IdentifierResolver;

pub struct ClaimReconciler<'a> {
    props: &'a PropertyTable,
    resolver: &'a dyn IdentifierResolver,
}

impl<'a> ClaimReconciler<'a> {
    pub fn new(props: &'a PropertyTable, resolver: &'a dyn IdentifierResolver) -> Self {
        Self { props, resolver }
    }

    /// Whether the entity's instance-of claims include the human class.
    pub fn is_human(&self, entity: &GraphEntity) -> bool {
        entity.has_item_claim(&self.props.instance_of, &self.props.human_class)
    }

    /// Compute the edits needed to bring `entity` in line with `doc`.
    ///
    /// An empty change set means the graph already reflects the profile.
    pub fn reconcile(&self, entity: &GraphEntity, doc: &ProfileDocument) -> ChangeSet {
        let mut change = ChangeSet::default();
        let props = self.props;

        self.reconcile_label(entity, doc, &mut change);

        let description = doc
            .titles
            .first()
            .cloned()
            .unwrap_or_else(|| props.default_description.clone());
        if entity.description.as_deref() != Some(description.as_str()) {
            change.description = Some(description);
        }

        // Official website: the fetched URL with retrieval qualifiers.
        let website = Claim::new(Value::Url(doc.source_url.clone()))
            .with_qualifier(&props.retrieved, Value::day(doc.fetched_at))
            .with_qualifier(&props.status_code, Value::Str(doc.http_status.to_string()));
        self.merge_replace_all(entity, &props.official_website, vec![website], &mut change);

        // Affiliations: one claim per resolved organization.
        let org_ids = dedupe(doc.organizations.iter().filter_map(|org| {
            let resolved = self.resolver.resolve_organization(&org.name, &org.url);
            if resolved.is_none() {
                debug!(entity = %entity.id, org = %org.name, "unresolved organization dropped");
            }
            resolved
        }));
        let affiliations: Vec<Claim> = org_ids
            .iter()
            .map(|id| self.sourced_item_claim(id, doc))
            .collect();
        let any_affiliation = !affiliations.is_empty();
        self.merge_replace_all(entity, &props.affiliated_with, affiliations, &mut change);

        // Employer: fixed organizational item while any affiliation holds.
        if any_affiliation {
            let employer = self.sourced_item_claim(&props.employer_item, doc);
            self.merge_replace_all(entity, &props.employer, vec![employer], &mut change);
        }

        // Occupations from resolved titles, merged against the occupation
        // claim list itself.
        let title_ids = dedupe(doc.titles.iter().filter_map(|title| {
            let resolved = self.resolver.resolve_title(title);
            if resolved.is_none() {
                debug!(entity = %entity.id, title = %title, "unresolved title dropped");
            }
            resolved
        }));
        let occupations: Vec<Claim> = title_ids
            .iter()
            .map(|id| self.sourced_item_claim(id, doc))
            .collect();
        self.merge_replace_all(entity, &props.occupation, occupations, &mut change);

        // Research marker is additive only, asserted once.
        if doc
            .titles
            .first()
            .is_some_and(|t| t.starts_with(&props.research_prefix))
            && !entity.has_item_claim(&props.evaluation_manner, &props.research_marker)
        {
            let mut claims = entity.claims_for(&props.evaluation_manner).to_vec();
            claims.push(self.sourced_item_claim(&props.research_marker, doc));
            change.set_claims(&props.evaluation_manner, claims);
        }

        if let Some(email) = &doc.email {
            let claim = Claim::new(Value::Url(format!("mailto:{email}")))
                .with_qualifier(&props.point_in_time, Value::day(doc.fetched_at))
                .with_reference(&props.reference_url, Value::Url(doc.source_url.clone()));
            self.merge_replace_all(entity, &props.email_address, vec![claim], &mut change);
        }

        if let Some(orcid) = &doc.orcid {
            let claim = Claim::new(Value::ExternalId(orcid.clone()))
                .with_qualifier(&props.point_in_time, Value::day(doc.fetched_at))
                .with_reference(&props.reference_url, Value::Url(doc.source_url.clone()));
            self.merge_replace_all(entity, &props.orcid, vec![claim], &mut change);
        }

        change
    }

    fn reconcile_label(&self, entity: &GraphEntity, doc: &ProfileDocument, change: &mut ChangeSet) {
        let Some(name) = &doc.name else { return };
        if &entity.label == name {
            return;
        }
        change.label = Some(name.clone());
        // A displaced label stays findable as an alias.
        if !entity.label.is_empty() && !entity.aliases.iter().any(|a| a == &entity.label) {
            let mut aliases = entity.aliases.clone();
            aliases.push(entity.label.clone());
            change.aliases = Some(aliases);
        }
    }

    /// An item claim qualified with the fetch date and referencing the page.
    fn sourced_item_claim(&self, item_id: &str, doc: &ProfileDocument) -> Claim {
        Claim::new(Value::ItemRef(item_id.to_string()))
            .with_qualifier(&self.props.point_in_time, Value::day(doc.fetched_at))
            .with_reference(&self.props.reference_url, Value::Url(doc.source_url.clone()))
    }

    /// Replace-all merge for one tracked property.
    ///
    /// The submitted claim set becomes `fresh ∪ {existing claims whose value
    /// is not in fresh}`. Fresh claims matching an existing value inherit its
    /// statement id so the store updates the statement in place. An empty
    /// fresh set submits nothing, leaving the property untouched.
    fn merge_replace_all(
        &self,
        entity: &GraphEntity,
        prop: &str,
        mut fresh: Vec<Claim>,
        change: &mut ChangeSet,
    ) {
        if fresh.is_empty() {
            return;
        }
        let existing = entity.claims_for(prop);
        for claim in &mut fresh {
            if let Some(prior) = existing.iter().find(|c| c.value == claim.value) {
                claim.statement_id = prior.statement_id.clone();
            }
        }
        let fresh_values: Vec<Value> = fresh.iter().map(|c| c.value.clone()).collect();
        for prior in existing {
            if !fresh_values.contains(&prior.value) {
                fresh.push(prior.clone());
            }
        }
        change.set_claims(prop, fresh);
    }
}

/// Select the profile URL from an entity's website claims.
///
/// A single claim is taken as-is. With several, the claim whose retrieved
/// qualifier is most recent wins; claims lacking that qualifier are not
/// considered at all.
pub fn latest_profile_url(entity: &GraphEntity, props: &PropertyTable) -> Option<String> {
    let claims = entity.claims_for(&props.official_website);
    match claims {
        [] => None,
        [only] => match &only.value {
            Value::Url(url) => Some(url.clone()),
            _ => None,
        },
        many => many
            .iter()
            .filter_map(|claim| {
                let Value::Url(url) = &claim.value else {
                    return None;
                };
                match claim.qualifier(&props.retrieved) {
                    // "+YYYY-MM-DD..." strings order correctly as text.
                    Some(Value::Time { value, .. }) => Some((value.clone(), url.clone())),
                    _ => None,
                }
            })
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, url)| url),
    }
}

fn dedupe(ids: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = Vec::new();
    for id in ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}
