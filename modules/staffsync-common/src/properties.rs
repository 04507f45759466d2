use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Immutable property/class id table for one run.
///
/// The graph assigns opaque ids to the properties and classes this system
/// tracks; which concrete ids those are is deployment configuration, built
/// once at startup and passed explicitly (never ambient globals). The
/// defaults match the reference deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PropertyTable {
    // Properties
    pub instance_of: String,
    pub official_website: String,
    pub retrieved: String,
    pub status_code: String,
    pub point_in_time: String,
    pub reference_url: String,
    pub affiliated_with: String,
    pub employer: String,
    pub occupation: String,
    pub evaluation_manner: String,
    pub email_address: String,
    pub orcid: String,

    // Classes and fixed items
    /// Entities must be an instance of this class to be processed.
    pub human_class: String,
    /// Fixed employer item asserted while a profile lists any affiliation.
    pub employer_item: String,
    /// Marker item linked when the primary title has the research prefix.
    pub research_marker: String,

    /// Title prefix that triggers the evaluation-manner claim.
    pub research_prefix: String,
    /// Description used when a profile carries no titles.
    pub default_description: String,
}

impl Default for PropertyTable {
    fn default() -> Self {
        Self {
            instance_of: "P1".to_string(),
            official_website: "P31".to_string(),
            retrieved: "P139".to_string(),
            status_code: "P141".to_string(),
            point_in_time: "P96".to_string(),
            reference_url: "P70".to_string(),
            affiliated_with: "P106".to_string(),
            employer: "P107".to_string(),
            occupation: "P108".to_string(),
            evaluation_manner: "P142".to_string(),
            email_address: "P109".to_string(),
            orcid: "P110".to_string(),
            human_class: "Q3".to_string(),
            employer_item: "Q44210".to_string(),
            research_marker: "Q159626".to_string(),
            research_prefix: "Research ".to_string(),
            default_description: "staff person".to_string(),
        }
    }
}

impl PropertyTable {
    /// Load overrides from a YAML file; missing keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading property table {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("parsing property table {}", path.display()))
    }
}
