use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version for cached documents. Bump whenever the serialized shape
/// of [`ProfileDocument`] changes so stale cache records read back as a
/// miss instead of corrupting the diff.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Free-text section keys scraped from a profile page, in page order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SectionKey {
    Intro,
    Expertise,
    Experience,
    Education,
    Affiliations,
    Honors,
    Abstracts,
}

impl std::fmt::Display for SectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SectionKey::Intro => write!(f, "intro"),
            SectionKey::Expertise => write!(f, "expertise"),
            SectionKey::Experience => write!(f, "experience"),
            SectionKey::Education => write!(f, "education"),
            SectionKey::Affiliations => write!(f, "affiliations"),
            SectionKey::Honors => write!(f, "honors"),
            SectionKey::Abstracts => write!(f, "abstracts"),
        }
    }
}

/// An organization link scraped from a profile. Duplicates are allowed and
/// page order is preserved; the reconciler consumes these positionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgRef {
    pub name: String,
    pub url: String,
}

/// Normalized representation of one scraped staff-profile page.
///
/// The first three fields are fetch metadata. When `http_status` is not
/// 200 every field below them is empty (the document carries only
/// metadata).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDocument {
    pub source_url: String,
    pub fetched_at: DateTime<Utc>,
    pub http_status: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_qualifier: Option<String>,
    /// First title is authoritative for description/classification.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub titles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub organizations: Vec<OrgRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sections: BTreeMap<SectionKey, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_statement: Option<String>,
}

impl ProfileDocument {
    /// A metadata-only document, used for failed or malformed fetches.
    pub fn empty(source_url: &str, http_status: u16, fetched_at: DateTime<Utc>) -> Self {
        Self {
            source_url: source_url.to_string(),
            fetched_at,
            http_status,
            name: None,
            name_qualifier: None,
            titles: Vec::new(),
            organizations: Vec::new(),
            email: None,
            orcid: None,
            sections: BTreeMap::new(),
            personal_statement: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.http_status == 200
    }
}

/// Structural difference between two documents, ignoring fetch metadata
/// (`fetched_at`, `http_status`, `source_url`).
///
/// Order-sensitive for every sequence field: titles, organizations and
/// section entries are consumed positionally downstream, so a reordering
/// is a real change. Graph writes cost round-trips and audit noise; this
/// predicate is what gates them.
pub fn material_change(old: &ProfileDocument, new: &ProfileDocument) -> bool {
    old.name != new.name
        || old.name_qualifier != new.name_qualifier
        || old.titles != new.titles
        || old.organizations != new.organizations
        || old.email != new.email
        || old.orcid != new.orcid
        || old.sections != new.sections
        || old.personal_statement != new.personal_statement
}

/// Versioned envelope for the talk-page cache. Records with an unknown
/// version read back as a cache miss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub version: u32,
    pub profile: ProfileDocument,
}

impl CacheRecord {
    pub fn new(profile: ProfileDocument) -> Self {
        Self {
            version: CACHE_SCHEMA_VERSION,
            profile,
        }
    }
}
