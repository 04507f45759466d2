//! Mapping scraped strings to graph item identifiers.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Resolves scraped organization and title strings to item ids.
///
/// Returning `None` means the string has no known item; the caller skips
/// the claim rather than inventing an entity.
pub trait IdentifierResolver: Send + Sync {
    fn resolve_organization(&self, name: &str, url: &str) -> Option<String>;
    fn resolve_title(&self, title: &str) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct OrgEntry {
    item: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupFile {
    #[serde(default)]
    organizations: Vec<OrgEntry>,
    #[serde(default)]
    titles: HashMap<String, String>,
}

/// Table-backed resolver loaded from a YAML lookup file.
pub struct LookupResolver {
    org_by_url: HashMap<String, String>,
    org_by_name: HashMap<String, String>,
    title_to_item: HashMap<String, String>,
}

impl LookupResolver {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading lookup table {}", path.display()))?;
        let file: LookupFile = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing lookup table {}", path.display()))?;

        let mut org_by_url = HashMap::new();
        let mut org_by_name = HashMap::new();
        for entry in file.organizations {
            if let Some(url) = entry.url {
                org_by_url.insert(url, entry.item.clone());
            }
            if let Some(name) = entry.name {
                org_by_name.insert(name, entry.item);
            }
        }
        Ok(Self {
            org_by_url,
            org_by_name,
            title_to_item: file.titles,
        })
    }
}

impl IdentifierResolver for LookupResolver {
    fn resolve_organization(&self, name: &str, url: &str) -> Option<String> {
        // URLs are more stable than display names, so they win.
        if let Some(item) = self.org_by_url.get(url) {
            return Some(item.clone());
        }
        if let Some(item) = self.org_by_name.get(name) {
            return Some(item.clone());
        }
        debug!(name, url, "organization not in lookup table");
        None
    }

    fn resolve_title(&self, title: &str) -> Option<String> {
        let resolved = self.title_to_item.get(title).cloned();
        if resolved.is_none() {
            debug!(title, "title not in lookup table");
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> LookupResolver {
        let file: LookupFile = serde_yaml::from_str(
            r#"
organizations:
  - item: Q51
    name: Water Resources
    url: https://example.gov/water
  - item: Q52
    name: Climate Hub
titles:
  Hydrologist: Q300
"#,
        )
        .unwrap();
        let mut org_by_url = HashMap::new();
        let mut org_by_name = HashMap::new();
        for entry in file.organizations {
            if let Some(url) = entry.url {
                org_by_url.insert(url, entry.item.clone());
            }
            if let Some(name) = entry.name {
                org_by_name.insert(name, entry.item);
            }
        }
        LookupResolver {
            org_by_url,
            org_by_name,
            title_to_item: file.titles,
        }
    }

    #[test]
    fn url_match_wins_over_name() {
        let r = resolver();
        // Misleading name paired with a known URL resolves by URL.
        assert_eq!(
            r.resolve_organization("Climate Hub", "https://example.gov/water"),
            Some("Q51".to_string())
        );
    }

    #[test]
    fn name_match_is_the_fallback() {
        let r = resolver();
        assert_eq!(
            r.resolve_organization("Climate Hub", "https://example.gov/unknown"),
            Some("Q52".to_string())
        );
        assert_eq!(r.resolve_organization("Nowhere", "https://example.gov/unknown"), None);
    }

    #[test]
    fn titles_resolve_exactly() {
        let r = resolver();
        assert_eq!(r.resolve_title("Hydrologist"), Some("Q300".to_string()));
        assert_eq!(r.resolve_title("hydrologist"), None);
    }
}
