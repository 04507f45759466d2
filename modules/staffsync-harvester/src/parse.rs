//! HTML → ProfileDocument extraction for staff-profile pages.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use unicode_normalization::UnicodeNormalization;

use staffsync_common::{OrgRef, ProfileDocument, SectionKey};

static QUALIFIER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((.*?)\)").unwrap());

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).expect("valid selector")
}

/// NFKD-normalize and trim scraped text.
fn clean(text: &str) -> String {
    text.nfkd().collect::<String>().trim().to_string()
}

fn element_text(element: ElementRef<'_>) -> String {
    clean(&element.text().collect::<String>())
}

/// Split a heading into name and parenthesized qualifier.
///
/// `"Jane Doe (she/her)"` → `("Jane Doe", Some("she/her"))`;
/// a heading without a trailing parenthesized suffix is all name.
pub fn split_name_qualifier(heading: &str) -> (String, Option<String>) {
    let heading = heading.trim();
    if heading.ends_with(')') {
        if let Some(captures) = QUALIFIER_RE.captures(heading) {
            let name = heading
                .split('(')
                .next()
                .unwrap_or(heading)
                .trim()
                .to_string();
            return (name, Some(captures[1].to_string()));
        }
    }
    (heading.to_string(), None)
}

/// Parse a fetched profile page into a document.
///
/// Returns a metadata-only document (no name) when the page lacks the
/// primary heading; the caller classifies that as a malformed page.
pub fn parse_profile(
    source_url: &str,
    http_status: u16,
    fetched_at: DateTime<Utc>,
    html: &str,
) -> ProfileDocument {
    let mut doc = ProfileDocument::empty(source_url, http_status, fetched_at);
    let page = Html::parse_document(html);

    let heading = match page.select(&sel("h1")).next() {
        Some(h1) => element_text(h1),
        None => return doc,
    };
    let (name, qualifier) = split_name_qualifier(&heading);
    doc.name = Some(name);
    doc.name_qualifier = qualifier;

    // Primary then additional org containers, preserving page order.
    for container_class in ["div.field-org-primary", "div.field-org-additional"] {
        for container in page.select(&sel(container_class)) {
            for microsite in container.select(&sel("div.field-microsite")) {
                for link in microsite.select(&sel("a")) {
                    let Some(href) = link.value().attr("href") else {
                        continue;
                    };
                    doc.organizations.push(OrgRef {
                        name: element_text(link),
                        url: absolutize(source_url, href),
                    });
                }
            }
            for title in container.select(&sel("div.field-title")) {
                doc.titles.push(element_text(title));
            }
        }
    }

    if let Some(email) = page.select(&sel("div.field-email")).next() {
        doc.email = Some(element_text(email));
    }
    if let Some(orcid) = page.select(&sel("div.field--name--field-staff-orcid")).next() {
        doc.orcid = Some(element_text(orcid));
    }

    let mut sections: BTreeMap<SectionKey, Vec<String>> = BTreeMap::new();

    let intro: Vec<String> = page
        .select(&sel("div.field-intro p"))
        .map(element_text)
        .filter(|p| !p.is_empty())
        .collect();
    if !intro.is_empty() {
        sections.insert(SectionKey::Intro, intro);
    }

    let expertise: Vec<String> = page
        .select(&sel("div.field-staff-expertise"))
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();
    if !expertise.is_empty() {
        sections.insert(SectionKey::Expertise, expertise);
    }

    let bulleted = [
        (SectionKey::Experience, "li.field-professional-experience"),
        (SectionKey::Education, "li.field-education"),
        (SectionKey::Affiliations, "li.field-affiliations"),
        (SectionKey::Honors, "li.field-honors"),
        (SectionKey::Abstracts, "li.field-abstracts"),
    ];
    for (key, selector) in bulleted {
        let mut entries = Vec::new();
        for item in page.select(&sel(selector)) {
            // Multi-line bullets become separate entries.
            for line in element_text(item).split('\n') {
                let line = line.trim();
                if !line.is_empty() {
                    entries.push(line.to_string());
                }
            }
        }
        if !entries.is_empty() {
            sections.insert(key, entries);
        }
    }
    doc.sections = sections;

    if let Some(body) = page.select(&sel("div.body")).next() {
        let statement = element_text(body).replace('\u{a0}', " ");
        if !statement.is_empty() {
            doc.personal_statement = Some(statement);
        }
    }

    doc
}

/// Resolve a possibly-relative link against the profile page URL.
fn absolutize(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match url::Url::parse(base).and_then(|b| b.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => href.to_string(),
    }
}
