//! Profile page retrieval.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use staffsync_common::ProfileDocument;

use crate::parse::parse_profile;

/// Fetches and parses one staff-profile page.
///
/// Accepts either an absolute URL or a bare profile identifier, which the
/// implementation resolves against its configured base.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn fetch(&self, url_or_id: &str) -> Result<ProfileDocument>;
}

pub struct HttpProfileFetcher {
    http: reqwest::Client,
    base_url: url::Url,
}

impl HttpProfileFetcher {
    pub fn new(base_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self> {
        let base_url = url::Url::parse(base_url)
            .with_context(|| format!("invalid profile base url {base_url}"))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .context("building http client")?;
        Ok(Self { http, base_url })
    }

    fn resolve(&self, url_or_id: &str) -> Result<String> {
        if url_or_id.starts_with("http://") || url_or_id.starts_with("https://") {
            return Ok(url_or_id.to_string());
        }
        let joined = self
            .base_url
            .join(url_or_id)
            .with_context(|| format!("resolving profile id {url_or_id}"))?;
        Ok(joined.to_string())
    }
}

#[async_trait]
impl ProfileFetcher for HttpProfileFetcher {
    async fn fetch(&self, url_or_id: &str) -> Result<ProfileDocument> {
        let url = self.resolve(url_or_id)?;
        let url = url.as_str();
        let fetched_at = Utc::now();
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                // Timeouts and connection failures record status 0 so the
                // attempt still lands in the cache.
                warn!(url, error = %err, "profile fetch failed");
                return Ok(ProfileDocument::empty(url, 0, fetched_at));
            }
        };

        let status = response.status().as_u16();
        if status != 200 {
            warn!(url, status, "profile fetch returned non-200");
            return Ok(ProfileDocument::empty(url, status, fetched_at));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!(url, error = %err, "profile body read failed");
                return Ok(ProfileDocument::empty(url, 0, fetched_at));
            }
        };

        let doc = parse_profile(url, status, fetched_at, &body);
        info!(
            url,
            titles = doc.titles.len(),
            organizations = doc.organizations.len(),
            "fetched profile"
        );
        Ok(doc)
    }
}
