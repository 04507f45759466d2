use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::Value as Json;
use tracing::info;

/// Thin wrapper around the MediaWiki action API providing session setup.
///
/// Holds the bot session cookie jar and the CSRF token obtained at login;
/// all store and cache I/O goes through [`get`](WikiClient::get) and
/// [`post`](WikiClient::post).
#[derive(Clone)]
pub struct WikiClient {
    http: reqwest::Client,
    api_url: String,
    csrf_token: String,
}

impl WikiClient {
    /// Log in with bot credentials and fetch an edit token.
    pub async fn connect(
        api_url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .build()
            .context("building HTTP client")?;

        let login_token = fetch_token(&http, api_url, "login").await?;

        let response: Json = http
            .post(api_url)
            .form(&[
                ("action", "login"),
                ("lgname", username),
                ("lgpassword", password),
                ("lgtoken", &login_token),
                ("format", "json"),
            ])
            .send()
            .await
            .context("login request failed")?
            .json()
            .await
            .context("parsing login response")?;

        let result = response["login"]["result"].as_str().unwrap_or("");
        if result != "Success" {
            bail!("graph API login failed for {username}: {result}");
        }

        let csrf_token = fetch_token(&http, api_url, "csrf").await?;
        info!(api_url, username, "Connected to graph API");

        Ok(Self {
            http,
            api_url: api_url.to_string(),
            csrf_token,
        })
    }

    /// GET an API query; returns the decoded JSON body.
    pub async fn get(&self, params: &[(&str, &str)]) -> Result<Json> {
        let response = self
            .http
            .get(&self.api_url)
            .query(params)
            .query(&[("format", "json")])
            .send()
            .await
            .context("graph API request failed")?;
        response.json().await.context("parsing graph API response")
    }

    /// POST an API mutation with the session's CSRF token attached.
    pub async fn post(&self, params: &[(&str, &str)]) -> Result<Json> {
        let mut form: Vec<(&str, &str)> = params.to_vec();
        form.push(("token", &self.csrf_token));
        form.push(("format", "json"));
        let response = self
            .http
            .post(&self.api_url)
            .form(&form)
            .send()
            .await
            .context("graph API edit request failed")?;
        response.json().await.context("parsing graph API response")
    }
}

async fn fetch_token(http: &reqwest::Client, api_url: &str, kind: &str) -> Result<String> {
    let response: Json = http
        .get(api_url)
        .query(&[
            ("action", "query"),
            ("meta", "tokens"),
            ("type", kind),
            ("format", "json"),
        ])
        .send()
        .await
        .with_context(|| format!("fetching {kind} token"))?
        .json()
        .await
        .with_context(|| format!("parsing {kind} token response"))?;

    let key = format!("{kind}token");
    match response["query"]["tokens"][&key].as_str() {
        Some(token) => Ok(token.to_string()),
        None => bail!("graph API returned no {kind} token"),
    }
}
