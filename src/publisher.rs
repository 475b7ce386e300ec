use crate::updater::WikiPublisher;
use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("wikisync/", env!("CARGO_PKG_VERSION"));

/// Synchronous MediaWiki Action API client. Edits go through the usual
/// token dance: an optional bot login, then a lazily fetched CSRF token.
pub struct MediaWikiPublisher {
    http: reqwest::blocking::Client,
    api_url: String,
    csrf_token: Option<String>,
}

impl MediaWikiPublisher {
    pub fn new(api_url: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(MediaWikiPublisher {
            http,
            api_url: api_url.to_string(),
            csrf_token: None,
        })
    }

    /// Bot-password login. Optional; open wikis accept anonymous edits.
    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let login_token = self.fetch_token("login")?;

        let response = self.post(&[
            ("action", "login"),
            ("lgname", username),
            ("lgpassword", password),
            ("lgtoken", &login_token),
        ])?;

        let result = response
            .pointer("/login/result")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        if result != "Success" {
            bail!("wiki login failed for `{username}`: {result}");
        }

        // any pre-login token is invalid now
        self.csrf_token = None;
        info!(user = %username, "logged in to wiki");
        Ok(())
    }

    fn csrf_token(&mut self) -> Result<String> {
        if let Some(token) = &self.csrf_token {
            return Ok(token.clone());
        }
        let token = self.fetch_token("csrf")?;
        self.csrf_token = Some(token.clone());
        Ok(token)
    }

    fn fetch_token(&self, kind: &str) -> Result<String> {
        let response = self.get(&[
            ("action", "query"),
            ("meta", "tokens"),
            ("type", kind),
        ])?;

        response
            .pointer(&format!("/query/tokens/{kind}token"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("wiki API returned no {kind} token"))
    }

    fn get(&self, params: &[(&str, &str)]) -> Result<Value> {
        let response: Value = self
            .http
            .get(&self.api_url)
            .query(&[("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .context("wiki API request failed")?
            .error_for_status()
            .context("wiki API request rejected")?
            .json()
            .context("wiki API returned unparseable JSON")?;
        Self::check_api_error(&response)?;
        Ok(response)
    }

    fn post(&self, params: &[(&str, &str)]) -> Result<Value> {
        let mut form: Vec<(&str, &str)> =
            vec![("format", "json"), ("formatversion", "2")];
        form.extend_from_slice(params);

        let response: Value = self
            .http
            .post(&self.api_url)
            .form(&form)
            .send()
            .context("wiki API request failed")?
            .error_for_status()
            .context("wiki API request rejected")?
            .json()
            .context("wiki API returned unparseable JSON")?;
        Self::check_api_error(&response)?;
        Ok(response)
    }

    fn check_api_error(response: &Value) -> Result<()> {
        if let Some(error) = response.get("error") {
            let code = error.get("code").and_then(Value::as_str).unwrap_or("unknown");
            let info = error.get("info").and_then(Value::as_str).unwrap_or("");
            bail!("wiki API error `{code}`: {info}");
        }
        Ok(())
    }
}

/// Extract the main-slot wikitext of the first page in a revisions query
/// response. `None` for a page that does not exist yet.
fn revision_content(response: &Value) -> Option<&str> {
    let page = response.pointer("/query/pages/0")?;
    if page.get("missing").is_some() {
        return None;
    }
    page.pointer("/revisions/0/slots/main/content")
        .and_then(Value::as_str)
}

impl WikiPublisher for MediaWikiPublisher {
    fn fetch_page(&mut self, title: &str) -> Result<String> {
        let response = self.get(&[
            ("action", "query"),
            ("prop", "revisions"),
            ("rvprop", "content"),
            ("rvslots", "main"),
            ("titles", title),
        ])?;

        let content = revision_content(&response).unwrap_or_default();
        debug!(page = %title, bytes = content.len(), "fetched page");
        Ok(content.to_string())
    }

    fn publish_page(&mut self, title: &str, text: &str, summary: &str) -> Result<()> {
        let token = self.csrf_token()?;

        let response = self.post(&[
            ("action", "edit"),
            ("title", title),
            ("text", text),
            ("summary", summary),
            ("bot", "1"),
            ("token", &token),
        ])?;

        let result = response
            .pointer("/edit/result")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        if result != "Success" {
            bail!("wiki edit of `{title}` failed: {result}");
        }
        debug!(page = %title, "published page");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
