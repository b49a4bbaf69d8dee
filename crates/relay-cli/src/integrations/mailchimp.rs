//! mailchimp.add_subscriber
//!
//! # 検証順
//! 1. `Email is required`
//! 2. `Invalid email format`
//! 3. `listId is required`
//! 4. API key / server prefix（inputs → 環境変数の順で探す）
//!
//! server prefix はホスト名に、listId は path に入るので、どちらも形を検査する。

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use relay_core::{Handler, HandlerError, Task};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));
// data-center prefix such as `us21`
static SERVER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]+[0-9]+$").expect("server prefix regex"));
static LIST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("list id regex"));

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSubscriber {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub list_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub server_prefix: Option<String>,
}

impl Task for AddSubscriber {
    const TYPE: &'static str = "mailchimp.add_subscriber";
    type Output = Subscriber;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: String,
    pub email: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct MemberResponse {
    id: String,
    email_address: String,
    status: String,
}

pub struct AddSubscriberHandler {
    http: Client,
    api_key: Option<String>,
    server_prefix: Option<String>,
    base_url: Option<String>,
}

impl AddSubscriberHandler {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            api_key: None,
            server_prefix: None,
            base_url: None,
        }
    }

    /// Fallback credentials from `MAILCHIMP_API_KEY` / `MAILCHIMP_SERVER_PREFIX`.
    pub fn from_env(http: Client) -> Self {
        Self::new(http).with_credentials(
            std::env::var("MAILCHIMP_API_KEY").ok(),
            std::env::var("MAILCHIMP_SERVER_PREFIX").ok(),
        )
    }

    pub fn with_credentials(
        mut self,
        api_key: Option<String>,
        server_prefix: Option<String>,
    ) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self.server_prefix = server_prefix.filter(|p| !p.is_empty());
        self
    }

    /// Send requests here instead of `https://{prefix}.api.mailchimp.com`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// `{base}/3.0/lists/{list_id}/members`, each segment percent-encoded.
fn members_url(base_url: &str, list_id: &str) -> Result<Url, HandlerError> {
    let mut url = Url::parse(base_url).map_err(|e| {
        HandlerError::internal(format!("invalid MailChimp base URL: {e}")).with_source(e)
    })?;
    url.path_segments_mut()
        .map_err(|()| HandlerError::internal("MailChimp base URL cannot carry a path"))?
        .pop_if_empty()
        .extend(["3.0", "lists", list_id, "members"]);
    Ok(url)
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[async_trait]
impl Handler<AddSubscriber> for AddSubscriberHandler {
    async fn handle(&self, task: AddSubscriber) -> Result<Subscriber, HandlerError> {
        let email = present(task.email).ok_or_else(|| HandlerError::validation("Email is required"))?;
        if !EMAIL.is_match(&email) {
            return Err(HandlerError::validation("Invalid email format"));
        }
        let list_id =
            present(task.list_id).ok_or_else(|| HandlerError::validation("listId is required"))?;
        if !LIST_ID.is_match(&list_id) {
            return Err(HandlerError::validation("Invalid listId"));
        }
        let api_key = present(task.api_key)
            .or_else(|| self.api_key.clone())
            .ok_or_else(|| HandlerError::validation("MailChimp API key is required"))?;
        let server_prefix = present(task.server_prefix)
            .or_else(|| self.server_prefix.clone())
            .ok_or_else(|| HandlerError::validation("MailChimp server prefix is required"))?;
        if !SERVER_PREFIX.is_match(&server_prefix) {
            return Err(HandlerError::validation("Invalid MailChimp server prefix"));
        }

        let base_url = self
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{server_prefix}.api.mailchimp.com"));
        let url = members_url(&base_url, &list_id)?;
        let body = json!({
            "email_address": email,
            "status": "subscribed",
            "merge_fields": {
                "FNAME": task.first_name.unwrap_or_default(),
                "LNAME": task.last_name.unwrap_or_default(),
            },
        });

        let response = self
            .http
            .post(url)
            .basic_auth("relay", Some(&api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                HandlerError::upstream(format!("Failed to add subscriber: {e}")).with_source(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // MailChimp puts the readable reason in `detail`
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("{} {}", status.as_u16(), text));
            return Err(HandlerError::upstream(format!(
                "Failed to add subscriber: {detail}"
            )));
        }

        let member: MemberResponse = response.json().await.map_err(|e| {
            HandlerError::upstream(format!("Failed to add subscriber: {e}")).with_source(e)
        })?;
        info!(%list_id, member_id = %member.id, "subscriber added");

        Ok(Subscriber {
            id: member.id,
            email: member.email_address,
            status: member.status,
        })
    }
}
