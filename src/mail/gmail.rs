use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// One message as returned by `messages.get?format=raw`: the whole RFC-822
/// payload base64url-encoded, plus the provider's own receive timestamp in
/// epoch milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub raw: Option<String>,
    #[serde(rename = "internalDate")]
    pub internal_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

/// Profile fields from the OpenID userinfo endpoint.
#[derive(Debug, Deserialize)]
pub struct UserProfile {
    pub email: String,
    pub name: Option<String>,
}

pub struct GmailClient {
    http: reqwest::blocking::Client,
}

impl GmailClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self { http })
    }

    /// Ids of the most recent inbox messages, newest first.
    /// Any network or auth failure surfaces as one "fetch failed" error;
    /// callers do not retry internally.
    pub fn list_recent_message_ids(&self, access_token: &str, max: u32) -> Result<Vec<String>> {
        let url = format!("{}/messages?maxResults={}", GMAIL_BASE, max);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .context("gmail message list fetch failed")?;
        if !resp.status().is_success() {
            return Err(anyhow!("gmail message list fetch failed: {}", resp.status()));
        }
        let list: MessageListResponse = resp.json()?;
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    pub fn get_raw_message(&self, access_token: &str, id: &str) -> Result<RawMessage> {
        let url = format!("{}/messages/{}?format=raw", GMAIL_BASE, id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .with_context(|| format!("gmail message {} fetch failed", id))?;
        if !resp.status().is_success() {
            return Err(anyhow!("gmail message {} fetch failed: {}", id, resp.status()));
        }
        Ok(resp.json()?)
    }

    /// Who the freshly-authorized token belongs to.
    pub fn fetch_user_profile(&self, access_token: &str) -> Result<UserProfile> {
        let resp = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .context("userinfo fetch failed")?;
        if !resp.status().is_success() {
            return Err(anyhow!("userinfo fetch failed: {}", resp.status()));
        }
        Ok(resp.json()?)
    }
}
