use anyhow::{anyhow, Result};
use log::info;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::{oauth, token_store};
use crate::config::Config;
use crate::domain::message::{UserId, UserToken};
use crate::store::repo::MailStore;

/// Refresh a little early so a token never expires mid-fetch.
const EXPIRY_MARGIN_SECS: i64 = 60;
const DEFAULT_LIFETIME_SECS: i64 = 3500;

#[derive(Clone)]
pub struct TokenManager {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
}

impl TokenManager {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client_id = cfg.client_id.clone();
        let redirect_uri = cfg
            .redirect_uri
            .clone()
            .unwrap_or_else(|| "http://127.0.0.1:8080/callback".to_string());

        let client_secret = token_store::load_client_secret(&client_id)?
            .or_else(|| std::env::var("OAUTH_CLIENT_SECRET").ok());

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
        })
    }

    /// Returns a valid access token for the user, refreshing and persisting
    /// the rotated token when the stored one is stale. A missing or
    /// unrefreshable token means the user must re-authenticate.
    pub fn get_access_token(&self, store: &mut dyn MailStore, user_id: UserId) -> Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

        let stored = store
            .get_token(user_id)?
            .ok_or_else(|| anyhow!("no stored credentials; please re-authenticate"))?;

        // 1) stored & not expired
        if let Some(exp) = stored.expires_at_epoch {
            if now + EXPIRY_MARGIN_SECS < exp {
                return Ok(stored.access_token);
            }
        }

        // 2) refresh if possible
        let rt = stored
            .refresh_token
            .clone()
            .ok_or_else(|| anyhow!("credentials expired; please re-authenticate"))?;

        let t = oauth::refresh_access_token(&self.client_id, self.client_secret.as_deref(), &rt)
            .map_err(|e| anyhow!("token refresh rejected ({e}); please re-authenticate"))?;

        let exp = t
            .expires_in
            .map(|s| now + s as i64)
            .unwrap_or(now + DEFAULT_LIFETIME_SECS);

        // rotation replaces the row as one transaction; the refresh token is
        // kept when the provider doesn't rotate it
        store.replace_token(&UserToken {
            user_id,
            access_token: t.access_token.clone(),
            refresh_token: t.refresh_token.or(Some(rt)),
            expires_at_epoch: Some(exp),
        })?;
        info!("refreshed access token for user {}", user_id);

        Ok(t.access_token)
    }

    /// Interactive PKCE login. The caller looks up who the token belongs to
    /// (userinfo endpoint) before persisting it with [`Self::persist`].
    pub fn login(&self) -> Result<oauth::Tokens> {
        oauth::perform_pkce_flow(
            &self.client_id,
            self.client_secret.as_deref(),
            &self.redirect_uri,
        )
    }

    pub fn persist(
        &self,
        store: &mut dyn MailStore,
        user_id: UserId,
        tokens: &oauth::Tokens,
    ) -> Result<()> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;
        let exp = tokens
            .expires_in
            .map(|s| now + s as i64)
            .unwrap_or(now + DEFAULT_LIFETIME_SECS);

        store.replace_token(&UserToken {
            user_id,
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at_epoch: Some(exp),
        })
    }
}
