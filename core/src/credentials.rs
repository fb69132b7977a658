//! Access token storage and hydration.
//!
//! The token lives in durable storage under [`keys::ACCESS_TOKEN`] and is
//! mirrored in memory once hydrated. Tokens are never logged.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;

use connect_types::AccessToken;

use crate::keys;
use crate::platform::KeyValueStore;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Reads the `exp` claim (seconds since epoch) from a JWT payload.
///
/// Returns `None` for opaque tokens or payloads without a numeric `exp`.
#[must_use]
pub fn token_expiry(token: &AccessToken) -> Option<u64> {
    let mut parts = token.as_str().split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Value = serde_json::from_slice(&decoded).ok()?;
    claims.get("exp").and_then(Value::as_u64)
}

fn is_expired_at(token: &AccessToken, now: u64) -> bool {
    token_expiry(token).is_some_and(|exp| now >= exp)
}

pub struct CredentialStore {
    durable: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
    token: RwLock<Option<AccessToken>>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("has_token", &self.get_token().is_some())
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    #[must_use]
    pub fn new(durable: Arc<dyn KeyValueStore>, session: Arc<dyn KeyValueStore>) -> Self {
        Self {
            durable,
            session,
            token: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn get_token(&self) -> Option<AccessToken> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_token(&self, token: AccessToken) -> Result<()> {
        self.durable
            .set(keys::ACCESS_TOKEN, token.as_str())
            .context("Failed to persist access token")?;
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
        Ok(())
    }

    pub fn clear_token(&self) -> Result<()> {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.durable
            .remove(keys::ACCESS_TOKEN)
            .context("Failed to remove access token")
    }

    /// True iff a token is held and has not expired.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(now_secs())
    }

    #[must_use]
    pub fn is_authenticated_at(&self, now: u64) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|token| !is_expired_at(token, now))
    }

    /// Hydrates the in-memory token from durable storage.
    ///
    /// A token already set in memory this load (e.g. by the OAuth callback)
    /// wins. An expired persisted token is discarded.
    pub async fn init(&self) -> Result<Option<AccessToken>> {
        if let Some(token) = self.get_token()
            && !is_expired_at(&token, now_secs())
        {
            return Ok(Some(token));
        }

        let durable = Arc::clone(&self.durable);
        let stored = tokio::task::spawn_blocking(move || durable.get(keys::ACCESS_TOKEN))
            .await
            .context("Credential hydration task failed")?;

        let Some(token) = stored.and_then(|raw| AccessToken::new(raw).ok()) else {
            *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
            return Ok(None);
        };

        if is_expired_at(&token, now_secs()) {
            tracing::info!("Persisted access token expired; discarding");
            self.clear_token()?;
            return Ok(None);
        }

        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        Ok(Some(token))
    }

    /// Forgets the token and any pending post-login redirect.
    pub fn log_out(&self) {
        if let Err(err) = self.clear_token() {
            tracing::warn!("Log out could not clear stored token: {err:#}");
        }
        if let Err(err) = self.session.remove(keys::REDIRECT_URL) {
            tracing::warn!("Log out could not clear pending redirect: {err:#}");
        }
        tracing::info!("Logged out");
    }
}
