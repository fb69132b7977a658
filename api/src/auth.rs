//! OAuth callback code exchange.

use serde::Deserialize;

use connect_types::AccessToken;

use crate::{ApiError, join_url, read_capped_error_body};

const EXCHANGE_PATH: &str = "/v2/auth/";

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Exchanges an authorization `code` from an identity `provider` for an
/// access token.
#[derive(Debug, Clone)]
pub struct AuthService {
    base_url: String,
    http: reqwest::Client,
}

impl AuthService {
    #[must_use]
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    pub async fn refresh_access_token(
        &self,
        code: &str,
        provider: &str,
    ) -> Result<AccessToken, ApiError> {
        let url = join_url(&self.base_url, EXCHANGE_PATH);
        tracing::debug!(provider, "Exchanging OAuth code");

        let response = self
            .http
            .post(&url)
            .form(&[("code", code), ("provider", provider)])
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            return Err(ApiError::Status { status, body });
        }

        let parsed: ExchangeResponse = response.json().await.map_err(|source| ApiError::Decode {
            url: url.clone(),
            source,
        })?;

        parsed
            .access_token
            .and_then(|token| AccessToken::new(token).ok())
            .ok_or(ApiError::MissingToken { url })
    }
}
