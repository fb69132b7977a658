//! Email/password account endpoints.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{join_url, read_capped_error_body};

const LOGIN_PATH: &str = "/api/auth/login";
const REGISTER_PATH: &str = "/api/auth/register";

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pid: Option<String>,
}

#[derive(Debug, Error)]
pub enum AccountsError {
    #[error("server rejected request ({status})")]
    Rejected { status: StatusCode, body: String },
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl AccountsError {
    /// Human-readable message the server put in its error body, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<String> {
        match self {
            AccountsError::Rejected { body, .. } => extract_error_message(body),
            AccountsError::Transport(_) | AccountsError::Decode(_) => None,
        }
    }
}

/// Pulls a message out of a JSON error body, or returns plain-text bodies as-is.
pub fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(payload) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.to_string());
    };

    payload
        .pointer("/description")
        .and_then(Value::as_str)
        .or_else(|| payload.pointer("/message").and_then(Value::as_str))
        .or_else(|| payload.pointer("/error/message").and_then(Value::as_str))
        .or_else(|| payload.pointer("/error").and_then(Value::as_str))
        .or_else(|| payload.as_str())
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(ToString::to_string)
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone)]
pub struct AccountsApi {
    base_url: String,
    http: reqwest::Client,
}

impl AccountsApi {
    #[must_use]
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AccountsError> {
        let response = self
            .post(LOGIN_PATH, &LoginRequest { email, password })
            .await?;
        response.json().await.map_err(AccountsError::Decode)
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), AccountsError> {
        self.post(
            REGISTER_PATH,
            &RegisterRequest {
                name,
                email,
                password,
            },
        )
        .await?;
        Ok(())
    }

    async fn post<T: Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, AccountsError> {
        let url = join_url(&self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(AccountsError::Transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        tracing::debug!(%status, path, "Account request rejected");
        let body = read_capped_error_body(response).await;
        Err(AccountsError::Rejected { status, body })
    }
}
