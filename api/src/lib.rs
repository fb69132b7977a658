//! HTTP clients for the Connect backend.
//!
//! # Architecture
//!
//! - [`ClientRegistry`] - the three data clients (`request`, `billing`, `athena`),
//!   each configured with a bearer token and a shared [`ResponseHook`]
//! - [`AuthService`] - OAuth callback code exchange
//! - [`AccountsApi`] - email/password login and registration
//!
//! All clients share one [`reqwest::Client`] built by [`http_client_with_timeout`].
//!
//! # Error Handling
//!
//! Non-2xx responses surface as [`ApiError::Status`] carrying a capped copy of
//! the body. Nothing here retries; a failed call is reported to the caller once.

pub mod accounts;
pub mod auth;
pub mod client;

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;

pub use accounts::{AccountsApi, AccountsError, LoginResponse};
pub use auth::AuthService;
pub use client::{ApiClient, ClientRegistry};
pub use connect_types;
pub use reqwest;
pub use reqwest::StatusCode;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Authorization scheme the backend middleware accepts.
pub const AUTH_SCHEME: &str = "JWT";

/// What a [`ResponseHook`] sees of each response.
#[derive(Debug, Clone, Copy)]
pub struct ResponseMeta<'a> {
    pub client: &'a str,
    pub status: StatusCode,
}

/// Called with every response a configured client receives, before the
/// caller sees it.
pub type ResponseHook = Arc<dyn Fn(&ResponseMeta<'_>) + Send + Sync>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("API error {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("response from {url} did not include an access token")]
    MissingToken { url: String },
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .user_agent(concat!("connect/", env!("CARGO_PKG_VERSION")))
}

pub fn http_client_with_timeout(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    base_client_builder().timeout(timeout).build()
}

/// Joins a base URL and an absolute path without doubling the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
