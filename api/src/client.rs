//! Bearer-token data clients and the registry that configures them together.

use std::sync::{PoisonError, RwLock};

use reqwest::{Method, Response};
use serde::de::DeserializeOwned;

use connect_config::ApiEndpoints;
use connect_types::AccessToken;

use crate::{
    AUTH_SCHEME, ApiError, ResponseHook, ResponseMeta, http_client_with_timeout, join_url,
    read_capped_error_body,
};

#[derive(Clone)]
struct ClientAuth {
    token: AccessToken,
    on_response: ResponseHook,
}

/// One backend client. Unconfigured clients send anonymous requests and
/// report responses to nobody.
pub struct ApiClient {
    name: &'static str,
    base_url: String,
    http: reqwest::Client,
    auth: RwLock<Option<ClientAuth>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("configured", &self.is_configured())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    #[must_use]
    pub fn new(name: &'static str, base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            name,
            base_url: base_url.into(),
            http,
            auth: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Installs the bearer token and the response hook, replacing any previous pair.
    pub fn configure(&self, token: AccessToken, on_response: ResponseHook) {
        let mut auth = self.auth.write().unwrap_or_else(PoisonError::into_inner);
        *auth = Some(ClientAuth { token, on_response });
        tracing::debug!(client = self.name, "API client configured");
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.auth
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Sends a request and hands the response to the hook before returning it.
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, ApiError> {
        let url = join_url(&self.base_url, path);
        let auth = self
            .auth
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut request = self.http.request(method, &url);
        if let Some(auth) = auth.as_ref() {
            request = request.header(
                reqwest::header::AUTHORIZATION,
                format!("{AUTH_SCHEME} {}", auth.token.as_str()),
            );
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Transport { url, source })?;

        if let Some(auth) = auth {
            (auth.on_response)(&ResponseMeta {
                client: self.name,
                status: response.status(),
            });
        }

        Ok(response)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(Method::GET, path, None).await?;
        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            return Err(ApiError::Status { status, body });
        }
        let url = response.url().to_string();
        response
            .json::<T>()
            .await
            .map_err(|source| ApiError::Decode { url, source })
    }
}

/// The set of data clients that share one session.
#[derive(Debug)]
pub struct ClientRegistry {
    request: ApiClient,
    billing: ApiClient,
    athena: ApiClient,
}

impl ClientRegistry {
    pub fn new(endpoints: &ApiEndpoints) -> Result<Self, reqwest::Error> {
        let http = http_client_with_timeout(endpoints.timeout)?;
        Ok(Self::with_http(endpoints, &http))
    }

    #[must_use]
    pub fn with_http(endpoints: &ApiEndpoints, http: &reqwest::Client) -> Self {
        Self {
            request: ApiClient::new("request", endpoints.request.clone(), http.clone()),
            billing: ApiClient::new("billing", endpoints.billing.clone(), http.clone()),
            athena: ApiClient::new("athena", endpoints.athena.clone(), http.clone()),
        }
    }

    #[must_use]
    pub fn request(&self) -> &ApiClient {
        &self.request
    }

    #[must_use]
    pub fn billing(&self) -> &ApiClient {
        &self.billing
    }

    #[must_use]
    pub fn athena(&self) -> &ApiClient {
        &self.athena
    }

    #[must_use]
    pub fn clients(&self) -> [&ApiClient; 3] {
        [&self.request, &self.billing, &self.athena]
    }

    /// Publishes one token and one hook to every client.
    pub fn configure_all(&self, token: &AccessToken, hook: &ResponseHook) {
        for client in self.clients() {
            client.configure(token.clone(), hook.clone());
        }
    }

    #[must_use]
    pub fn any_configured(&self) -> bool {
        self.clients().iter().any(|client| client.is_configured())
    }
}
