//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::bail;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use connect_api::{AccountsApi, AuthService, ClientRegistry};
use connect_config::ApiEndpoints;
use connect_core::{
    CredentialStore, DemoCatalog, ErrorReporter, KeyValueStore, Location, MemoryStore, Platform,
    StaticPlatform,
};
use connect_engine::{GateOptions, PageSet, RouteGate, Services};
use connect_types::DemoDevice;

pub const DEMO_DONGLE: &str = "4cf7a6ad03080c90";

/// Captures reported errors as `(fingerprint, message)`.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    pub fn fingerprints(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(fingerprint, _)| fingerprint.clone())
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl ErrorReporter for RecordingReporter {
    fn capture(&self, err: &anyhow::Error, fingerprint: &str) {
        self.events
            .lock()
            .unwrap()
            .push((fingerprint.to_string(), format!("{err:#}")));
    }
}

/// A store that reads fine but cannot delete anything.
#[derive(Default)]
pub struct StickyStore {
    inner: MemoryStore,
}

impl KeyValueStore for StickyStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        bail!("storage is read-only; cannot remove {key}")
    }
}

pub fn jwt_with_exp(exp: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS512","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"identity":"u1","exp":{exp}}}"#));
    format!("{header}.{payload}.sig")
}

pub fn options(production: bool) -> GateOptions {
    GateOptions {
        callback_path: "/v2/auth/".to_string(),
        production,
        demo: DemoCatalog::new(vec![DemoDevice::new(DEMO_DONGLE)]),
    }
}

pub struct Harness {
    pub gate: RouteGate,
    pub platform: Arc<StaticPlatform>,
    pub reporter: Arc<RecordingReporter>,
}

impl Harness {
    pub fn durable(&self) -> Arc<dyn KeyValueStore> {
        self.platform.durable()
    }

    pub fn session(&self) -> Arc<dyn KeyValueStore> {
        self.platform.session()
    }

    pub fn path(&self) -> String {
        self.platform.location().path().to_string()
    }
}

pub struct HarnessBuilder {
    url: String,
    base_url: String,
    production: bool,
    durable: Arc<dyn KeyValueStore>,
    pages: Option<PageSet>,
}

impl HarnessBuilder {
    pub fn new(url: &str, base_url: &str) -> Self {
        Self {
            url: url.to_string(),
            base_url: base_url.to_string(),
            production: false,
            durable: Arc::new(MemoryStore::new()),
            pages: None,
        }
    }

    pub fn production(mut self) -> Self {
        self.production = true;
        self
    }

    pub fn durable(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.durable = store;
        self
    }

    pub fn token(self, token: &str) -> Self {
        self.durable
            .set(connect_core::keys::ACCESS_TOKEN, token)
            .unwrap();
        self
    }

    pub fn pages(mut self, pages: PageSet) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn build(self) -> Harness {
        let session: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let platform = Arc::new(StaticPlatform::new(
            Location::parse(&self.url).unwrap(),
            Arc::clone(&self.durable),
            Arc::clone(&session),
        ));
        let reporter = Arc::new(RecordingReporter::default());
        let http = connect_api::reqwest::Client::new();
        let endpoints = ApiEndpoints::single(&self.base_url);

        let services = Services {
            platform: platform.clone(),
            credentials: Arc::new(CredentialStore::new(self.durable, session)),
            clients: Arc::new(ClientRegistry::with_http(&endpoints, &http)),
            auth: AuthService::new(&endpoints.auth, http.clone()),
            accounts: AccountsApi::new(&endpoints.accounts, http),
            reporter: reporter.clone(),
        };

        let mut gate = RouteGate::new(services, options(self.production));
        if let Some(pages) = self.pages {
            gate = gate.with_pages(pages);
        }

        Harness {
            gate,
            platform,
            reporter,
        }
    }
}

/// Mount the OAuth code exchange endpoint.
pub async fn mount_token_exchange(server: &MockServer, token: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v2/auth/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "access_token": token })),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}
