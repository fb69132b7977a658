//! The route gate: startup sequence and per-render tree selection.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::{Context, Result, anyhow};
use tokio::sync::OnceCell;

use connect_api::{AccountsApi, AuthService, ClientRegistry, ResponseHook, ResponseMeta, StatusCode};
use connect_config::ConnectConfig;
use connect_core::reporting::fingerprints;
use connect_core::{
    CredentialStore, DemoCatalog, ErrorReporter, Location, Platform, ZoomRange, is_zoom_path,
    keys,
};
use connect_types::{
    AccessToken, PageKind, PairingToken, RouteDecision, RouteSignals, Session, View,
};

use crate::boundary::ErrorBoundary;
use crate::forms::{FormOutcome, LoginForm, SignupForm};
use crate::pages::{PageContext, PageSet, RenderError};
use crate::routes::{self, RouteTarget};

/// Gate settings drawn from `[app]` in `config.toml`.
#[derive(Debug, Clone)]
pub struct GateOptions {
    pub callback_path: String,
    pub production: bool,
    pub demo: DemoCatalog,
}

impl GateOptions {
    #[must_use]
    pub fn from_config(config: &ConnectConfig) -> Self {
        Self {
            callback_path: config.callback_path(),
            production: config.production(),
            demo: DemoCatalog::new(config.demo_devices()),
        }
    }
}

impl Default for GateOptions {
    fn default() -> Self {
        Self::from_config(&ConnectConfig::default())
    }
}

/// Collaborators the gate drives but does not own.
pub struct Services {
    pub platform: Arc<dyn Platform>,
    pub credentials: Arc<CredentialStore>,
    pub clients: Arc<ClientRegistry>,
    pub auth: AuthService,
    pub accounts: AccountsApi,
    pub reporter: Arc<dyn ErrorReporter>,
}

pub struct RouteGate {
    platform: Arc<dyn Platform>,
    credentials: Arc<CredentialStore>,
    clients: Arc<ClientRegistry>,
    auth: AuthService,
    accounts: AccountsApi,
    reporter: Arc<dyn ErrorReporter>,
    options: GateOptions,
    pages: PageSet,
    boundary: ErrorBoundary,
    session: Arc<RwLock<Session>>,
    started: OnceCell<()>,
    loading: Mutex<Option<PageKind>>,
}

impl std::fmt::Debug for RouteGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGate")
            .field("options", &self.options)
            .field("session", &self.session())
            .finish_non_exhaustive()
    }
}

impl RouteGate {
    /// Builds the gate and captures a `?pair=` code from the current location.
    #[must_use]
    pub fn new(services: Services, options: GateOptions) -> Self {
        let Services {
            platform,
            credentials,
            clients,
            auth,
            accounts,
            reporter,
        } = services;

        capture_pair_token(platform.as_ref());

        let boundary = ErrorBoundary::new(options.production, Arc::clone(&reporter));
        Self {
            platform,
            credentials,
            clients,
            auth,
            accounts,
            reporter,
            options,
            pages: PageSet::default(),
            boundary,
            session: Arc::new(RwLock::new(Session::new())),
            started: OnceCell::new(),
            loading: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_pages(mut self, pages: PageSet) -> Self {
        self.pages = pages;
        self
    }

    #[must_use]
    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    #[must_use]
    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_initialized()
    }

    // ========================================================================
    // Startup
    // ========================================================================

    /// Runs the startup sequence. Later calls, including concurrent ones,
    /// wait for the first run and do nothing else.
    pub async fn start(&self) {
        self.started.get_or_init(|| self.run_startup()).await;
    }

    async fn run_startup(&self) {
        let location = self.platform.location();
        tracing::info!(path = location.path(), "Starting route gate");

        if location.path() == self.options.callback_path
            && let Err(err) = self.exchange_callback_code(&location).await
        {
            self.reporter.capture(&err, fingerprints::AUTH_REFRESH_TOKEN);
        }

        let token = match self.hydrate_and_configure().await {
            Ok(token) => token,
            Err(err) => {
                self.reporter.capture(&err, fingerprints::INIT);
                None
            }
        };

        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        session.set_token(token);
        if session.mark_initialized() {
            tracing::info!(
                authenticated = session.token().is_some(),
                "Route gate initialized"
            );
        }
    }

    async fn exchange_callback_code(&self, location: &Location) -> Result<()> {
        let code = location
            .query("code")
            .ok_or_else(|| anyhow!("OAuth callback is missing `code`"))?;
        let provider = location
            .query("provider")
            .ok_or_else(|| anyhow!("OAuth callback is missing `provider`"))?;

        let token = self
            .auth
            .refresh_access_token(code, provider)
            .await
            .with_context(|| format!("OAuth code exchange with {provider} failed"))?;
        self.credentials.set_token(token)?;
        tracing::info!(provider, "OAuth sign-in completed");
        Ok(())
    }

    async fn hydrate_and_configure(&self) -> Result<Option<AccessToken>> {
        let token = self
            .credentials
            .init()
            .await
            .context("Credential hydration failed")?;

        if let Some(token) = &token {
            self.clients
                .configure_all(token, &self.session_invalidation_hook());
            tracing::debug!("API clients configured");
        }
        Ok(token)
    }

    /// Logs out exactly when a backend answers 401.
    fn session_invalidation_hook(&self) -> ResponseHook {
        let credentials = Arc::clone(&self.credentials);
        let session = Arc::clone(&self.session);
        Arc::new(move |meta: &ResponseMeta<'_>| {
            if meta.status != StatusCode::UNAUTHORIZED {
                return;
            }
            tracing::warn!(client = meta.client, "Backend rejected the session");
            credentials.log_out();
            session
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear_token();
        })
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    #[must_use]
    pub fn signals_for(&self, location: &Location) -> RouteSignals {
        RouteSignals {
            authenticated: self.credentials.is_authenticated(),
            demo: self.options.demo.is_demo(location),
            zoom: is_zoom_path(location.path()),
        }
    }

    /// Tree selection for the current location, or `None` before startup
    /// settles.
    #[must_use]
    pub fn decision(&self) -> Option<RouteDecision> {
        self.is_initialized()
            .then(|| RouteDecision::decide(self.signals_for(&self.platform.location())))
    }

    /// Renders the current location once.
    pub fn render(&self) -> Result<View, RenderError> {
        let Some(decision) = self.decision() else {
            return Ok(View::Loading);
        };

        let location = self.platform.location();
        let session_store = self.platform.session();
        let target = routes::resolve(decision, location.path(), session_store.as_ref());
        tracing::debug!(
            decision = decision.as_str(),
            path = location.path(),
            ?target,
            "Route resolved"
        );

        let kind = match target {
            RouteTarget::Redirect(to) => return Ok(View::Redirect { to }),
            RouteTarget::Mount(kind) => kind,
        };

        let Some(loaded) = self.pages.get(kind).poll_ready() else {
            tracing::debug!(page = kind.display_name(), "Page still loading");
            *self.loading.lock().unwrap_or_else(PoisonError::into_inner) = Some(kind);
            return Ok(View::Loading);
        };

        let signals = self.signals_for(&location);
        self.boundary.guard(|| {
            let page = loaded.map_err(|err| RenderError::Load {
                page: kind.display_name(),
                message: format!("{err:#}"),
            })?;
            let ctx = PageContext {
                location: &location,
                session: session_store.as_ref(),
                authenticated: signals.authenticated,
                demo: signals.demo,
                zoom: ZoomRange::parse(location.path()),
                callback_path: &self.options.callback_path,
            };
            let body = page.render(&ctx)?;
            Ok(View::Page {
                kind,
                path: location.path().to_string(),
                body,
            })
        })
    }

    /// Waits for whatever made the last [`render`](Self::render) return
    /// [`View::Loading`]: the startup sequence or a page module. Load
    /// failures surface on the next render.
    pub async fn wait_until_ready(&self) {
        self.start().await;

        let pending = self
            .loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(kind) = pending
            && let Err(err) = self.pages.get(kind).load().await
        {
            tracing::debug!(page = kind.display_name(), "Page load failed: {err:#}");
        }
    }

    pub fn navigate(&self, to: &str) -> Result<()> {
        self.platform
            .navigate(to)
            .with_context(|| format!("Failed to navigate to {to}"))
    }

    // ========================================================================
    // Session actions
    // ========================================================================

    /// Submits the login form and follows its outcome. A successful login
    /// also configures the API clients with the new token.
    pub async fn submit_login(&self, form: &mut LoginForm) -> Result<FormOutcome> {
        let outcome = form.submit(&self.accounts, &self.credentials).await;
        if let FormOutcome::Navigate(to) = &outcome {
            if let Some(token) = self.credentials.get_token() {
                self.clients
                    .configure_all(&token, &self.session_invalidation_hook());
                self.session
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .set_token(Some(token));
            }
            self.navigate(to)?;
        }
        Ok(outcome)
    }

    pub async fn submit_signup(&self, form: &mut SignupForm) -> Result<FormOutcome> {
        let outcome = form.submit(&self.accounts).await;
        if let Some(to) = outcome.target() {
            self.navigate(to)?;
        }
        Ok(outcome)
    }

    pub fn log_out(&self) {
        self.credentials.log_out();
        self.session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear_token();
    }
}

fn capture_pair_token(platform: &dyn Platform) {
    let location = platform.location();
    let Some(pair) = location.query("pair").and_then(PairingToken::parse) else {
        return;
    };
    match platform.durable().set(keys::PAIR_TOKEN, pair.as_str()) {
        Ok(()) => tracing::info!("Captured device pairing code"),
        Err(err) => tracing::warn!("Could not store pairing code: {err:#}"),
    }
}
