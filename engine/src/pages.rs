//! Top-level pages and their lazy loading.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use anyhow::anyhow;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use thiserror::Error;

use connect_core::{KeyValueStore, Location, ZoomRange, keys};
use connect_types::PageKind;

use crate::routes::ROOT_PATH;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{page} failed to load: {message}")]
    Load { page: &'static str, message: String },
    #[error("{page} failed to render: {message}")]
    Failed { page: &'static str, message: String },
}

impl RenderError {
    #[must_use]
    pub fn failed(kind: PageKind, message: impl Into<String>) -> Self {
        Self::Failed {
            page: kind.display_name(),
            message: message.into(),
        }
    }
}

/// Everything a page may read while rendering.
pub struct PageContext<'a> {
    pub location: &'a Location,
    pub session: &'a dyn KeyValueStore,
    pub authenticated: bool,
    pub demo: bool,
    pub zoom: Option<ZoomRange>,
    /// OAuth callback path; never remembered as a post-login destination.
    pub callback_path: &'a str,
}

pub trait Page: Send + Sync {
    fn kind(&self) -> PageKind;
    fn render(&self, ctx: &PageContext<'_>) -> Result<String, RenderError>;
}

pub type PageLoader =
    Box<dyn Fn() -> BoxFuture<'static, anyhow::Result<Arc<dyn Page>>> + Send + Sync>;

type LoadResult = Result<Arc<dyn Page>, Arc<anyhow::Error>>;
type InFlight = Shared<BoxFuture<'static, LoadResult>>;

/// A page whose module is loaded on first use.
///
/// All uses share one in-flight load. A failed load is handed to one
/// [`poll_ready`](Self::poll_ready) caller and retried on the next use.
pub struct LazyPage {
    kind: PageKind,
    loader: PageLoader,
    loaded: OnceLock<Arc<dyn Page>>,
    in_flight: Mutex<Option<InFlight>>,
}

impl fmt::Debug for LazyPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyPage")
            .field("kind", &self.kind)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

impl LazyPage {
    #[must_use]
    pub fn new(kind: PageKind, loader: PageLoader) -> Self {
        Self {
            kind,
            loader,
            loaded: OnceLock::new(),
            in_flight: Mutex::new(None),
        }
    }

    /// Wraps an already constructed page behind the same lazy seam.
    #[must_use]
    pub fn of(page: Arc<dyn Page>) -> Self {
        let kind = page.kind();
        Self::new(
            kind,
            Box::new(move || {
                let page = Arc::clone(&page);
                async move { Ok::<_, anyhow::Error>(page) }.boxed()
            }),
        )
    }

    #[must_use]
    pub fn kind(&self) -> PageKind {
        self.kind
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// Drives the load without waiting.
    ///
    /// `None` while the module is still loading. A failure is returned
    /// once; the following use starts a fresh load.
    pub fn poll_ready(&self) -> Option<anyhow::Result<Arc<dyn Page>>> {
        if let Some(page) = self.loaded.get() {
            return Some(Ok(Arc::clone(page)));
        }

        let load = self.in_flight();
        let result = load.clone().now_or_never()?;
        Some(self.settle(&load, result, true))
    }

    /// Waits for the module to load. A failure stays pending for the next
    /// [`poll_ready`](Self::poll_ready).
    pub async fn load(&self) -> anyhow::Result<Arc<dyn Page>> {
        if let Some(page) = self.loaded.get() {
            return Ok(Arc::clone(page));
        }

        let load = self.in_flight();
        let result = load.clone().await;
        self.settle(&load, result, false)
    }

    fn in_flight(&self) -> InFlight {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        slot.get_or_insert_with(|| {
            tracing::debug!(page = self.kind.display_name(), "Loading page");
            (self.loader)().map(|result| result.map_err(Arc::new)).boxed().shared()
        })
        .clone()
    }

    fn settle(
        &self,
        load: &InFlight,
        result: LoadResult,
        retry_on_failure: bool,
    ) -> anyhow::Result<Arc<dyn Page>> {
        match result {
            Ok(page) => {
                let page = Arc::clone(self.loaded.get_or_init(|| page));
                self.forget(load);
                Ok(page)
            }
            Err(err) => {
                if retry_on_failure {
                    self.forget(load);
                }
                Err(anyhow!("{err:#}"))
            }
        }
    }

    fn forget(&self, load: &InFlight) {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(load)) {
            *slot = None;
        }
    }
}

/// One lazy slot per top-level page.
#[derive(Debug)]
pub struct PageSet {
    explorer: LazyPage,
    landing: LazyPage,
    login: LazyPage,
    signup: LazyPage,
}

impl Default for PageSet {
    fn default() -> Self {
        Self {
            explorer: LazyPage::of(Arc::new(ExplorerPage)),
            landing: LazyPage::of(Arc::new(AnonymousLandingPage)),
            login: LazyPage::of(Arc::new(LoginPage)),
            signup: LazyPage::of(Arc::new(SignupPage)),
        }
    }
}

impl PageSet {
    /// Replaces the slot for `page.kind()`.
    #[must_use]
    pub fn with(mut self, page: LazyPage) -> Self {
        let kind = page.kind();
        *self.slot_mut(kind) = page;
        self
    }

    #[must_use]
    pub fn get(&self, kind: PageKind) -> &LazyPage {
        match kind {
            PageKind::Explorer => &self.explorer,
            PageKind::AnonymousLanding => &self.landing,
            PageKind::Login => &self.login,
            PageKind::Signup => &self.signup,
        }
    }

    fn slot_mut(&mut self, kind: PageKind) -> &mut LazyPage {
        match kind {
            PageKind::Explorer => &mut self.explorer,
            PageKind::AnonymousLanding => &mut self.landing,
            PageKind::Login => &mut self.login,
            PageKind::Signup => &mut self.signup,
        }
    }
}

// ============================================================================
// Built-in pages
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct ExplorerPage;

impl Page for ExplorerPage {
    fn kind(&self) -> PageKind {
        PageKind::Explorer
    }

    fn render(&self, ctx: &PageContext<'_>) -> Result<String, RenderError> {
        let mode = if let Some(zoom) = ctx.zoom {
            format!(
                "shared clip {}..{} ({} s)",
                zoom.start_ms,
                zoom.end_ms,
                zoom.duration_ms() / 1000
            )
        } else if ctx.demo {
            "demo device".to_string()
        } else if ctx.authenticated {
            "signed in".to_string()
        } else {
            "read-only".to_string()
        };

        let device = ctx.location.first_segment().unwrap_or("all devices");
        Ok(format!("Explorer: {device}\nmode: {mode}"))
    }
}

/// Shown to signed-out visitors on every path the anonymous tree does not
/// name explicitly.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousLandingPage;

impl Page for AnonymousLandingPage {
    fn kind(&self) -> PageKind {
        PageKind::AnonymousLanding
    }

    fn render(&self, ctx: &PageContext<'_>) -> Result<String, RenderError> {
        let path = ctx.location.path();
        if path != ROOT_PATH
            && path != ctx.callback_path
            && let Err(err) = ctx.session.set(keys::REDIRECT_URL, path)
        {
            tracing::warn!("Could not remember post-login destination: {err:#}");
        }
        Ok("Sign in to view your devices.\nLog in: /login\nSign up: /register".to_string())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoginPage;

impl Page for LoginPage {
    fn kind(&self) -> PageKind {
        PageKind::Login
    }

    fn render(&self, _ctx: &PageContext<'_>) -> Result<String, RenderError> {
        Ok("Email\nPassword\n[Login] [Signup]".to_string())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SignupPage;

impl Page for SignupPage {
    fn kind(&self) -> PageKind {
        PageKind::Signup
    }

    fn render(&self, _ctx: &PageContext<'_>) -> Result<String, RenderError> {
        Ok("Name\nEmail\nPassword\n[Register]".to_string())
    }
}
