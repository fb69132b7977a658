//! Route decision and render output types.

use serde::Serialize;

/// Inputs to the per-render tree selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteSignals {
    pub authenticated: bool,
    pub demo: bool,
    pub zoom: bool,
}

/// Which route tree is mounted for the current render.
///
/// Derived fresh from [`RouteSignals`] every time; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    Anonymous,
    Authenticated,
}

impl RouteDecision {
    #[must_use]
    pub const fn decide(signals: RouteSignals) -> Self {
        if !signals.authenticated && !signals.demo && !signals.zoom {
            Self::Anonymous
        } else {
            Self::Authenticated
        }
    }

    #[must_use]
    pub const fn show_anonymous(self) -> bool {
        matches!(self, Self::Anonymous)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Authenticated => "authenticated",
        }
    }
}

/// Top-level pages, each loaded behind its own lazy boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Explorer,
    AnonymousLanding,
    Login,
    Signup,
}

impl PageKind {
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Explorer => "Explorer",
            Self::AnonymousLanding => "Welcome",
            Self::Login => "Login",
            Self::Signup => "Signup",
        }
    }
}

/// Result of rendering the application shell once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    /// Startup has not settled, or a page module is still loading.
    Loading,
    Redirect { to: String },
    Page {
        kind: PageKind,
        path: String,
        body: String,
    },
    /// A page failed to render and the error boundary replaced it.
    Fallback { message: String },
}

impl View {
    #[must_use]
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Self::Redirect { to } => Some(to),
            _ => None,
        }
    }
}
