//! Route engine for Connect - startup sequence, route trees, and pages.
//!
//! The [`RouteGate`] owns per-load [`Session`](connect_types::Session) state.
//! It runs the startup sequence once, then selects the anonymous or
//! authenticated tree on every render.

mod boundary;
mod forms;
mod gate;
mod pages;
mod routes;

pub use boundary::{ErrorBoundary, FALLBACK_MESSAGE};
pub use forms::{
    FormOutcome, LOGIN_FALLBACK_ERROR, LoginForm, SIGNUP_FALLBACK_ERROR, SignupForm,
};
pub use gate::{GateOptions, RouteGate, Services};
pub use pages::{
    AnonymousLandingPage, ExplorerPage, LazyPage, LoginPage, Page, PageContext, PageLoader,
    PageSet, RenderError, SignupPage,
};
pub use routes::{
    AUTH_JUNCTION, LOGIN_PATH, REGISTER_PATH, ROOT_PATH, RouteTarget, anonymous_route,
    authenticated_route, is_auth_junction, redirect_link,
};

pub use connect_api;
pub use connect_config;
pub use connect_core;
pub use connect_types;
