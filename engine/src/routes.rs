//! The two route trees mounted by the gate.
//!
//! Both trees are pure functions of the current path, except that the
//! authenticated tree consumes the pending post-login redirect.

use connect_core::{KeyValueStore, keys};
use connect_types::{PageKind, RouteDecision};

/// Post-login junction: anonymous visitors bounce to `/`, signed-in users
/// continue to their pending redirect.
pub const AUTH_JUNCTION: &str = "/auth/";
pub const ROOT_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";

/// What a route tree resolves a path to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    Redirect(String),
    Mount(PageKind),
}

/// `/auth`, `/auth/` and anything below it, in any letter case.
#[must_use]
pub fn is_auth_junction(path: &str) -> bool {
    path.eq_ignore_ascii_case("/auth")
        || path
            .get(..AUTH_JUNCTION.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(AUTH_JUNCTION))
}

/// Only same-origin absolute paths are honored as redirect targets.
fn is_local_path(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//")
}

/// Reads and deletes the pending post-login destination.
///
/// Falls back to `/` when nothing is stored, the value is not a local path,
/// or the value could not be removed (it must never be followed twice).
pub fn redirect_link(session: &dyn KeyValueStore) -> String {
    match session.take(keys::REDIRECT_URL) {
        Ok(Some(target)) if is_local_path(&target) => target,
        Ok(Some(target)) => {
            tracing::warn!(target = %target, "Ignoring non-local redirect target");
            ROOT_PATH.to_string()
        }
        Ok(None) => ROOT_PATH.to_string(),
        Err(err) => {
            tracing::warn!("Could not consume pending redirect: {err:#}");
            ROOT_PATH.to_string()
        }
    }
}

#[must_use]
pub fn anonymous_route(path: &str) -> RouteTarget {
    if is_auth_junction(path) {
        return RouteTarget::Redirect(ROOT_PATH.to_string());
    }
    if path.eq_ignore_ascii_case(LOGIN_PATH) {
        RouteTarget::Mount(PageKind::Login)
    } else if path.eq_ignore_ascii_case(REGISTER_PATH) {
        RouteTarget::Mount(PageKind::Signup)
    } else {
        RouteTarget::Mount(PageKind::AnonymousLanding)
    }
}

pub fn authenticated_route(path: &str, session: &dyn KeyValueStore) -> RouteTarget {
    if is_auth_junction(path) {
        return RouteTarget::Redirect(redirect_link(session));
    }
    RouteTarget::Mount(PageKind::Explorer)
}

pub fn resolve(decision: RouteDecision, path: &str, session: &dyn KeyValueStore) -> RouteTarget {
    match decision {
        RouteDecision::Anonymous => anonymous_route(path),
        RouteDecision::Authenticated => authenticated_route(path, session),
    }
}
