//! Core domain types for Connect.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the client.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod route;

pub use route::{PageKind, RouteDecision, RouteSignals, View};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Tokens
// ============================================================================

/// Bearer credential issued by the backend.
///
/// Usually a JWT, but treated as opaque here; expiry decoding lives with the
/// credential store.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

#[derive(Debug, Error)]
#[error("token must not be empty")]
pub struct EmptyTokenError;

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyTokenError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(EmptyTokenError);
        }
        if trimmed.len() == value.len() {
            Ok(Self(value))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Manual Debug impl to prevent leaking tokens in logs.
impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessToken(<redacted>)")
    }
}

/// One-time device pairing code captured from the landing URL.
#[derive(Clone, PartialEq, Eq)]
pub struct PairingToken(String);

impl PairingToken {
    /// Returns `None` for blank values.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PairingToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PairingToken(<redacted>)")
    }
}

// ============================================================================
// Session
// ============================================================================

/// Per-load session state.
///
/// `initialized` flips once, after the startup sequence settles. The token
/// mirrors what the credential store resolved during startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<AccessToken>,
    initialized: bool,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn token(&self) -> Option<&AccessToken> {
        self.token.as_ref()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn set_token(&mut self, token: Option<AccessToken>) {
        self.token = token;
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Returns `true` only on the call that performed the transition.
    pub fn mark_initialized(&mut self) -> bool {
        let first = !self.initialized;
        self.initialized = true;
        first
    }
}

// ============================================================================
// Demo devices
// ============================================================================

/// Read-only reference record for a device whose data is public.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoDevice {
    pub dongle_id: String,
}

impl DemoDevice {
    #[must_use]
    pub fn new(dongle_id: impl Into<String>) -> Self {
        Self {
            dongle_id: dongle_id.into(),
        }
    }
}
