//! Error forwarding to an error-tracking collaborator.

/// Stable tags so the tracker groups each failure site together.
pub mod fingerprints {
    pub const AUTH_REFRESH_TOKEN: &str = "app_auth_refresh_token";
    pub const INIT: &str = "app_init";
    pub const RENDER: &str = "render";
}

pub trait ErrorReporter: Send + Sync {
    fn capture(&self, err: &anyhow::Error, fingerprint: &str);
}

/// Reports through `tracing` at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn capture(&self, err: &anyhow::Error, fingerprint: &str) {
        tracing::error!(fingerprint, "{err:#}");
    }
}
