//! Core domain logic for the Connect client.
//!
//! This crate holds everything the route gate consults but does not own:
//! platform access (location and key-value stores), the credential store,
//! the demo and zoom route predicates, and error reporting.

pub mod credentials;
pub mod demo;
pub mod platform;
pub mod reporting;
pub mod zoom;

pub use credentials::{CredentialStore, token_expiry};
pub use demo::DemoCatalog;
pub use platform::{FileStore, KeyValueStore, Location, MemoryStore, Platform, StaticPlatform};
pub use reporting::{ErrorReporter, TracingReporter};
pub use zoom::{ZoomRange, is_zoom_path};

/// Storage keys shared with the web client.
pub mod keys {
    /// Durable: pairing code captured from `?pair=`.
    pub const PAIR_TOKEN: &str = "pairToken";
    /// Durable: the access token.
    pub const ACCESS_TOKEN: &str = "authorization";
    /// Session: where to land after `/auth/`.
    pub const REDIRECT_URL: &str = "redirectURL";
}
