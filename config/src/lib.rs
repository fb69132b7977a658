//! Configuration for the Connect client.
//!
//! Loads `${CONNECT_HOME}/config.toml` (default `~/.connect/config.toml`).
//! Every section is optional; missing values fall back to the defaults below.

pub mod bundle;
pub mod paths;

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use connect_types::DemoDevice;

pub use bundle::{BuildMode, BundlePlan, Plugin, PrecacheConfig};

/// Path the OAuth provider redirects back to after authorization.
pub const DEFAULT_CALLBACK_PATH: &str = "/v2/auth/";
/// Local backend used when no endpoint is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:3111";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Devices whose routes are public sample data.
const DEFAULT_DEMO_DONGLES: [&str; 2] = ["4cf7a6ad03080c90", "164080f7933651c4"];

const CONFIG_TEMPLATE: &str = r#"# Connect client configuration.

[app]
# Wrap pages in the error boundary and report render failures.
production = false
# Path the OAuth provider redirects to with ?code=...&provider=...
callback_path = "/v2/auth/"
# Devices viewable without logging in.
# demo_devices = [{ dongle_id = "4cf7a6ad03080c90" }]

[api]
# Values may reference environment variables as ${VAR}.
request_url = "http://localhost:3111"
billing_url = "http://localhost:3111"
athena_url = "http://localhost:3111"
auth_url = "http://localhost:3111"
accounts_url = "http://localhost:3111"
# timeout_secs = 30
"#;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectConfig {
    pub app: Option<AppConfig>,
    pub api: Option<ApiConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("config already exists at {}", path.display())]
    AlreadyExists { path: PathBuf },
    #[error("failed to write config at {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::AlreadyExists { path }
            | ConfigError::Write { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Enables the render error boundary.
    #[serde(default)]
    pub production: bool,
    pub callback_path: Option<String>,
    pub demo_devices: Option<Vec<DemoDevice>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiConfig {
    pub request_url: Option<String>,
    pub billing_url: Option<String>,
    pub athena_url: Option<String>,
    pub auth_url: Option<String>,
    pub accounts_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Fully resolved endpoint set, env vars expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    pub request: String,
    pub billing: String,
    pub athena: String,
    pub auth: String,
    pub accounts: String,
    pub timeout: Duration,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            request: DEFAULT_API_URL.to_string(),
            billing: DEFAULT_API_URL.to_string(),
            athena: DEFAULT_API_URL.to_string(),
            auth: DEFAULT_API_URL.to_string(),
            accounts: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ApiEndpoints {
    /// Points every client at one base URL.
    #[must_use]
    pub fn single(base: &str) -> Self {
        Self {
            request: base.to_string(),
            billing: base.to_string(),
            athena: base.to_string(),
            auth: base.to_string(),
            accounts: base.to_string(),
            ..Self::default()
        }
    }
}

/// Replaces `${VAR}` references with the variable's value (empty if unset).
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

impl ConnectConfig {
    /// Loads the config from the default location.
    ///
    /// Returns `Ok(None)` when no config file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = paths::config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {:?}: {}", path, source);
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map_err(|source| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, source);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        paths::config_path()
    }

    /// Writes the commented default config. Fails if the file exists.
    pub fn init(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }

        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
            paths::restrict_dir_permissions(parent).map_err(write_err)?;
        }
        fs::write(path, CONFIG_TEMPLATE).map_err(write_err)?;
        Ok(())
    }

    #[must_use]
    pub fn production(&self) -> bool {
        self.app.as_ref().is_some_and(|app| app.production)
    }

    #[must_use]
    pub fn callback_path(&self) -> String {
        self.app
            .as_ref()
            .and_then(|app| app.callback_path.as_deref())
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .unwrap_or(DEFAULT_CALLBACK_PATH)
            .to_string()
    }

    #[must_use]
    pub fn demo_devices(&self) -> Vec<DemoDevice> {
        match self.app.as_ref().and_then(|app| app.demo_devices.clone()) {
            Some(devices) => devices,
            None => DEFAULT_DEMO_DONGLES
                .iter()
                .map(|id| DemoDevice::new(*id))
                .collect(),
        }
    }

    #[must_use]
    pub fn api_endpoints(&self) -> ApiEndpoints {
        let defaults = ApiEndpoints::default();
        let Some(api) = self.api.as_ref() else {
            return defaults;
        };

        let resolve = |value: Option<&String>, fallback: String| {
            value
                .map(|raw| expand_env_vars(raw))
                .map(|expanded| expanded.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or(fallback)
        };

        ApiEndpoints {
            request: resolve(api.request_url.as_ref(), defaults.request),
            billing: resolve(api.billing_url.as_ref(), defaults.billing),
            athena: resolve(api.athena_url.as_ref(), defaults.athena),
            auth: resolve(api.auth_url.as_ref(), defaults.auth),
            accounts: resolve(api.accounts_url.as_ref(), defaults.accounts),
            timeout: api
                .timeout_secs
                .filter(|secs| *secs > 0)
                .map_or(defaults.timeout, Duration::from_secs),
        }
    }
}
