//! Web bundle plan.
//!
//! Describes the plugin set the asset bundler runs with for a given build
//! mode. The bundler itself is external; this is the boundary contract.

use serde::Serialize;

/// Largest single asset the service worker will precache.
pub const MAX_PRECACHE_FILE_BYTES: u64 = 10 * 1024 * 1024;
pub const PRECACHE_GLOB: &str = "**/*.{js,css,html,png,webp,svg,ico}";
const SOURCEMAP_GLOB: &str = "**/*.map";
const SENTRY_ORG: &str = "moretore";
const SENTRY_PROJECT: &str = "connect";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrecacheConfig {
    pub glob_patterns: Vec<String>,
    pub maximum_file_size_to_cache_in_bytes: u64,
    pub sourcemap: bool,
}

impl Default for PrecacheConfig {
    fn default() -> Self {
        Self {
            glob_patterns: vec![PRECACHE_GLOB.to_string()],
            maximum_file_size_to_cache_in_bytes: MAX_PRECACHE_FILE_BYTES,
            sourcemap: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "plugin", rename_all = "snake_case")]
pub enum Plugin {
    Framework,
    Pwa(PrecacheConfig),
    SvgTransform,
    /// Uploads source maps to error tracking, then deletes them from the output.
    SourceMapUpload {
        org: String,
        project: String,
        files_to_delete_after_upload: Vec<String>,
    },
}

/// The auth token gates the upload plugin but is never stored in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundlePlan {
    pub mode: BuildMode,
    pub sourcemap: bool,
    pub plugins: Vec<Plugin>,
}

impl BundlePlan {
    /// Source-map upload is added only for production builds with a non-empty token.
    #[must_use]
    pub fn resolve(mode: BuildMode, sentry_auth_token: Option<&str>) -> Self {
        let mut plugins = vec![
            Plugin::Framework,
            Plugin::Pwa(PrecacheConfig::default()),
            Plugin::SvgTransform,
        ];

        let has_token = sentry_auth_token.is_some_and(|token| !token.trim().is_empty());
        if mode == BuildMode::Production && has_token {
            plugins.push(Plugin::SourceMapUpload {
                org: SENTRY_ORG.to_string(),
                project: SENTRY_PROJECT.to_string(),
                files_to_delete_after_upload: vec![SOURCEMAP_GLOB.to_string()],
            });
        }

        Self {
            mode,
            sourcemap: true,
            plugins,
        }
    }

    #[must_use]
    pub fn uploads_sourcemaps(&self) -> bool {
        self.plugins
            .iter()
            .any(|plugin| matches!(plugin, Plugin::SourceMapUpload { .. }))
    }
}
