//! Platform access: current location and key-value storage.
//!
//! The route gate never touches process-global state directly. Everything it
//! reads about "where am I" and "what did I persist" comes through [`Platform`].

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use url::Url;

/// String key-value storage with browser-storage semantics.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;

    /// Reads and deletes in one step. Used for consume-once values.
    fn take(&self, key: &str) -> Result<Option<String>> {
        let value = self.get(key);
        if value.is_some() {
            self.remove(key)?;
        }
        Ok(value)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// A JSON object file, rewritten atomically with owner-only permissions.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> BTreeMap<String, String> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), "Failed to read storage: {err}");
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|err| {
            tracing::warn!(path = %self.path.display(), "Ignoring corrupt storage: {err}");
            BTreeMap::new()
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;

        let json = serde_json::to_vec_pretty(entries).context("Failed to serialize storage")?;
        let mut tmp = NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
        tmp.write_all(&json)
            .and_then(|()| tmp.as_file().sync_all())
            .context("Failed to write storage")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))
                .context("Failed to restrict storage permissions")?;
        }

        tmp.persist(&self.path)
            .map_err(|err| err.error)
            .with_context(|| format!("Failed to persist {}", self.path.display()))?;
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_all();
        apply(&mut entries);
        self.write_all(&entries)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read_all().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

/// Path plus decoded query pairs of the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    path: String,
    query: Vec<(String, String)>,
}

impl Location {
    /// Accepts either an absolute URL or a path with optional query string.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let url = match Url::parse(raw) {
            Ok(url) if url.has_host() => url,
            _ => {
                let base = Url::parse("http://localhost/").context("invalid base URL")?;
                let relative = if raw.starts_with('/') {
                    raw.to_string()
                } else {
                    format!("/{raw}")
                };
                base.join(&relative)
                    .with_context(|| format!("invalid location: {raw}"))?
            }
        };

        Ok(Self {
            path: url.path().to_string(),
            query: url.query_pairs().into_owned().collect(),
        })
    }

    #[must_use]
    pub fn root() -> Self {
        Self {
            path: "/".to_string(),
            query: Vec::new(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First non-empty-prefixed path segment: `/abc/def` → `abc`.
    #[must_use]
    pub fn first_segment(&self) -> Option<&str> {
        self.path
            .split('/')
            .nth(1)
            .filter(|segment| !segment.is_empty())
    }

    #[must_use]
    pub fn href(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        format!("{}?{query}", self.path)
    }
}

/// Everything the client needs from its host environment.
pub trait Platform: Send + Sync {
    fn location(&self) -> Location;
    fn navigate(&self, to: &str) -> Result<()>;
    /// Survives restarts.
    fn durable(&self) -> Arc<dyn KeyValueStore>;
    /// Lives as long as the user's session.
    fn session(&self) -> Arc<dyn KeyValueStore>;
}

/// A platform with an explicit location and injected stores.
pub struct StaticPlatform {
    location: RwLock<Location>,
    durable: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
}

impl StaticPlatform {
    #[must_use]
    pub fn new(
        location: Location,
        durable: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            location: RwLock::new(location),
            durable,
            session,
        }
    }

    /// In-memory stores, for tests and one-shot runs.
    #[must_use]
    pub fn in_memory(location: Location) -> Self {
        Self::new(
            location,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }
}

impl Platform for StaticPlatform {
    fn location(&self) -> Location {
        self.location
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn navigate(&self, to: &str) -> Result<()> {
        let next = Location::parse(to)?;
        tracing::debug!(to = %next.path(), "Navigating");
        *self.location.write().unwrap_or_else(PoisonError::into_inner) = next;
        Ok(())
    }

    fn durable(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.durable)
    }

    fn session(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.session)
    }
}
