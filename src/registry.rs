use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::info;

use crate::config::GatewayConfig;
use crate::error::{Error, Result};

/// Logical name used when a request does not name a database.
pub const DEFAULT_DATABASE: &str = "main";

/// Map an absent or empty database name to [`DEFAULT_DATABASE`].
pub fn database_name(requested: Option<&str>) -> &str {
    match requested {
        Some(name) if !name.is_empty() => name,
        _ => DEFAULT_DATABASE,
    }
}

/// One open SQLite connection, shared by every request that targets it.
///
/// `rusqlite::Connection` is not `Sync`; the handle serializes its callers
/// so concurrent writers block on each other instead of failing.
#[derive(Debug)]
pub struct DatabaseHandle {
    name: String,
    path: PathBuf,
    connection: Mutex<Connection>,
}

impl DatabaseHandle {
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let name = name.into();
        let path = path.as_ref().to_path_buf();
        let connection = Connection::open(&path).map_err(|source| Error::Open {
            name: name.clone(),
            path: path.clone(),
            source,
        })?;
        info!(database = %name, path = %path.display(), "opened sqlite database");
        Ok(Self::from_connection(name, path, connection))
    }

    pub fn open_in_memory(name: impl Into<String>) -> Result<Self> {
        Self::open(name, ":memory:")
    }

    pub fn from_connection(name: impl Into<String>, path: impl Into<PathBuf>, connection: Connection) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            connection: Mutex::new(connection),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Exclusive access to the connection for one statement.
    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| Error::Resource(format!("connection to {:?} is poisoned", self.name)))
    }
}

/// Logical name → open handle. Built once at startup and read-only after.
#[derive(Debug, Default)]
pub struct Registry {
    handles: HashMap<String, Arc<DatabaseHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open every configured database. The first failure aborts and no
    /// registry is returned.
    pub fn open(config: &GatewayConfig) -> Result<Self> {
        let mut registry = Self::new();
        for (name, path) in &config.databases {
            registry = registry.with_handle(DatabaseHandle::open(name.as_str(), path)?);
        }
        info!(databases = registry.len(), "database registry ready");
        Ok(registry)
    }

    pub fn with_handle(mut self, handle: DatabaseHandle) -> Self {
        self.handles.insert(handle.name.clone(), Arc::new(handle));
        self
    }

    /// Look up a handle by its exact logical name.
    pub fn resolve(&self, name: &str) -> Result<Arc<DatabaseHandle>> {
        self.handles
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownDatabase(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handles.contains_key(name)
    }

    /// Logical names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
