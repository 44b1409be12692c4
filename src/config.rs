use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

use crate::error::{Error, Result};

/// Key under which database paths live in the configuration file.
pub const DATABASES_KEY: &str = "databases";

/// Logical database name → SQLite file path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayConfig {
    pub databases: IndexMap<String, PathBuf>,
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a named database.
    pub fn with_database(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.databases.insert(name.into(), path.into());
        self
    }

    /// Load the `databases` section of a JSON configuration file such as
    /// `{"databases": {"main": "data/main.db"}}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let root = load_json(path)?;
        Self::from_json_object(&root)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let root = as_object(serde_json::from_str(text)?)?;
        Self::from_json_object(&root)
    }

    fn from_json_object(root: &Map<String, Json>) -> Result<Self> {
        let section = extract_sub_map(root, &[DATABASES_KEY])?;
        let mut config = Self::new();
        for (name, path) in section {
            let path = path.as_str().ok_or_else(|| {
                Error::Config(format!("path of database {name:?} must be a string"))
            })?;
            config.databases.insert(name.clone(), PathBuf::from(path));
        }
        Ok(config)
    }
}

/// Read a JSON file whose top level is an object.
pub fn load_json(path: impl AsRef<Path>) -> Result<Map<String, Json>> {
    let text = std::fs::read_to_string(path)?;
    as_object(serde_json::from_str(&text)?)
}

/// Walk `keys` down nested objects and return the object found there.
pub fn extract_sub_map<'a>(root: &'a Map<String, Json>, keys: &[&str]) -> Result<&'a Map<String, Json>> {
    let mut current = root;
    for key in keys {
        current = match current.get(*key) {
            Some(Json::Object(map)) => map,
            Some(_) => return Err(Error::Config(format!("key {key:?} does not point to a map"))),
            None => return Err(Error::Config(format!("key {key:?} not found"))),
        };
    }
    Ok(current)
}

fn as_object(json: Json) -> Result<Map<String, Json>> {
    match json {
        Json::Object(map) => Ok(map),
        _ => Err(Error::Config("configuration root must be a JSON object".to_string())),
    }
}
