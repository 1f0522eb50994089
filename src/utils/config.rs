use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::db::{ConnectionInfo, SchemaDirectory, DEFAULT_PREVIEW_LIMIT};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No configuration directory available on this platform")]
    NoConfigDir,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub connections: Vec<ConnectionInfo>,
    pub last_connection: Option<String>,
    pub schema_cache: Option<PathBuf>,
    pub preview_limit: u32,
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            connections: Vec::new(),
            last_connection: None,
            schema_cache: None,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("query_wizard");
            path.push("config.json");
            path
        })
    }

    /// Load from the default location, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::new();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Ignoring config {}: {err}", path.display());
                Self::new()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn schema_cache_path(&self) -> Option<PathBuf> {
        self.schema_cache
            .clone()
            .or_else(SchemaDirectory::cache_path)
    }

    /// Saves `info`, replacing any connection with the same name, and makes
    /// it the last used one. Saved connections are only dropped explicitly.
    pub fn add_connection(&mut self, info: ConnectionInfo) {
        self.connections.retain(|c| c.name != info.name);

        self.last_connection = Some(info.name.clone());
        self.connections.insert(0, info);
    }

    pub fn get_connection_by_name(&self, name: &str) -> Option<&ConnectionInfo> {
        self.connections.iter().find(|c| c.name == name)
    }

    pub fn remove_connection(&mut self, name: &str) {
        self.connections.retain(|c| c.name != name);
        if self.last_connection.as_deref() == Some(name) {
            self.last_connection = None;
        }
    }

    /// Named connection, else the last used one, else the most recent.
    pub fn resolve_connection(&self, name: Option<&str>) -> Option<&ConnectionInfo> {
        match name {
            Some(name) => self.get_connection_by_name(name),
            None => self
                .last_connection
                .as_deref()
                .and_then(|last| self.get_connection_by_name(last))
                .or_else(|| self.connections.first()),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}
