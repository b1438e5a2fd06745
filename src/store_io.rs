//! Persistence backends for the settings store
//!
//! The store treats loaded data as untrusted input to schema resolution;
//! backends only move bytes. A file backend covers normal operation and an
//! in-memory backend covers tests and embedded hosts.

use crate::store::SettingsError;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// File name of the persisted settings record
pub const SETTINGS_FILENAME: &str = "settings.json";

/// Whole-record persistence contract consumed by the settings store
pub trait SettingsPersistence: Send + Sync {
    /// Load the raw persisted object, or `None` when nothing is stored yet
    fn load_raw(&self) -> Result<Option<Value>, SettingsError>;

    /// Replace the persisted object with `data`
    fn save_raw(&self, data: &Value) -> Result<(), SettingsError>;
}

/// Directory paths for the plugin's persisted state
///
/// Only the host's entry point should use `dirs::*` to construct this;
/// everything else receives it by parameter passing, so tests can use
/// isolated temp directories without hidden global state.
#[derive(Debug, Clone)]
pub struct DirectoryContext {
    /// Config directory for the plugin's settings record
    pub config_dir: PathBuf,
}

impl DirectoryContext {
    /// Create a DirectoryContext from the system config directory.
    /// This should only be called from the host's entry point.
    pub fn from_system() -> std::io::Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Could not determine config directory",
                )
            })?
            .join("proptypes");
        Ok(Self { config_dir })
    }

    /// Create a DirectoryContext for testing with a temp directory
    pub fn for_testing(temp_dir: &Path) -> Self {
        Self {
            config_dir: temp_dir.join("config"),
        }
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILENAME)
    }
}

/// JSON-file-backed persistence
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    /// Persist to an explicit file path
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Persist to the standard location inside a directory context
    pub fn in_context(ctx: &DirectoryContext) -> Self {
        Self::new(ctx.settings_path())
    }
}

impl SettingsPersistence for FilePersistence {
    fn load_raw(&self) -> Result<Option<Value>, SettingsError> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "No settings file yet");
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| SettingsError::IoError(format!("{}: {}", self.path.display(), e)))?;

        let value: Value = serde_json::from_str(&contents)
            .map_err(|e| SettingsError::ParseError(format!("{}: {}", self.path.display(), e)))?;

        tracing::info!(path = %self.path.display(), "Loaded settings file");
        Ok(Some(value))
    }

    fn save_raw(&self, data: &Value) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SettingsError::IoError(format!("{}: {}", parent.display(), e)))?;
        }

        let contents = serde_json::to_string_pretty(data)
            .map_err(|e| SettingsError::SerializeError(e.to_string()))?;

        std::fs::write(&self.path, contents)
            .map_err(|e| SettingsError::IoError(format!("{}: {}", self.path.display(), e)))?;

        tracing::debug!(path = %self.path.display(), "Saved settings file");
        Ok(())
    }
}

/// In-memory persistence for tests and embedded hosts
#[derive(Default)]
pub struct MemoryPersistence {
    data: RwLock<Option<Value>>,
}

impl MemoryPersistence {
    /// Start with a pre-seeded persisted object
    pub fn with_data(data: Value) -> Self {
        Self {
            data: RwLock::new(Some(data)),
        }
    }

    /// The last saved object, if any (for test assertions)
    pub fn saved(&self) -> Option<Value> {
        self.data.read().unwrap().clone()
    }
}

impl SettingsPersistence for MemoryPersistence {
    fn load_raw(&self) -> Result<Option<Value>, SettingsError> {
        Ok(self.data.read().unwrap().clone())
    }

    fn save_raw(&self, data: &Value) -> Result<(), SettingsError> {
        *self.data.write().unwrap() = Some(data.clone());
        Ok(())
    }
}
