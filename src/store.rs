//! Persisted per-property settings store
//!
//! One record per property name (case-insensitive), holding a raw
//! configuration object per type id. Reads resolve through the schema
//! validator so callers always receive a complete, valid configuration;
//! writes persist the whole record and notify the propagation bus.

use crate::bus::{ChangeKind, PropertyChange, PropertyEventBus};
use crate::schema::SchemaSource;
use crate::store_io::SettingsPersistence;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Top-level key of the persisted layout holding per-property settings
pub const PROPERTY_SETTINGS_KEY: &str = "propertySettings";

/// Settings store error types
#[derive(Debug)]
pub enum SettingsError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    /// The persisted top-level object is not a record at all. Surfaced
    /// once at load time so the host can offer a reset to defaults.
    StructuralError(String),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::IoError(msg) => write!(f, "IO error: {msg}"),
            SettingsError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            SettingsError::SerializeError(msg) => write!(f, "Serialize error: {msg}"),
            SettingsError::StructuralError(msg) => write!(f, "Structural error: {msg}"),
        }
    }
}

impl std::error::Error for SettingsError {}

struct StoreInner {
    /// Lowercased property name -> type id -> raw config object
    ///
    /// Raw values are kept verbatim, including configs for type ids no
    /// registered descriptor currently claims (forward compatibility).
    properties: HashMap<String, HashMap<String, Value>>,
    /// Unknown top-level keys from the persisted layout, preserved on
    /// read and written back untouched
    extras: serde_json::Map<String, Value>,
}

/// The plugin's settings store
///
/// Exclusively owns the persisted record. Callers receive resolved
/// copies, never references into the store. All mutation goes through
/// `write`, `rename`, `delete`, and `set_preference`.
pub struct SettingsStore {
    inner: RwLock<StoreInner>,
    persistence: Arc<dyn SettingsPersistence>,
    bus: PropertyEventBus,
}

impl SettingsStore {
    /// Load the store from its persistence backend
    ///
    /// Missing data yields an empty store. Individual malformed entries
    /// are recovered by schema resolution on read; only a top-level value
    /// that is not an object is a structural failure, reported to the
    /// caller instead of silently discarded.
    pub fn load(
        persistence: Arc<dyn SettingsPersistence>,
        bus: PropertyEventBus,
    ) -> Result<Self, SettingsError> {
        let raw = persistence.load_raw()?;

        let mut properties = HashMap::new();
        let mut extras = serde_json::Map::new();

        match raw {
            None => {
                tracing::debug!("No persisted property settings, starting empty");
            }
            Some(Value::Object(top)) => {
                for (key, value) in top {
                    if key == PROPERTY_SETTINGS_KEY {
                        ingest_property_settings(&mut properties, value);
                    } else {
                        extras.insert(key, value);
                    }
                }
                tracing::info!(
                    properties = properties.len(),
                    "Loaded property settings"
                );
            }
            Some(other) => {
                tracing::warn!(
                    found = %json_kind(&other),
                    "Persisted property settings are not an object"
                );
                return Err(SettingsError::StructuralError(format!(
                    "expected a top-level object, found {}",
                    json_kind(&other)
                )));
            }
        }

        Ok(Self {
            inner: RwLock::new(StoreInner { properties, extras }),
            persistence,
            bus,
        })
    }

    /// Read the resolved configuration for one (property, type) pair
    ///
    /// Case-insensitive on the property name; absent records resolve as
    /// the empty object, so the result is the type's defaults. Pure and
    /// side-effect-free. When no schema is registered for the type, the
    /// raw object is returned as-is (or `{}` if none is stored).
    pub fn read(&self, property: &str, type_id: &str, schemas: &dyn SchemaSource) -> Value {
        let key = property.to_lowercase();
        let inner = self.inner.read().unwrap();
        let raw = inner
            .properties
            .get(&key)
            .and_then(|types| types.get(type_id))
            .cloned()
            .unwrap_or(Value::Null);

        match schemas.settings_schema(type_id) {
            Some(schema) => schema.resolve(&raw),
            None => {
                tracing::debug!(type_id, "No schema registered, returning raw config");
                if raw.is_object() {
                    raw
                } else {
                    Value::Object(serde_json::Map::new())
                }
            }
        }
    }

    /// Update the configuration for one (property, type) pair
    ///
    /// The updater receives the current resolved configuration and its
    /// result is persisted verbatim (unresolved) under the property's
    /// record. The whole record is persisted, then a change notification
    /// is published for the property — after the in-memory update, not
    /// necessarily after durable persistence.
    pub fn write(
        &self,
        property: &str,
        type_id: &str,
        schemas: &dyn SchemaSource,
        updater: impl FnOnce(Value) -> Value,
    ) -> Result<(), SettingsError> {
        let key = property.to_lowercase();
        let updated = updater(self.read(property, type_id, schemas));

        let persist_result = {
            let mut inner = self.inner.write().unwrap();
            inner
                .properties
                .entry(key.clone())
                .or_default()
                .insert(type_id.to_string(), updated);
            self.persist(&inner)
        };

        self.bus.publish(&PropertyChange {
            property: key,
            kind: ChangeKind::Updated,
        });
        persist_result
    }

    /// Move a property's record to a new name (case-insensitive)
    ///
    /// Overwrites any record already at the new name and notifies both
    /// names. Not transactional with the host's own rename of the property
    /// key inside documents; see DESIGN.md.
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<(), SettingsError> {
        let old_key = old_name.to_lowercase();
        let new_key = new_name.to_lowercase();

        let persist_result = {
            let mut inner = self.inner.write().unwrap();
            if let Some(record) = inner.properties.remove(&old_key) {
                inner.properties.insert(new_key.clone(), record);
            } else {
                inner.properties.remove(&new_key);
            }
            self.persist(&inner)
        };

        self.bus.publish(&PropertyChange {
            property: old_key.clone(),
            kind: ChangeKind::RenamedTo {
                next: new_key.clone(),
            },
        });
        self.bus.publish(&PropertyChange {
            property: new_key,
            kind: ChangeKind::RenamedFrom { previous: old_key },
        });
        persist_result
    }

    /// Remove a property's record entirely
    pub fn delete(&self, property: &str) -> Result<(), SettingsError> {
        let key = property.to_lowercase();

        let persist_result = {
            let mut inner = self.inner.write().unwrap();
            inner.properties.remove(&key);
            self.persist(&inner)
        };

        self.bus.publish(&PropertyChange {
            property: key,
            kind: ChangeKind::Deleted,
        });
        persist_result
    }

    /// Read a top-level plugin preference (a non-record key in the
    /// persisted layout)
    pub fn preference(&self, key: &str) -> Option<Value> {
        self.inner.read().unwrap().extras.get(key).cloned()
    }

    /// Write a top-level plugin preference and persist the whole record
    pub fn set_preference(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        let mut inner = self.inner.write().unwrap();
        inner.extras.insert(key.to_string(), value);
        self.persist(&inner)
    }

    /// Whether a record exists for the property (case-insensitive)
    pub fn has_property(&self, property: &str) -> bool {
        self.inner
            .read()
            .unwrap()
            .properties
            .contains_key(&property.to_lowercase())
    }

    /// Raw type ids stored for a property, including ids no registered
    /// descriptor claims
    pub fn stored_type_ids(&self, property: &str) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        let mut ids: Vec<String> = inner
            .properties
            .get(&property.to_lowercase())
            .map(|types| types.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Serialize the whole record and hand it to the persistence backend
    fn persist(&self, inner: &StoreInner) -> Result<(), SettingsError> {
        let mut top = inner.extras.clone();

        let mut settings = serde_json::Map::new();
        for (name, types) in &inner.properties {
            let mut per_type = serde_json::Map::new();
            for (type_id, raw) in types {
                per_type.insert(type_id.clone(), raw.clone());
            }
            settings.insert(name.clone(), Value::Object(per_type));
        }
        top.insert(PROPERTY_SETTINGS_KEY.to_string(), Value::Object(settings));

        self.persistence.save_raw(&Value::Object(top))
    }
}

/// Fold the persisted `propertySettings` object into the in-memory map,
/// lowercasing property keys and skipping entries that are not objects.
fn ingest_property_settings(
    properties: &mut HashMap<String, HashMap<String, Value>>,
    value: Value,
) {
    let Value::Object(records) = value else {
        tracing::warn!("propertySettings is not an object, ignoring");
        return;
    };

    for (name, record) in records {
        let key = name.to_lowercase();
        let Value::Object(types) = record else {
            tracing::warn!(property = %key, "Property record is not an object, ignoring");
            continue;
        };
        let entry = properties.entry(key).or_default();
        for (type_id, raw) in types {
            entry.insert(type_id, raw);
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
