//! Plugin lifecycle owner
//!
//! One `PropertyPlugin` instance owns the registry, store, bus, and hook
//! installer. It is constructed at startup, passed explicitly to every
//! component that needs it, and torn down at shutdown — there is no
//! ambient global lookup.

use crate::builtin::GENERAL_TYPE_ID;
use crate::bus::PropertyEventBus;
use crate::registry::{RegistryError, TypeDescriptor, TypeRegistry};
use crate::patch::HookInstaller;
use crate::store::{SettingsError, SettingsStore};
use crate::store_io::SettingsPersistence;
use serde_json::{json, Value};
use std::sync::Arc;

/// Persisted preference key holding soft-disabled type ids
pub const DISABLED_TYPES_KEY: &str = "disabledTypes";

/// Owns the property-type core for one plugin instance
pub struct PropertyPlugin {
    registry: TypeRegistry,
    store: SettingsStore,
    bus: PropertyEventBus,
    hooks: HookInstaller,
}

impl PropertyPlugin {
    /// Construct the core from a persistence backend
    ///
    /// Loads the settings record and restores the soft-disabled type set
    /// from preferences. A structural failure in the persisted record is
    /// returned to the host, which decides whether to reset to defaults.
    pub fn new(persistence: Arc<dyn SettingsPersistence>) -> Result<Self, SettingsError> {
        let bus = PropertyEventBus::new();
        let store = SettingsStore::load(persistence, bus.clone())?;
        let registry = TypeRegistry::new();

        if let Some(Value::Array(ids)) = store.preference(DISABLED_TYPES_KEY) {
            for id in ids.iter().filter_map(Value::as_str) {
                registry.set_disabled(id, true);
            }
        }

        tracing::info!("Property type core initialized");
        Ok(Self {
            registry,
            store,
            bus,
            hooks: HookInstaller::new(),
        })
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    pub fn bus(&self) -> &PropertyEventBus {
        &self.bus
    }

    pub fn hooks(&self) -> &HookInstaller {
        &self.hooks
    }

    /// Register a custom type and notify live views of the definition
    /// change
    pub fn register_type(&self, descriptor: TypeDescriptor) -> Result<(), RegistryError> {
        self.registry.register(descriptor)?;
        self.bus.publish_type_definitions();
        Ok(())
    }

    /// Unregister a type; stored settings are retained so a later
    /// re-registration restores prior configuration
    pub fn unregister_type(&self, id: &str) -> bool {
        let removed = self.registry.unregister(id);
        if removed {
            self.bus.publish_type_definitions();
        }
        removed
    }

    /// Soft-disable or re-enable a type, persist the preference, and
    /// notify live views
    pub fn set_type_disabled(&self, id: &str, disabled: bool) -> Result<(), SettingsError> {
        self.registry.set_disabled(id, disabled);
        self.store
            .set_preference(DISABLED_TYPES_KEY, json!(self.registry.disabled_types()))?;
        self.bus.publish_type_definitions();
        Ok(())
    }

    /// Resolved configuration for a (property, type) pair
    pub fn read_settings(&self, property: &str, type_id: &str) -> Value {
        self.store.read(property, type_id, &self.registry)
    }

    /// Update the configuration for a (property, type) pair
    pub fn update_settings(
        &self,
        property: &str,
        type_id: &str,
        updater: impl FnOnce(Value) -> Value,
    ) -> Result<(), SettingsError> {
        self.store.write(property, type_id, &self.registry, updater)
    }

    /// Resolved cross-type attributes for a property (custom icon, hidden
    /// flag, label color), independent of its assigned type
    pub fn general_settings(&self, property: &str) -> Value {
        self.store.read(property, GENERAL_TYPE_ID, &self.registry)
    }

    /// Type id to present for a property's assigned type, falling back to
    /// the plain-text type when the assigned type is not registered
    pub fn presented_type_id(&self, assigned: &str) -> String {
        self.registry.resolve_type_id(assigned)
    }

    /// Tear down the core: custom types are unregistered and all method
    /// wrappers removed, restoring host behavior
    pub fn teardown(&self) {
        self.registry.clear_custom();
        self.hooks.clear();
        self.bus.publish_type_definitions();
        tracing::info!("Property type core torn down");
    }
}

impl std::fmt::Debug for PropertyPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyPlugin")
            .field("registered_types", &self.registry.list(true).len())
            .finish()
    }
}
