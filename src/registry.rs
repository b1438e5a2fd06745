//! Type registry for property type descriptors
//!
//! Maps type identifiers to descriptors. Supports registration with
//! replace-by-id (hot reload), unregistration with fallback presentation,
//! enumeration in a stable user-facing order, and soft-disabling.

use crate::builtin;
use crate::render::PropertyRenderer;
use crate::schema::{SchemaNode, SchemaSource};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// The registered definition of one property type variant
///
/// Every descriptor supplies the full contract; the only optional behavior
/// is the settings editor, which falls back to no editor UI when absent.
pub struct TypeDescriptor {
    /// Globally unique identifier. Built-in types use bare names; custom
    /// types carry a namespace prefix (e.g. `"myplugin:stars"`).
    pub id: String,

    /// Human-readable name shown in type pickers
    pub display_name: String,

    /// Icon name resolved by the host
    pub icon: String,

    /// Factory for a fresh value of this type
    pub default_value: Box<dyn Fn() -> Value + Send + Sync>,

    /// Coarse acceptance check for a stored value
    pub validate: Box<dyn Fn(&Value) -> bool + Send + Sync>,

    /// Widget renderer (out of core scope; the core only calls it)
    pub renderer: Box<dyn PropertyRenderer>,

    /// Optional renderer for this type's settings editor UI
    pub settings_editor: Option<Box<dyn PropertyRenderer>>,

    /// Shape of this type's configuration
    pub settings_schema: SchemaNode,
}

impl TypeDescriptor {
    /// Create a descriptor with a null default value and a permissive
    /// validator; override via the `with_*` builders.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        icon: impl Into<String>,
        settings_schema: SchemaNode,
        renderer: Box<dyn PropertyRenderer>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            icon: icon.into(),
            default_value: Box::new(|| Value::Null),
            validate: Box::new(|_| true),
            renderer,
            settings_editor: None,
            settings_schema,
        }
    }

    /// Set the fresh-value factory
    pub fn with_default_value(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default_value = Box::new(f);
        self
    }

    /// Set the stored-value acceptance check
    pub fn with_validator(mut self, f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.validate = Box::new(f);
        self
    }

    /// Attach a settings editor renderer
    pub fn with_settings_editor(mut self, renderer: Box<dyn PropertyRenderer>) -> Self {
        self.settings_editor = Some(renderer);
        self
    }
}

impl std::fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("icon", &self.icon)
            .field("settings_schema", &self.settings_schema)
            .finish()
    }
}

/// Registry error types
#[derive(Debug)]
pub enum RegistryError {
    /// Attempted to register over a reserved (built-in) identifier
    ReservedId(String),
    /// Attempted to register a built-in descriptor with an unknown id
    UnknownBuiltin(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::ReservedId(id) => {
                write!(f, "type id '{id}' is reserved for a built-in type")
            }
            RegistryError::UnknownBuiltin(id) => {
                write!(f, "'{id}' is not a built-in type id")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

struct RegistryInner {
    descriptors: HashMap<String, Arc<TypeDescriptor>>,
    /// Custom type ids in registration order (built-ins are ordered by the
    /// fixed catalog priority instead)
    custom_order: Vec<String>,
    /// Soft-disabled type ids (user preference; still registered)
    disabled: HashSet<String>,
}

/// Registry for property type descriptors
///
/// Thread-safe and cheap to clone (shared interior). Lookups never fail
/// hard; a missing descriptor means "fall back to the default type".
#[derive(Clone)]
pub struct TypeRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                descriptors: HashMap::new(),
                custom_order: Vec::new(),
                disabled: HashSet::new(),
            })),
        }
    }

    /// Register a custom type descriptor
    ///
    /// Re-registering the same id replaces the prior descriptor (its
    /// position in the listing order is kept). Stored settings are
    /// re-validated lazily against the new schema on the next read; the
    /// store is never eagerly rewritten.
    ///
    /// Registering over a reserved built-in id is a configuration error
    /// reported to the caller; it does not affect other registrations.
    pub fn register(&self, descriptor: TypeDescriptor) -> Result<(), RegistryError> {
        if builtin::is_reserved(&descriptor.id) {
            return Err(RegistryError::ReservedId(descriptor.id));
        }

        let mut inner = self.inner.write().unwrap();
        let id = descriptor.id.clone();
        let replaced = inner
            .descriptors
            .insert(id.clone(), Arc::new(descriptor))
            .is_some();
        if !replaced {
            inner.custom_order.push(id.clone());
        }
        tracing::debug!(type_id = %id, replaced, "Registered custom property type");
        Ok(())
    }

    /// Register (or hot-reload) a built-in type descriptor
    ///
    /// Only ids from the built-in catalog are accepted here; the plugin's
    /// own initialization is the sole caller.
    pub fn register_builtin(&self, descriptor: TypeDescriptor) -> Result<(), RegistryError> {
        if builtin::builtin_priority(&descriptor.id).is_none() {
            return Err(RegistryError::UnknownBuiltin(descriptor.id));
        }

        let mut inner = self.inner.write().unwrap();
        let id = descriptor.id.clone();
        inner.descriptors.insert(id.clone(), Arc::new(descriptor));
        tracing::debug!(type_id = %id, "Registered built-in property type");
        Ok(())
    }

    /// Remove a descriptor by id; returns whether it was present
    ///
    /// Stored settings for the removed type are retained by the settings
    /// store, so re-registering later restores prior configuration.
    /// Properties still assigned the removed type present as the fallback
    /// type (see [`TypeRegistry::resolve_type_id`]).
    pub fn unregister(&self, id: &str) -> bool {
        let mut inner = self.inner.write().unwrap();
        let removed = inner.descriptors.remove(id).is_some();
        inner.custom_order.retain(|c| c != id);
        if removed {
            tracing::debug!(type_id = %id, "Unregistered property type");
        }
        removed
    }

    /// Remove all custom descriptors (plugin teardown)
    pub fn clear_custom(&self) {
        let mut inner = self.inner.write().unwrap();
        let customs: Vec<String> = inner.custom_order.drain(..).collect();
        for id in customs {
            inner.descriptors.remove(&id);
        }
    }

    /// Look up a descriptor by id
    ///
    /// `None` means "fall back to the default type", never a fatal
    /// condition.
    pub fn lookup(&self, id: &str) -> Option<Arc<TypeDescriptor>> {
        self.inner.read().unwrap().descriptors.get(id).cloned()
    }

    /// Map an assigned type id to the id that should be presented
    ///
    /// Returns the id itself when registered, otherwise the fallback type
    /// id with a debug-level diagnostic (the type may have been
    /// unregistered after a property was assigned to it).
    pub fn resolve_type_id(&self, id: &str) -> String {
        if self.inner.read().unwrap().descriptors.contains_key(id) {
            id.to_string()
        } else {
            tracing::debug!(
                type_id = %id,
                fallback = builtin::FALLBACK_TYPE_ID,
                "Unknown property type, presenting as fallback"
            );
            builtin::FALLBACK_TYPE_ID.to_string()
        }
    }

    /// List descriptors in stable user-facing order: built-ins first in
    /// fixed catalog priority, then customs in registration order.
    /// Soft-disabled types are excluded unless `include_disabled` is set.
    pub fn list(&self, include_disabled: bool) -> Vec<Arc<TypeDescriptor>> {
        let inner = self.inner.read().unwrap();

        let mut builtins: Vec<&Arc<TypeDescriptor>> = inner
            .descriptors
            .values()
            .filter(|d| builtin::builtin_priority(&d.id).is_some())
            .collect();
        builtins.sort_by_key(|d| builtin::builtin_priority(&d.id));

        let customs = inner
            .custom_order
            .iter()
            .filter_map(|id| inner.descriptors.get(id));

        builtins
            .into_iter()
            .chain(customs)
            .filter(|d| include_disabled || !inner.disabled.contains(&d.id))
            .cloned()
            .collect()
    }

    /// Soft-disable or re-enable a type by user preference
    pub fn set_disabled(&self, id: &str, disabled: bool) {
        let mut inner = self.inner.write().unwrap();
        if disabled {
            inner.disabled.insert(id.to_string());
        } else {
            inner.disabled.remove(id);
        }
    }

    /// Whether a type is currently soft-disabled
    pub fn is_disabled(&self, id: &str) -> bool {
        self.inner.read().unwrap().disabled.contains(id)
    }

    /// Currently soft-disabled type ids, sorted for stable persistence
    pub fn disabled_types(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .read()
            .unwrap()
            .disabled
            .iter()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaSource for TypeRegistry {
    fn settings_schema(&self, type_id: &str) -> Option<SchemaNode> {
        if type_id == builtin::GENERAL_TYPE_ID {
            return Some(builtin::general_settings_schema());
        }
        self.lookup(type_id).map(|d| d.settings_schema.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::NoopRenderer;
    use serde_json::json;

    fn custom(id: &str) -> TypeDescriptor {
        TypeDescriptor::new(
            id,
            id.to_string(),
            "puzzle",
            SchemaNode::empty_object(),
            Box::new(NoopRenderer),
        )
    }

    #[test]
    fn register_and_lookup() {
        let registry = TypeRegistry::new();
        registry.register(custom("acme:stars")).unwrap();

        let found = registry.lookup("acme:stars").unwrap();
        assert_eq!(found.id, "acme:stars");
        assert!(registry.lookup("acme:missing").is_none());
    }

    #[test]
    fn reserved_id_is_rejected() {
        let registry = TypeRegistry::new();
        let err = registry.register(custom("text")).unwrap_err();
        assert!(matches!(err, RegistryError::ReservedId(_)));

        // Unrelated registrations still succeed
        registry.register(custom("acme:stars")).unwrap();
        assert!(registry.lookup("acme:stars").is_some());
    }

    #[test]
    fn replace_keeps_listing_position() {
        let registry = TypeRegistry::new();
        registry.register(custom("acme:a")).unwrap();
        registry.register(custom("acme:b")).unwrap();

        // Hot-reload acme:a with a new schema
        let reloaded = TypeDescriptor::new(
            "acme:a",
            "A v2",
            "puzzle",
            SchemaNode::object([("extra", SchemaNode::number(5.0))]),
            Box::new(NoopRenderer),
        );
        registry.register(reloaded).unwrap();

        let ids: Vec<String> = registry.list(false).iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec!["acme:a", "acme:b"]);
        assert_eq!(registry.lookup("acme:a").unwrap().display_name, "A v2");
    }

    #[test]
    fn list_orders_builtins_before_customs() {
        let registry = TypeRegistry::new();
        registry.register(custom("acme:z")).unwrap();
        registry
            .register_builtin(builtin::builtin_descriptor("slider", Box::new(NoopRenderer)).unwrap())
            .unwrap();
        registry
            .register_builtin(builtin::builtin_descriptor("text", Box::new(NoopRenderer)).unwrap())
            .unwrap();

        let ids: Vec<String> = registry.list(false).iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec!["text", "slider", "acme:z"]);
    }

    #[test]
    fn soft_disabled_excluded_unless_requested() {
        let registry = TypeRegistry::new();
        registry.register(custom("acme:a")).unwrap();
        registry.register(custom("acme:b")).unwrap();
        registry.set_disabled("acme:a", true);

        let visible: Vec<String> = registry.list(false).iter().map(|d| d.id.clone()).collect();
        assert_eq!(visible, vec!["acme:b"]);

        let all: Vec<String> = registry.list(true).iter().map(|d| d.id.clone()).collect();
        assert_eq!(all, vec!["acme:a", "acme:b"]);

        registry.set_disabled("acme:a", false);
        assert!(!registry.is_disabled("acme:a"));
    }

    #[test]
    fn unregister_falls_back_for_presentation() {
        let registry = TypeRegistry::new();
        registry.register(custom("acme:gone")).unwrap();
        assert!(registry.unregister("acme:gone"));
        assert!(!registry.unregister("acme:gone"));

        assert_eq!(registry.resolve_type_id("acme:gone"), builtin::FALLBACK_TYPE_ID);
        assert_eq!(registry.resolve_type_id("acme:gone"), "text");
    }

    #[test]
    fn schema_source_serves_general_and_registered_types() {
        let registry = TypeRegistry::new();
        let stars = TypeDescriptor::new(
            "acme:stars",
            "Stars",
            "star",
            SchemaNode::object([("max", SchemaNode::number(5.0))]),
            Box::new(NoopRenderer),
        );
        registry.register(stars).unwrap();

        let schema = registry.settings_schema("acme:stars").unwrap();
        assert_eq!(schema.resolve(&json!({})), json!({"max": 5}));

        // General settings are always resolvable
        assert!(registry.settings_schema(builtin::GENERAL_TYPE_ID).is_some());
        assert!(registry.settings_schema("acme:unknown").is_none());
    }
}
