//! Built-in property type catalog
//!
//! Fixed identifiers, listing priority, reserved ids, and the canonical
//! settings schema for each built-in type. Renderers are host-supplied;
//! the catalog only describes what each type looks like to the core.

use crate::registry::{TypeDescriptor, TypeRegistry};
use crate::render::PropertyRenderer;
use crate::schema::SchemaNode;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

/// Type id a property falls back to when its assigned type is missing
pub const FALLBACK_TYPE_ID: &str = "text";

/// Reserved pseudo-type holding cross-type attributes for every property
pub const GENERAL_TYPE_ID: &str = "general";

/// Built-in type ids in fixed listing priority order
pub const BUILTIN_ORDER: &[&str] = &[
    "text",
    "multitext",
    "number",
    "checkbox",
    "date",
    "datetime",
    "dropdown",
    "slider",
    "color",
    "rating",
    "button",
];

/// Whether an id is reserved (built-in or the general pseudo-type) and
/// therefore unavailable to custom registrations
pub fn is_reserved(id: &str) -> bool {
    id == GENERAL_TYPE_ID || BUILTIN_ORDER.contains(&id)
}

/// Listing priority of a built-in id (0 = first); `None` for customs
pub fn builtin_priority(id: &str) -> Option<usize> {
    BUILTIN_ORDER.iter().position(|b| *b == id)
}

static GENERAL_SETTINGS_SCHEMA: Lazy<SchemaNode> = Lazy::new(|| {
    SchemaNode::object([
        ("customIcon", SchemaNode::string("")),
        ("hidden", SchemaNode::boolean(false)),
        ("labelColor", SchemaNode::string("")),
    ])
});

/// Schema for the general settings pseudo-type, resolved independently of
/// a property's assigned type
pub fn general_settings_schema() -> SchemaNode {
    GENERAL_SETTINGS_SCHEMA.clone()
}

/// Canonical settings schema for a built-in type id
pub fn builtin_settings_schema(id: &str) -> Option<SchemaNode> {
    let schema = match id {
        "text" => SchemaNode::empty_object(),
        "multitext" => SchemaNode::empty_object(),
        "number" => SchemaNode::empty_object(),
        "checkbox" => SchemaNode::empty_object(),
        "date" => SchemaNode::object([("format", SchemaNode::string("YYYY-MM-DD"))]),
        "datetime" => SchemaNode::object([("format", SchemaNode::string("YYYY-MM-DD HH:mm"))]),
        "dropdown" => SchemaNode::object([("options", SchemaNode::array())]),
        "slider" => SchemaNode::object([
            ("min", SchemaNode::number(0.0)),
            ("max", SchemaNode::number(100.0)),
            ("step", SchemaNode::number(1.0)),
            ("showLabels", SchemaNode::boolean(true)),
        ]),
        "color" => SchemaNode::object([(
            "format",
            SchemaNode::enumeration(["hex", "rgb"], "hex"),
        )]),
        "rating" => SchemaNode::object([
            ("max", SchemaNode::number(5.0)),
            ("icon", SchemaNode::string("star")),
        ]),
        "button" => SchemaNode::object([
            ("label", SchemaNode::string("Run")),
            ("style", SchemaNode::enumeration(["default", "accent", "warning"], "default")),
        ]),
        _ => return None,
    };
    Some(schema)
}

/// Build the full descriptor for a built-in type id with a host renderer
pub fn builtin_descriptor(id: &str, renderer: Box<dyn PropertyRenderer>) -> Option<TypeDescriptor> {
    let schema = builtin_settings_schema(id)?;
    let (display_name, icon) = match id {
        "text" => ("Text", "text"),
        "multitext" => ("List", "list"),
        "number" => ("Number", "hash"),
        "checkbox" => ("Checkbox", "check-square"),
        "date" => ("Date", "calendar"),
        "datetime" => ("Date & time", "clock"),
        "dropdown" => ("Dropdown", "chevron-down-square"),
        "slider" => ("Slider", "sliders-horizontal"),
        "color" => ("Color", "palette"),
        "rating" => ("Rating", "star"),
        "button" => ("Button", "square-mouse-pointer"),
        _ => return None,
    };

    let descriptor = TypeDescriptor::new(id, display_name, icon, schema, renderer)
        .with_default_value(default_value_factory(id))
        .with_validator(validator(id));
    Some(descriptor)
}

/// Register every built-in type, pulling a renderer from the host per id
///
/// Called once at plugin initialization. A renderer factory returning
/// `None` skips that type (the host may not ship every widget).
pub fn register_builtins(
    registry: &TypeRegistry,
    mut renderer_for: impl FnMut(&str) -> Option<Box<dyn PropertyRenderer>>,
) {
    for id in BUILTIN_ORDER {
        let Some(renderer) = renderer_for(id) else {
            continue;
        };
        // builtin_descriptor and register_builtin cannot fail for catalog ids
        if let Some(descriptor) = builtin_descriptor(id, renderer) {
            let _ = registry.register_builtin(descriptor);
        }
    }
}

fn default_value_factory(id: &str) -> Box<dyn Fn() -> Value + Send + Sync> {
    match id {
        "text" | "date" | "datetime" | "dropdown" => Box::new(|| json!("")),
        "multitext" => Box::new(|| json!([])),
        "number" | "slider" | "rating" => Box::new(|| json!(0)),
        "checkbox" => Box::new(|| json!(false)),
        "color" => Box::new(|| json!("#000000")),
        _ => Box::new(|| Value::Null),
    }
}

fn validator(id: &str) -> Box<dyn Fn(&Value) -> bool + Send + Sync> {
    match id {
        "text" | "date" | "datetime" | "dropdown" | "color" => Box::new(Value::is_string),
        "multitext" => Box::new(Value::is_array),
        "number" | "slider" | "rating" => Box::new(Value::is_number),
        "checkbox" => Box::new(Value::is_boolean),
        _ => Box::new(|_| true),
    }
}
