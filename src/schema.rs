//! Schema-validated configuration resolution
//!
//! A `SchemaNode` describes the shape of one type's settings. Resolution
//! never fails: missing or invalid fields are replaced by their per-field
//! defaults, so the result is always a complete, valid configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Recursive description of a configuration shape
///
/// Every node can produce a default value with no input, and resolving the
/// empty object against it yields exactly that default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SchemaNode {
    /// Free-form string field
    String { default: String },

    /// Numeric field (accepts integers and finite floats)
    Number { default: f64 },

    /// Boolean flag
    Boolean { default: bool },

    /// One of a fixed set of string values
    Enum { default: String, values: Vec<String> },

    /// JSON array, passed through unchanged when well-formed
    Array { default: Vec<Value> },

    /// Object composed of named child nodes (field order is stable)
    Object { fields: Vec<(String, SchemaNode)> },
}

impl SchemaNode {
    /// String field with a default
    pub fn string(default: impl Into<String>) -> Self {
        SchemaNode::String {
            default: default.into(),
        }
    }

    /// Number field with a default
    pub fn number(default: f64) -> Self {
        SchemaNode::Number { default }
    }

    /// Boolean field with a default
    pub fn boolean(default: bool) -> Self {
        SchemaNode::Boolean { default }
    }

    /// Enum field with allowed values and a default
    ///
    /// The default should be one of the allowed values; resolution treats
    /// anything outside the set as invalid and substitutes the default.
    pub fn enumeration(
        values: impl IntoIterator<Item = impl Into<String>>,
        default: impl Into<String>,
    ) -> Self {
        SchemaNode::Enum {
            default: default.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Array field, empty by default
    pub fn array() -> Self {
        SchemaNode::Array {
            default: Vec::new(),
        }
    }

    /// Array field with a default
    pub fn array_with_default(default: Vec<Value>) -> Self {
        SchemaNode::Array { default }
    }

    /// Object node composed of named child nodes
    pub fn object(fields: impl IntoIterator<Item = (impl Into<String>, SchemaNode)>) -> Self {
        SchemaNode::Object {
            fields: fields
                .into_iter()
                .map(|(name, node)| (name.into(), node))
                .collect(),
        }
    }

    /// Empty object node (for types with no settings of their own)
    pub fn empty_object() -> Self {
        SchemaNode::Object { fields: Vec::new() }
    }

    /// Produce the default value for this node with no input
    pub fn default_value(&self) -> Value {
        match self {
            SchemaNode::String { default } => Value::String(default.clone()),
            SchemaNode::Number { default } => number_value(*default),
            SchemaNode::Boolean { default } => Value::Bool(*default),
            SchemaNode::Enum { default, .. } => Value::String(default.clone()),
            SchemaNode::Array { default } => Value::Array(default.clone()),
            SchemaNode::Object { fields } => {
                let mut map = serde_json::Map::new();
                for (name, node) in fields {
                    map.insert(name.clone(), node.default_value());
                }
                Value::Object(map)
            }
        }
    }

    /// Resolve untrusted input against this schema
    ///
    /// Scalar fields keep the input when it passes the type-specific check
    /// and substitute the default otherwise. Object nodes recurse
    /// field-by-field; keys not named by the schema are dropped. The same
    /// `(schema, input)` pair always yields the same output, and resolving
    /// a resolved value is a no-op.
    pub fn resolve(&self, input: &Value) -> Value {
        match self {
            SchemaNode::String { default } => {
                if input.is_string() {
                    input.clone()
                } else {
                    Value::String(default.clone())
                }
            }
            SchemaNode::Number { default } => match input.as_f64() {
                Some(n) if n.is_finite() => input.clone(),
                _ => number_value(*default),
            },
            SchemaNode::Boolean { default } => {
                if input.is_boolean() {
                    input.clone()
                } else {
                    Value::Bool(*default)
                }
            }
            SchemaNode::Enum { default, values } => match input.as_str() {
                Some(s) if values.iter().any(|v| v == s) => input.clone(),
                _ => Value::String(default.clone()),
            },
            SchemaNode::Array { default } => {
                if input.is_array() {
                    input.clone()
                } else {
                    Value::Array(default.clone())
                }
            }
            SchemaNode::Object { fields } => {
                let empty = serde_json::Map::new();
                let source = input.as_object().unwrap_or(&empty);
                let mut out = serde_json::Map::new();
                for (name, node) in fields {
                    let field_input = source.get(name).unwrap_or(&Value::Null);
                    out.insert(name.clone(), node.resolve(field_input));
                }
                Value::Object(out)
            }
        }
    }
}

/// Source of the current settings schema for a type id
///
/// The settings store is parameterized by this trait instead of holding a
/// registry reference, so neither owns the other.
pub trait SchemaSource: Send + Sync {
    /// Get the current settings schema for a type id, if one is registered
    fn settings_schema(&self, type_id: &str) -> Option<SchemaNode>;
}

/// Convert a float default into a JSON number, preferring integer form
/// so `100.0` renders (and compares) as `100`.
fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(&n) {
        Value::Number((n as i64).into())
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Number(0.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn slider_schema() -> SchemaNode {
        SchemaNode::object([
            ("min", SchemaNode::number(0.0)),
            ("max", SchemaNode::number(100.0)),
            ("step", SchemaNode::number(1.0)),
        ])
    }

    #[test]
    fn empty_input_yields_defaults() {
        let schema = slider_schema();
        let resolved = schema.resolve(&json!({}));
        assert_eq!(resolved, json!({"min": 0, "max": 100, "step": 1}));
    }

    #[test]
    fn null_input_equals_empty_object() {
        let schema = slider_schema();
        assert_eq!(schema.resolve(&Value::Null), schema.resolve(&json!({})));
        assert_eq!(schema.resolve(&Value::Null), schema.default_value());
    }

    #[test]
    fn valid_fields_kept_invalid_defaulted_missing_backfilled() {
        // Persisted garbage: valid min, string max, missing step
        let schema = slider_schema();
        let resolved = schema.resolve(&json!({"min": -5, "max": "oops"}));
        assert_eq!(resolved, json!({"min": -5, "max": 100, "step": 1}));
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let schema = slider_schema();
        let resolved = schema.resolve(&json!({"min": 3, "bogus": true}));
        assert_eq!(resolved, json!({"min": 3, "max": 100, "step": 1}));
    }

    #[test]
    fn enum_outside_set_falls_back() {
        let schema = SchemaNode::object([(
            "style",
            SchemaNode::enumeration(["plain", "accent"], "plain"),
        )]);
        assert_eq!(
            schema.resolve(&json!({"style": "neon"})),
            json!({"style": "plain"})
        );
        assert_eq!(
            schema.resolve(&json!({"style": "accent"})),
            json!({"style": "accent"})
        );
    }

    #[test]
    fn nested_objects_resolve_recursively() {
        let schema = SchemaNode::object([
            ("label", SchemaNode::string("Untitled")),
            (
                "range",
                SchemaNode::object([
                    ("lo", SchemaNode::number(0.0)),
                    ("hi", SchemaNode::number(10.0)),
                ]),
            ),
        ]);
        let resolved = schema.resolve(&json!({"range": {"lo": 2, "hi": "bad"}}));
        assert_eq!(
            resolved,
            json!({"label": "Untitled", "range": {"lo": 2, "hi": 10}})
        );
    }

    #[test]
    fn scalar_schema_passes_valid_input_unchanged() {
        let schema = SchemaNode::boolean(true);
        assert_eq!(schema.resolve(&json!(false)), json!(false));
        assert_eq!(schema.resolve(&json!("nope")), json!(true));
    }

    #[test]
    fn array_field_passthrough_and_default() {
        let schema = SchemaNode::object([("options", SchemaNode::array())]);
        assert_eq!(
            schema.resolve(&json!({"options": ["a", "b"]})),
            json!({"options": ["a", "b"]})
        );
        assert_eq!(schema.resolve(&json!({"options": 7})), json!({"options": []}));
    }

    fn arbitrary_json(depth: u32) -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z]{0,8}".prop_map(Value::String),
        ];
        leaf.prop_recursive(depth, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn resolution_is_idempotent(input in arbitrary_json(3)) {
            let schema = SchemaNode::object([
                ("min", SchemaNode::number(0.0)),
                ("label", SchemaNode::string("x")),
                ("on", SchemaNode::boolean(false)),
                ("mode", SchemaNode::enumeration(["a", "b"], "a")),
                ("items", SchemaNode::array()),
            ]);
            let once = schema.resolve(&input);
            let twice = schema.resolve(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
