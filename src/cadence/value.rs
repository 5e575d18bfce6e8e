//! JSON-Cadence value model.
//!
//! Event payloads and script results arrive as JSON-Cadence documents: every
//! node is `{ "type": <tag>, "value": <body> }`. We reduce those nodes to a
//! small native [`Value`] tree so the rest of the bot never touches the wire
//! encoding directly.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A decoded Cadence value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Any `Int*`, `UInt*` or `Word*` value, kept as exact decimal digits.
    Integer(String),
    /// `UFix64` / `Fix64`.
    Fixed(Decimal),
    Bool(bool),
    /// `String` and `Character`.
    String(String),
    Address(String),
    Optional(Option<Box<Value>>),
    Array(Vec<Value>),
    Dictionary(Vec<(Value, Value)>),
    /// A `Type` value reduced to its type identifier.
    Type(String),
    /// `Struct`, `Resource`, `Event`, `Contract` or `Enum`.
    Composite {
        id: String,
        fields: BTreeMap<String, Value>,
    },
    Path(String),
    Void,
    /// Free-form map from an already-decoded upstream event.
    Object(BTreeMap<String, Value>),
    /// A tag we never interpret (`Capability`, `Function`, ...).
    Unsupported(String),
}

impl Value {
    /// String-like payload of a `String` or `Address` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Address(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Optional(Some(inner)) => inner.as_bool(),
            _ => None,
        }
    }

    /// True for an optional that carries nothing.
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Optional(None))
    }

    /// Numeric view of fixed-point, integer or numeric-string values.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Fixed(d) => Some(*d),
            Value::Integer(digits) => digits.parse().ok(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Optional(Some(inner)) => inner.as_decimal(),
            _ => None,
        }
    }

    /// Identifier view used for token id comparison.
    ///
    /// Integers keep their exact digits so large ids never lose precision.
    pub fn id_string(&self) -> Option<String> {
        match self {
            Value::Integer(digits) => Some(digits.clone()),
            Value::String(s) => Some(s.clone()),
            Value::Fixed(d) => Some(d.normalize().to_string()),
            Value::Optional(Some(inner)) => inner.id_string(),
            _ => None,
        }
    }

    /// Type identifier carried by a type-reference value.
    ///
    /// Accepts a reduced `Type`, a bare string, or the `{ typeID }` /
    /// `{ staticType: { typeID } }` objects produced by pre-decoded events.
    pub fn type_id(&self) -> Option<&str> {
        match self {
            Value::Type(id) | Value::String(id) => Some(id),
            Value::Optional(Some(inner)) => inner.type_id(),
            Value::Object(map) => map
                .get("typeID")
                .and_then(Value::as_str)
                .or_else(|| map.get("staticType").and_then(Value::type_id)),
            _ => None,
        }
    }

    /// Named member of a composite or free-form object.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Composite { fields, .. } | Value::Object(fields) => fields.get(name),
            Value::Optional(Some(inner)) => inner.field(name),
            _ => None,
        }
    }

    /// Plain JSON rendering for logs and the audit trail.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{json, Map, Value as Json};

        match self {
            Value::Integer(digits) => Json::String(digits.clone()),
            Value::Fixed(d) => Json::String(d.to_string()),
            Value::Bool(b) => Json::Bool(*b),
            Value::String(s) | Value::Address(s) | Value::Path(s) => Json::String(s.clone()),
            Value::Optional(None) | Value::Void => Json::Null,
            Value::Optional(Some(inner)) => inner.to_json(),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Dictionary(entries) => Json::Array(
                entries
                    .iter()
                    .map(|(k, v)| json!({ "key": k.to_json(), "value": v.to_json() }))
                    .collect(),
            ),
            Value::Type(id) => json!({ "typeID": id }),
            Value::Composite { id, fields } => {
                let fields: Map<String, Json> =
                    fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
                json!({ "id": id, "fields": fields })
            }
            Value::Object(fields) => Json::Object(
                fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Unsupported(tag) => json!({ "unsupported": tag }),
        }
    }
}

/// A Flow account address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The address without its `0x` prefix.
    pub fn hex(&self) -> &str {
        self.0.strip_prefix("0x").unwrap_or(&self.0)
    }

    /// `0x` followed by exactly 16 hex characters.
    pub fn is_canonical(raw: &str) -> bool {
        raw.strip_prefix("0x")
            .map(|hex| hex.len() == 16 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .unwrap_or(false)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
