//! Dynamic field values
//!
//! Every field resolution produces a [`Value`]. Entity-typed fields hold
//! non-owning [`InstanceId`] references; list fields hold an ordered
//! `Value::List`.

use serde_json::Value as JsonValue;

use crate::registry::PrimitiveKind;
use crate::runtime::instance::InstanceId;

/// A runtime field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(f64),
    Text(String),
    /// Non-owning reference to another instance
    Ref(InstanceId),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Decode a literal from schema JSON. Entity references and nulls are
    /// not expressible as literals; `None` signals an unusable literal.
    pub fn from_literal(json: &JsonValue) -> Option<Value> {
        match json {
            JsonValue::Bool(b) => Some(Value::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Int(i))
                } else {
                    n.as_f64().map(Value::Decimal)
                }
            }
            JsonValue::String(s) => Some(Value::Text(s.clone())),
            _ => None,
        }
    }

    /// Whether this value inhabits the given primitive kind.
    ///
    /// `Int` literals are accepted for decimal fields; the original
    /// definitions wrote whole-number decimal defaults without a point.
    pub fn matches_primitive(&self, kind: PrimitiveKind) -> bool {
        matches!(
            (self, kind),
            (Value::Bool(_), PrimitiveKind::Bool)
                | (Value::Int(_), PrimitiveKind::Int)
                | (Value::Decimal(_), PrimitiveKind::Decimal)
                | (Value::Int(_), PrimitiveKind::Decimal)
                | (Value::Text(_), PrimitiveKind::Text)
        )
    }

    /// The referenced instance, if this is a `Ref`
    pub fn as_ref_id(&self) -> Option<InstanceId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}
