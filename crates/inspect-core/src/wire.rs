//! Wire format: the type-tagged tree that crosses the serialization boundary.
//!
//! Every node is a JSON object with a `"type"` tag:
//!
//! ```json
//! {"type":"object","value":2,"children":{"a":{"type":"number","value":1},
//!                                         "b":{"type":"getter","value":"b"}}}
//! ```
//!
//! Nothing in here can hold a live reference: elements and stores are carried
//! as [`Handle`]s, functions and symbols as their names.

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::registry::Handle;

/// Sentinel for `+Infinity`.
pub const INFINITY: &str = "__$sdt-Infinity__";
/// Sentinel for `-Infinity`.
pub const NEGATIVE_INFINITY: &str = "__$sdt-NegativeInfinity__";
/// Sentinel for `NaN`.
pub const NAN: &str = "__$sdt-NaN__";

/// Largest integer a double holds exactly (`Number.MAX_SAFE_INTEGER`).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// One encoded value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EncodedValue {
    Number {
        value: EncodedNumber,
    },
    Boolean {
        value: bool,
    },
    String {
        value: String,
    },
    Null,
    Undefined,
    /// Symbol description, `""` when it has none.
    Symbol {
        value: String,
    },
    /// Function name, `""` when anonymous.
    Function {
        value: String,
    },
    Element {
        value: ElementRef,
    },
    Store {
        value: Box<StoreSnapshot>,
    },
    /// `value` is the length; `children` only in deep encodings.
    Array {
        value: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        children: Option<Vec<EncodedValue>>,
    },
    /// `value` is the enumerable key count; `children` only in deep encodings.
    Object {
        value: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        children: Option<ObjectChildren>,
    },
    /// Type tag of a value nothing else could describe.
    Instance {
        value: String,
    },
    /// Key of an accessor property that was not read.
    Getter {
        value: String,
    },
    /// Back-reference to an object already being expanded higher up.
    Circular,
}

impl EncodedValue {
    pub fn number(n: f64) -> Self {
        Self::Number {
            value: EncodedNumber::from_f64(n),
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::String { value: s.into() }
    }

    /// The wire tag of this node.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number { .. } => "number",
            Self::Boolean { .. } => "boolean",
            Self::String { .. } => "string",
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::Symbol { .. } => "symbol",
            Self::Function { .. } => "function",
            Self::Element { .. } => "element",
            Self::Store { .. } => "store",
            Self::Array { .. } => "array",
            Self::Object { .. } => "object",
            Self::Instance { .. } => "instance",
            Self::Getter { .. } => "getter",
            Self::Circular => "circular",
        }
    }
}

/// Payload of an `element` node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRef {
    /// Tag name as reported by the element.
    pub name: String,
    pub id: Handle,
}

/// Payload of a `store` node: its handle plus a deep encoding of its contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub id: Handle,
    pub value: EncodedValue,
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// A number as it travels: finite values verbatim, the three values JSON
/// cannot express as sentinel strings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EncodedNumber {
    Finite(f64),
    Infinity,
    NegativeInfinity,
    NaN,
}

impl EncodedNumber {
    pub fn from_f64(n: f64) -> Self {
        if n.is_nan() {
            Self::NaN
        } else if n == f64::INFINITY {
            Self::Infinity
        } else if n == f64::NEG_INFINITY {
            Self::NegativeInfinity
        } else {
            Self::Finite(n)
        }
    }

    /// The number the sender held. `NaN` comes back as a NaN.
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Finite(n) => n,
            Self::Infinity => f64::INFINITY,
            Self::NegativeInfinity => f64::NEG_INFINITY,
            Self::NaN => f64::NAN,
        }
    }

    fn sentinel(self) -> Option<&'static str> {
        match self {
            Self::Finite(_) => None,
            Self::Infinity => Some(INFINITY),
            Self::NegativeInfinity => Some(NEGATIVE_INFINITY),
            Self::NaN => Some(NAN),
        }
    }
}

impl Serialize for EncodedNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(sentinel) = self.sentinel() {
            return serializer.serialize_str(sentinel);
        }
        let n = self.to_f64();
        // Integral values go out without a fraction, like JSON.stringify; -0 becomes 0.
        if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
            serializer.serialize_i64(n as i64)
        } else {
            serializer.serialize_f64(n)
        }
    }
}

impl<'de> Deserialize<'de> for EncodedNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NumberVisitor)
    }
}

struct NumberVisitor;

impl Visitor<'_> for NumberVisitor {
    type Value = EncodedNumber;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a finite number or a numeric sentinel string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(EncodedNumber::Finite(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(EncodedNumber::Finite(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(EncodedNumber::Finite(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        match v {
            INFINITY => Ok(EncodedNumber::Infinity),
            NEGATIVE_INFINITY => Ok(EncodedNumber::NegativeInfinity),
            NAN => Ok(EncodedNumber::NaN),
            other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
        }
    }
}

// ---------------------------------------------------------------------------
// Object children
// ---------------------------------------------------------------------------

/// Children of a deep `object` node, in the object's own property order.
/// Serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectChildren(Vec<(String, EncodedValue)>);

impl ObjectChildren {
    pub fn new(entries: Vec<(String, EncodedValue)>) -> Self {
        Self(entries)
    }

    pub fn get(&self, key: &str) -> Option<&EncodedValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EncodedValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, EncodedValue)> for ObjectChildren {
    fn from_iter<I: IntoIterator<Item = (K, EncodedValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl Serialize for ObjectChildren {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ObjectChildren {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ChildrenVisitor)
    }
}

struct ChildrenVisitor;

impl<'de> Visitor<'de> for ChildrenVisitor {
    type Value = ObjectChildren;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of property keys to encoded values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, EncodedValue>()? {
            entries.push((key, value));
        }
        Ok(ObjectChildren(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integral_numbers_have_no_fraction() {
        assert_eq!(serde_json::to_value(EncodedValue::number(1.0)).unwrap(), json!({"type": "number", "value": 1}));
        assert_eq!(serde_json::to_string(&EncodedNumber::Finite(-0.0)).unwrap(), "0");
        assert_eq!(serde_json::to_string(&EncodedNumber::Finite(3.5)).unwrap(), "3.5");
        assert_eq!(serde_json::to_string(&EncodedNumber::Finite(1e300)).unwrap(), "1e+300");
    }

    #[test]
    fn sentinels_on_the_wire() {
        assert_eq!(serde_json::to_string(&EncodedNumber::from_f64(f64::INFINITY)).unwrap(), format!("\"{INFINITY}\""));
        assert_eq!(serde_json::to_string(&EncodedNumber::from_f64(f64::NEG_INFINITY)).unwrap(), format!("\"{NEGATIVE_INFINITY}\""));
        assert_eq!(serde_json::to_string(&EncodedNumber::from_f64(f64::NAN)).unwrap(), format!("\"{NAN}\""));
    }

    #[test]
    fn unknown_sentinel_is_rejected() {
        assert!(serde_json::from_str::<EncodedNumber>(r#""Infinity""#).is_err());
    }

    #[test]
    fn unit_variants_carry_only_the_tag() {
        assert_eq!(serde_json::to_value(EncodedValue::Null).unwrap(), json!({"type": "null"}));
        assert_eq!(serde_json::to_value(EncodedValue::Circular).unwrap(), json!({"type": "circular"}));
    }

    #[test]
    fn shallow_composites_omit_children() {
        let shallow = EncodedValue::Array { value: 3, children: None };
        assert_eq!(serde_json::to_value(&shallow).unwrap(), json!({"type": "array", "value": 3}));
    }

    #[test]
    fn object_children_keep_order() {
        let node = EncodedValue::Object {
            value: 2,
            children: Some(
                [("z", EncodedValue::number(1.0)), ("a", EncodedValue::number(2.0))]
                    .into_iter()
                    .collect(),
            ),
        };
        let text = serde_json::to_string(&node).unwrap();
        assert_eq!(
            text,
            r#"{"type":"object","value":2,"children":{"z":{"type":"number","value":1},"a":{"type":"number","value":2}}}"#
        );
    }
}
