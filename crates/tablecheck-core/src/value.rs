//! Kind-tagged document field values
//!
//! The document store exchanges fields as a map from field name to a
//! single-key object naming the value kind, e.g. `{"stringValue": "S-1"}`.
//! Integers travel as decimal strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};

/// Field map of a document
pub type Fields = BTreeMap<String, FieldValue>;

/// A single typed field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    #[serde(rename = "stringValue")]
    String(String),

    #[serde(rename = "integerValue", with = "integer_repr")]
    Integer(i64),

    #[serde(rename = "doubleValue")]
    Double(f64),

    #[serde(rename = "booleanValue")]
    Boolean(bool),

    #[serde(rename = "timestampValue")]
    Timestamp(DateTime<Utc>),

    #[serde(rename = "nullValue")]
    Null(NullValue),

    #[serde(rename = "arrayValue")]
    Array(ArrayValue),

    #[serde(rename = "mapValue")]
    Map(MapValue),
}

/// Marker serialized as JSON `null`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullValue;

/// Array payload: `{"values": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<FieldValue>,
}

/// Map payload: `{"fields": {...}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: Fields,
}

impl FieldValue {
    /// Name of the wire tag for this value's kind
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::String(_) => "stringValue",
            FieldValue::Integer(_) => "integerValue",
            FieldValue::Double(_) => "doubleValue",
            FieldValue::Boolean(_) => "booleanValue",
            FieldValue::Timestamp(_) => "timestampValue",
            FieldValue::Null(_) => "nullValue",
            FieldValue::Array(_) => "arrayValue",
            FieldValue::Map(_) => "mapValue",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Convert arbitrary JSON into a field value
    ///
    /// Integral numbers become `integerValue`, other numbers `doubleValue`,
    /// arrays and objects recurse.
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => FieldValue::Null(NullValue),
            Value::Bool(b) => FieldValue::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FieldValue::String(s),
            Value::Array(items) => FieldValue::Array(ArrayValue {
                values: items.into_iter().map(FieldValue::from_json).collect(),
            }),
            Value::Object(map) => FieldValue::Map(MapValue {
                fields: fields_from_json(map),
            }),
        }
    }
}

/// Convert a JSON object into a field map
pub fn fields_from_json(object: serde_json::Map<String, serde_json::Value>) -> Fields {
    object
        .into_iter()
        .map(|(key, value)| (key, FieldValue::from_json(value)))
        .collect()
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

/// A document as returned by the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name (`projects/.../documents/<collection>/<id>`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub fields: Fields,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// Decode a document from a raw response body
    pub fn from_body(body: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(body.clone()).ok()
    }

    /// Look up a field that must be present
    pub fn field(&self, name: &str) -> Result<&FieldValue> {
        self.fields
            .get(name)
            .ok_or_else(|| CoreError::MissingField(name.to_string()))
    }

    /// Look up a boolean field
    pub fn bool_field(&self, name: &str) -> Result<bool> {
        let value = self.field(name)?;
        value.as_bool().ok_or_else(|| CoreError::FieldKind {
            field: name.to_string(),
            expected: "booleanValue",
            actual: value.kind(),
        })
    }
}

mod integer_repr {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(i64),
    }

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_serialized_as_string() {
        let value = FieldValue::Integer(11);
        assert_eq!(serde_json::to_value(&value).unwrap(), json!({"integerValue": "11"}));
    }

    #[test]
    fn test_integer_accepts_number_or_string() {
        let from_text: FieldValue = serde_json::from_value(json!({"integerValue": "42"})).unwrap();
        let from_number: FieldValue = serde_json::from_value(json!({"integerValue": 42})).unwrap();
        assert_eq!(from_text, FieldValue::Integer(42));
        assert_eq!(from_number, FieldValue::Integer(42));
    }

    #[test]
    fn test_null_value_wire_shape() {
        let value = FieldValue::Null(NullValue);
        assert_eq!(serde_json::to_value(&value).unwrap(), json!({"nullValue": null}));
    }

    #[test]
    fn test_from_json_nested() {
        let value = FieldValue::from_json(json!({
            "nome": "Antipasti",
            "ordine": 1,
            "prezzo": 4.5,
            "tags": ["veg", true],
            "note": null
        }));

        let FieldValue::Map(map) = value else {
            panic!("expected mapValue");
        };
        assert_eq!(map.fields["nome"], FieldValue::String("Antipasti".into()));
        assert_eq!(map.fields["ordine"], FieldValue::Integer(1));
        assert_eq!(map.fields["prezzo"], FieldValue::Double(4.5));
        assert_eq!(map.fields["note"], FieldValue::Null(NullValue));
        assert_eq!(
            map.fields["tags"],
            FieldValue::Array(ArrayValue {
                values: vec![FieldValue::String("veg".into()), FieldValue::Boolean(true)],
            })
        );
    }

    #[test]
    fn test_document_from_store_body() {
        let body = json!({
            "name": "projects/p/databases/(default)/documents/sessions/abc",
            "fields": {
                "active": {"booleanValue": true},
                "tableNumber": {"integerValue": "11"},
                "createdAt": {"timestampValue": "2026-10-18T09:30:00.125Z"}
            },
            "createTime": "2026-10-18T09:30:00.200000Z",
            "updateTime": "2026-10-18T09:30:00.200000Z"
        });

        let doc = Document::from_body(&body).expect("document should decode");
        assert!(doc.bool_field("active").unwrap());
        assert_eq!(doc.field("tableNumber").unwrap().as_integer(), Some(11));
        assert!(doc.field("createdAt").unwrap().as_timestamp().is_some());
        assert!(matches!(doc.field("code"), Err(CoreError::MissingField(_))));
    }

    #[test]
    fn test_bool_field_wrong_kind() {
        let mut doc = Document::default();
        doc.fields.insert("active".into(), FieldValue::from("yes"));

        match doc.bool_field("active") {
            Err(CoreError::FieldKind { expected, actual, .. }) => {
                assert_eq!(expected, "booleanValue");
                assert_eq!(actual, "stringValue");
            }
            other => panic!("expected FieldKind error, got {:?}", other),
        }
    }
}
