//! Cell values and the record trait used to turn typed query results into
//! tables.

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// A single cell in a [`Table`](crate::Table)
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Date(d) => write!(f, "{}", d),
            FieldValue::DateTime(dt) => write!(f, "{}", dt),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(dt: NaiveDateTime) -> Self {
        FieldValue::DateTime(dt)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// A typed record that can become one row of a [`Table`](crate::Table).
///
/// Field order of the serialized struct becomes the column order.
///
/// # Example
///
/// ```ignore
/// use star_etl::Entity;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct AddressRecord {
///     address_id: i64,
///     city: Option<String>,
/// }
///
/// impl Entity for AddressRecord {
///     const NAME: &'static str = "AddressRecord";
/// }
/// ```
pub trait Entity: Serialize + Sized {
    /// The name of this entity type
    const NAME: &'static str;

    /// Convert the record to an ordered column -> value map
    fn to_dict(&self) -> IndexMap<String, FieldValue> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map
                .into_iter()
                .map(|(k, v)| (k, json_value_to_field_value(v)))
                .collect(),
            _ => IndexMap::new(),
        }
    }
}

/// Helper function to convert serde_json::Value to FieldValue
fn json_value_to_field_value(value: serde_json::Value) -> FieldValue {
    match value {
        serde_json::Value::String(s) => FieldValue::String(s),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                FieldValue::Int(i)
            } else if let Some(f) = n.as_f64() {
                FieldValue::Float(f)
            } else {
                FieldValue::Null
            }
        }
        serde_json::Value::Bool(b) => FieldValue::Bool(b),
        serde_json::Value::Null => FieldValue::Null,
        // Nested values are stored as their JSON text
        other => FieldValue::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct ProductLike {
        product_id: i64,
        name: String,
        category: Option<String>,
        price: f64,
    }

    impl Entity for ProductLike {
        const NAME: &'static str = "ProductLike";
    }

    #[test]
    fn test_entity_to_dict_keeps_field_order() {
        let record = ProductLike {
            product_id: 1,
            name: "A".to_string(),
            category: None,
            price: 9.99,
        };

        let dict = record.to_dict();
        let keys: Vec<&str> = dict.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["product_id", "name", "category", "price"]);
        assert_eq!(dict.get("product_id"), Some(&FieldValue::Int(1)));
        assert_eq!(dict.get("category"), Some(&FieldValue::Null));
        assert_eq!(dict.get("price"), Some(&FieldValue::Float(9.99)));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(FieldValue::from(None::<i64>), FieldValue::Null);
        assert_eq!(FieldValue::from(Some("x")), FieldValue::String("x".to_string()));
    }
}
