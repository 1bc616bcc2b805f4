//! # Live Values
//!
//! [`Value`] is what a resolved payload turns into. It mirrors JSON, plus the
//! things Potion markers stand for: dates (`$date`), schema blocks
//! (`$schema`), resource instances (`$uri`, `$ref`) and lazily resolved
//! properties.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Number;

use crate::entity::Entity;
use crate::lazy::LazyValue;

/// Ordered in-memory properties, keyed by camelCase name.
pub type Properties = IndexMap<String, Value>;

/// A resolved value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    /// A plain structured value, not a resource.
    Object(Properties),
    /// A `$schema` block, key-cased but otherwise untouched.
    Schema(serde_json::Value),
    Entity(Entity),
    Lazy(LazyValue),
}

impl Value {
    /// Builds a plain object from key/value pairs.
    pub fn object<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Object(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Properties> {
        match self {
            Value::Object(props) => Some(props),
            _ => None,
        }
    }

    pub fn as_schema(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Schema(schema) => Some(schema),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Value::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_lazy(&self) -> Option<&LazyValue> {
        match self {
            Value::Lazy(lazy) => Some(lazy),
            _ => None,
        }
    }

    pub fn into_entity(self) -> Option<Entity> {
        match self {
            Value::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up `key` on a plain object or an entity.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(props) => props.get(key).cloned(),
            Value::Entity(entity) => entity.get(key),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(date: DateTime<Utc>) -> Self {
        Value::Date(date)
    }
}

impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        Value::Entity(entity)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Properties> for Value {
    fn from(props: Properties) -> Self {
        Value::Object(props)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Plain conversion: markers are not interpreted and keys are kept as given.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_conversion_keeps_keys() {
        let value = Value::from(json!({"created_at": 1, "tags": ["a", "b"], "$ref": "/x/1"}));
        let props = value.as_object().unwrap();

        assert_eq!(props.get("created_at").unwrap().as_i64(), Some(1));
        assert_eq!(props.get("$ref").unwrap().as_str(), Some("/x/1"));
        assert_eq!(value.get("tags").unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_object_builder() {
        let value = Value::object([("name", Value::from("John")), ("age", Value::from(3))]);
        assert_eq!(value.get("name").unwrap().as_str(), Some("John"));
        assert_eq!(value.get("missing"), None);
        assert!(Value::from(Option::<i64>::None).is_null());
        assert!(Value::from(f64::NAN).is_null());
    }
}
