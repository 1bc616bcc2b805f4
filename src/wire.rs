//! # Wire Serialization
//!
//! The outgoing direction: live values back into Potion JSON.
//!
//! | In memory | On the wire |
//! |-----------|-------------|
//! | [`Entity`] | `{"$ref": "<prefix><uri>"}` |
//! | date | `{"$date": <epoch millis>}` |
//! | array | element-wise |
//! | object / schema | keys converted to `snake_case` |
//! | lazy value | its loaded value, else its `$ref`, else `null` |

use serde_json::{json, Map, Value as Json};

use crate::config::PotionConfig;
use crate::entity::Entity;
use crate::lazy::LazyValue;
use crate::naming::key_to_wire;
use crate::value::{Properties, Value};

/// Encodes live values for request bodies and query strings.
#[derive(Debug, Clone, Copy)]
pub struct WireEncoder<'a> {
    config: &'a PotionConfig,
}

impl<'a> WireEncoder<'a> {
    pub fn new(config: &'a PotionConfig) -> Self {
        Self { config }
    }

    pub fn encode(&self, value: &Value) -> Json {
        match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => Json::Number(n.clone()),
            Value::String(s) => Json::String(s.clone()),
            Value::Date(date) => json!({ "$date": date.timestamp_millis() }),
            Value::Array(items) => Json::Array(items.iter().map(|v| self.encode(v)).collect()),
            Value::Object(props) => Json::Object(self.encode_properties(props)),
            Value::Schema(schema) => schema_to_wire(schema),
            Value::Entity(entity) => self.reference(entity.uri()),
            Value::Lazy(lazy) => self.encode_lazy(lazy).unwrap_or(Json::Null),
        }
    }

    /// Encodes a property map, converting keys to `snake_case`.
    pub fn encode_properties(&self, props: &Properties) -> Map<String, Json> {
        props
            .iter()
            .map(|(key, value)| (key_to_wire(key), self.encode(value)))
            .collect()
    }

    /// A `$ref` to `uri`, with the global prefix added if it is missing.
    pub fn reference(&self, uri: &str) -> Json {
        json!({ "$ref": self.config.with_prefix(uri) })
    }

    /// The write payload of an entity.
    ///
    /// Identity is carried by the request URI, so `$uri`/`$id` are not included.
    /// Properties marked readonly on the resource type are left out, as are lazy
    /// properties that were never loaded and have no reference.
    pub fn entity_payload(&self, entity: &Entity) -> Json {
        let resource = entity.resource();
        let mut payload = Map::new();
        for (key, value) in entity.properties() {
            if resource.is_readonly(&key) {
                continue;
            }
            let encoded = match &value {
                Value::Lazy(lazy) => match self.encode_lazy(lazy) {
                    Some(encoded) => encoded,
                    None => continue,
                },
                other => self.encode(other),
            };
            payload.insert(key_to_wire(&key), encoded);
        }
        Json::Object(payload)
    }

    fn encode_lazy(&self, lazy: &LazyValue) -> Option<Json> {
        match lazy.peek() {
            Some(Ok(value)) => Some(self.encode(&value)),
            _ => lazy.reference().map(|uri| self.reference(uri)),
        }
    }
}

fn schema_to_wire(schema: &Json) -> Json {
    match schema {
        Json::Array(items) => Json::Array(items.iter().map(schema_to_wire).collect()),
        Json::Object(map) => Json::Object(
            map.iter()
                .map(|(k, v)| (key_to_wire(k), schema_to_wire(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{EntityId, Registry, ResourceOptions};
    use chrono::{TimeZone, Utc};

    fn user() -> Entity {
        let mut registry = Registry::new();
        let resource = registry
            .register("/user", ResourceOptions::new().readonly(["createdAt"]))
            .unwrap();
        Entity::new(resource, "/user/1".into(), EntityId::Int(1))
    }

    #[test]
    fn test_encode_values() {
        let config = PotionConfig::default().prefix("/api");
        let encoder = WireEncoder::new(&config);
        let date = Utc.timestamp_millis_opt(1451060269000).unwrap();

        let value = Value::object([
            ("firstName", Value::from("John")),
            ("birthDate", Value::from(date)),
            ("friends", Value::Array(vec![Value::Entity(user())])),
        ]);

        assert_eq!(
            encoder.encode(&value),
            json!({
                "first_name": "John",
                "birth_date": {"$date": 1451060269000_i64},
                "friends": [{"$ref": "/api/user/1"}],
            })
        );
    }

    #[test]
    fn test_reference_prefix_not_doubled() {
        let config = PotionConfig::default().prefix("/api");
        let encoder = WireEncoder::new(&config);
        assert_eq!(encoder.reference("/api/user/1"), json!({"$ref": "/api/user/1"}));
        assert_eq!(encoder.reference("/user/1"), json!({"$ref": "/api/user/1"}));
    }

    #[test]
    fn test_entity_payload_omits_readonly() {
        let config = PotionConfig::default();
        let encoder = WireEncoder::new(&config);
        let entity = user();
        entity.set("name", "John Doe");
        entity.set("createdAt", Utc.timestamp_millis_opt(0).unwrap());
        entity.set("bestFriend", user());

        assert_eq!(
            encoder.entity_payload(&entity),
            json!({"name": "John Doe", "best_friend": {"$ref": "/user/1"}})
        );
    }
}
