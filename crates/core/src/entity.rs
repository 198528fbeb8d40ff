//! Domain model: entities, identifiers and snapshots
//!
//! An [`Entity`] is a uniquely identified record with a free-form payload
//! and the time it was last refreshed. Identity never changes after
//! construction; the payload is replaced wholesale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Named payload fields of an entity
pub type Payload = serde_json::Map<String, Value>;

/// Stable entity identifier
///
/// Remote sources may send identifiers as strings or integers; both are
/// normalised to the decimal string form so `1` and `"1"` name the same row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create an identifier from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Interpret a JSON value as an identifier
    ///
    /// Accepts non-empty strings and integers. Floats, booleans, objects
    /// and empty strings are not identifiers.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self(n.to_string())),
            _ => None,
        }
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl From<u64> for EntityId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).ok_or_else(|| {
            serde::de::Error::custom(format!("expected a string or integer id, got {value}"))
        })
    }
}

/// A uniquely identified record with a payload and refresh timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    payload: Payload,
    refreshed_at: DateTime<Utc>,
}

impl Entity {
    /// Create an entity stamped with the current time
    pub fn new(id: impl Into<EntityId>, payload: Payload) -> Self {
        Self {
            id: id.into(),
            payload,
            refreshed_at: Utc::now(),
        }
    }

    /// Builder-style method to set the refresh timestamp
    #[must_use]
    pub fn with_refreshed_at(mut self, at: DateTime<Utc>) -> Self {
        self.refreshed_at = at;
        self
    }

    /// Entity identifier
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// Payload fields
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// When this entity was last written from a refresh or mutation
    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    /// Look up a single payload field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// Replace the payload, keeping the identity
    pub fn replace_payload(&mut self, payload: Payload, at: DateTime<Utc>) {
        self.payload = payload;
        self.refreshed_at = at;
    }

    /// Compare id and payload, ignoring the refresh timestamp
    pub fn same_content(&self, other: &Entity) -> bool {
        self.id == other.id && self.payload == other.payload
    }

    /// Split into identifier, payload and timestamp
    pub fn into_parts(self) -> (EntityId, Payload, DateTime<Utc>) {
        (self.id, self.payload, self.refreshed_at)
    }
}

/// Full ordered contents of a collection at one point in time
///
/// `version` increases by one for every applied mutation, so observers can
/// tell snapshots apart and confirm they arrive in mutation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub version: u64,
    pub entities: Vec<Entity>,
}

impl Snapshot {
    /// Create a snapshot
    pub fn new(version: u64, entities: Vec<Entity>) -> Self {
        Self { version, entities }
    }

    /// Find an entity by id
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    /// Identifiers in snapshot order
    pub fn ids(&self) -> Vec<&EntityId> {
        self.entities.iter().map(Entity::id).collect()
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the snapshot holds no entities
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Build a payload from `(name, value)` pairs
///
/// ```rust
/// use larder_core::entity::payload;
/// use serde_json::json;
///
/// let p = payload([("name", json!("A"))]);
/// assert_eq!(p["name"], "A");
/// ```
pub fn payload<I, K>(fields: I) -> Payload
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    fields.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_from_json_normalises_integers() {
        assert_eq!(EntityId::from_json(&json!(1)), Some(EntityId::from("1")));
        assert_eq!(EntityId::from_json(&json!("1")), Some(EntityId::from("1")));
        assert_eq!(EntityId::from_json(&json!(-7)), Some(EntityId::from("-7")));
    }

    #[test]
    fn test_id_from_json_rejects_non_identifiers() {
        assert!(EntityId::from_json(&json!(1.5)).is_none());
        assert!(EntityId::from_json(&json!("")).is_none());
        assert!(EntityId::from_json(&json!(null)).is_none());
        assert!(EntityId::from_json(&json!({"id": 1})).is_none());
    }

    #[test]
    fn test_id_deserialize() {
        let id: EntityId = serde_json::from_str("42").unwrap();
        assert_eq!(id.as_str(), "42");
        assert!(serde_json::from_str::<EntityId>("true").is_err());
    }

    #[test]
    fn test_replace_payload_keeps_identity() {
        let mut entity = Entity::new(1i64, payload([("name", json!("A"))]));
        let later = entity.refreshed_at() + chrono::Duration::seconds(5);

        entity.replace_payload(payload([("name", json!("B"))]), later);

        assert_eq!(entity.id().as_str(), "1");
        assert_eq!(entity.field("name"), Some(&json!("B")));
        assert_eq!(entity.refreshed_at(), later);
    }

    #[test]
    fn test_same_content_ignores_timestamp() {
        let a = Entity::new("x", payload([("n", json!(1))]));
        let b = a
            .clone()
            .with_refreshed_at(a.refreshed_at() + chrono::Duration::minutes(1));
        assert!(a.same_content(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_snapshot_lookup() {
        let snapshot = Snapshot::new(
            3,
            vec![
                Entity::new("1", payload([("name", json!("A"))])),
                Entity::new("2", payload([("name", json!("C"))])),
            ],
        );

        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot.get(&EntityId::from("2")).and_then(|e| e.field("name")),
            Some(&json!("C"))
        );
        assert_eq!(snapshot.ids(), vec![&EntityId::from("1"), &EntityId::from("2")]);
    }
}
