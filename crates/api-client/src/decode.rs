//! Network payload to domain entity conversion
//!
//! The wire shape is a JSON array of objects. Each object carries an
//! identifier field; every other field becomes part of the entity payload.
//! Database shape is the store's concern, so nothing here knows about
//! columns.

use crate::error::{RemoteError, RemoteResult};
use chrono::{DateTime, Utc};
use larder_core::entity::{Entity, EntityId, Payload};
use serde_json::Value;

/// One entry as received from the network
pub type RemoteEntry = serde_json::Map<String, Value>;

/// Decode a response body into entities stamped with `refreshed_at`
pub fn decode_entities(
    body: &[u8],
    id_field: &str,
    refreshed_at: DateTime<Utc>,
) -> RemoteResult<Vec<Entity>> {
    let value: Value = serde_json::from_slice(body)?;
    let Value::Array(items) = value else {
        return Err(RemoteError::payload(format!(
            "expected a JSON array, got {}",
            kind_of(&value)
        )));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(entry) => to_entity(entry, id_field, refreshed_at)
                .map_err(|msg| RemoteError::payload(format!("entry {index}: {msg}"))),
            other => Err(RemoteError::payload(format!(
                "entry {index}: expected an object, got {}",
                kind_of(&other)
            ))),
        })
        .collect()
}

/// Convert one entry, splitting off the identifier
pub fn to_entity(
    mut entry: RemoteEntry,
    id_field: &str,
    refreshed_at: DateTime<Utc>,
) -> Result<Entity, String> {
    let raw_id = entry
        .remove(id_field)
        .ok_or_else(|| format!("missing identifier field {id_field:?}"))?;
    let id = EntityId::from_json(&raw_id)
        .ok_or_else(|| format!("identifier {raw_id} is not a string or integer"))?;

    let payload: Payload = entry;
    Ok(Entity::new(id, payload).with_refreshed_at(refreshed_at))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
