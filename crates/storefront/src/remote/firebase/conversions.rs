//! Conversions from raw Realtime Database JSON into typed records.
//!
//! The database has no arrays in the usual sense: a collection comes back as
//! an object keyed by push id, as an array when keys happen to be dense
//! integers (with `null` holes), or as `null` when the path is empty.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::remote::Collection;

/// Decode every document in a collection snapshot.
///
/// Documents without an `id` field take their database key. Malformed
/// documents are skipped with a warning rather than failing the collection.
pub(super) fn decode_collection<T: DeserializeOwned>(collection: Collection, value: Value) -> Vec<T> {
    let entries: Vec<(String, Value)> = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, doc)| !doc.is_null())
            .map(|(index, doc)| (index.to_string(), doc))
            .collect(),
        Value::Object(map) => map.into_iter().collect(),
        other => {
            warn!(%collection, kind = %json_kind(&other), "collection snapshot is not a list");
            Vec::new()
        }
    };

    entries
        .into_iter()
        .filter_map(|(key, mut doc)| {
            if let Value::Object(fields) = &mut doc {
                fields.entry("id").or_insert(Value::String(key.clone()));
            }
            match serde_json::from_value(doc) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(%collection, key = %key, error = %e, "skipping malformed document");
                    None
                }
            }
        })
        .collect()
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
