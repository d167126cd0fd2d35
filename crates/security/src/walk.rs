//! One recursive walk over JSON trees, shared by redaction and masking.

use serde_json::{Map, Value};

/// Rebuild `value`, keeping only object keys accepted by `keep_key` and
/// passing every string leaf through `leaf`.
///
/// Arrays keep their order and length. Numbers, booleans and nulls are
/// copied as-is.
pub fn walk<K, S>(value: &Value, keep_key: &K, leaf: &S) -> Value
where
    K: Fn(&str) -> bool,
    S: Fn(&str) -> String,
{
    match value {
        Value::Object(map) => Value::Object(walk_map(map, keep_key, leaf)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| walk(v, keep_key, leaf)).collect())
        }
        Value::String(s) => Value::String(leaf(s)),
        scalar => scalar.clone(),
    }
}

/// [`walk`] for a top-level object.
pub fn walk_map<K, S>(map: &Map<String, Value>, keep_key: &K, leaf: &S) -> Map<String, Value>
where
    K: Fn(&str) -> bool,
    S: Fn(&str) -> String,
{
    map.iter()
        .filter(|(k, _)| keep_key(k))
        .map(|(k, v)| (k.clone(), walk(v, keep_key, leaf)))
        .collect()
}
