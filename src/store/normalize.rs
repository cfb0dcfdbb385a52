//! Structural collection detection and id-keyed normalization
//!
//! The store carries no "collection" marker. A node counts as a collection
//! when every non-metadata child is an object whose `id` stringifies to the
//! child's key. This is a heuristic: an entity whose fields all happen to be
//! objects keyed by their own ids looks exactly like a collection.

use serde_json::{Map, Value};

use super::metadata::METADATA_KEY;
use crate::endpoint::template::scalar_string;

/// Dictionary key for an entity: its stringified `id`
pub fn id_key(entity: &Value) -> Option<String> {
    entity.get("id").and_then(scalar_string)
}

/// Arrays and objects are relations, everything else is a scalar field
pub fn is_relation(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

/// Structural collection check (vacuously true for an empty object)
pub fn is_collection(value: &Value) -> bool {
    let Some(map) = value.as_object() else {
        return false;
    };
    map.iter()
        .filter(|(key, _)| key.as_str() != METADATA_KEY)
        .all(|(key, child)| child.is_object() && id_key(child).as_deref() == Some(key.as_str()))
}

/// Recursively convert arrays of id-bearing objects into id-keyed objects.
///
/// Arrays containing anything else stay arrays (their elements are still
/// normalized).
pub fn normalize_arrays(value: Value) -> Value {
    match value {
        Value::Array(items) => {
            let keyed = !items.is_empty()
                && items.iter().all(|item| item.is_object() && id_key(item).is_some());
            if keyed {
                let mut map = Map::new();
                for item in items {
                    if let Some(key) = id_key(&item) {
                        map.insert(key, normalize_arrays(item));
                    }
                }
                Value::Object(map)
            } else {
                Value::Array(items.into_iter().map(normalize_arrays).collect())
            }
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, child)| (key, normalize_arrays(child)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_collection() {
        assert!(is_collection(&json!({
            "1": { "id": 1, "name": "a" },
            "b7": { "id": "b7" },
            "_metadata": { "isFetching": false }
        })));
        assert!(!is_collection(&json!({ "1": { "id": 2 } })));
        assert!(!is_collection(&json!({ "id": 1, "child": { "id": 3 } })));
        assert!(!is_collection(&json!([{ "id": 1 }])));
        assert!(is_collection(&json!({})));
    }

    #[test]
    fn test_numeric_and_string_ids_share_keys() {
        assert_eq!(id_key(&json!({ "id": 1 })), Some("1".into()));
        assert_eq!(id_key(&json!({ "id": "1" })), Some("1".into()));
        assert_eq!(id_key(&json!({ "id": null })), None);
    }

    #[test]
    fn test_normalize_nested_arrays() {
        let normalized = normalize_arrays(json!({
            "id": 1,
            "posts": [
                { "id": 10, "comments": [{ "id": "c1" }] },
                { "id": 11, "comments": [] }
            ],
            "tags": ["x", "y"],
            "mixed": [{ "id": 1 }, { "name": "no id" }]
        }));

        assert_eq!(
            normalized,
            json!({
                "id": 1,
                "posts": {
                    "10": { "id": 10, "comments": { "c1": { "id": "c1" } } },
                    "11": { "id": 11, "comments": [] }
                },
                "tags": ["x", "y"],
                "mixed": [{ "id": 1 }, { "name": "no id" }]
            })
        );
    }
}
