//! Folding lifecycle events into the store
//!
//! `apply` never mutates its input: it returns the next store value, so a
//! reader holding the previous value never observes a half-applied event.

use serde_json::{json, Map, Value};

use super::metadata::{now_millis, FetchMetadata, METADATA_KEY};
use super::normalize::{is_collection, is_relation, normalize_arrays};
use super::path;
use crate::fetch::LifecycleEvent;

/// Apply one event, stamping successful fetches with the current time
pub fn apply(state: &Value, event: &LifecycleEvent) -> Value {
    apply_at(state, event, now_millis())
}

/// Apply one event with an explicit timestamp (Unix millis)
pub fn apply_at(state: &Value, event: &LifecycleEvent, now_ms: i64) -> Value {
    let Some(store_path) = event.store_path() else {
        return state.clone();
    };

    let mut next = state.clone();
    let current = node_at(state, store_path);

    let node = match event {
        LifecycleEvent::KeyRemoval { .. } => {
            path::remove_at(&mut next, store_path);
            return next;
        }
        LifecycleEvent::Requested { .. } => {
            let meta = FetchMetadata::of(&current).unwrap_or_default().requested();
            with_metadata(current, &meta)
        }
        LifecycleEvent::ResultReceived { data, .. } => {
            let merged = match normalize_arrays(data.clone()) {
                incoming @ Value::Object(_) => merge_value(&current, &incoming),
                // positions replace whatever the node held before
                Value::Array(items) => index_keyed(items),
                other => merge_value(&current, &json!({ "response": other })),
            };
            with_metadata(merged, &FetchMetadata::received(now_ms))
        }
        LifecycleEvent::TryFailed { error, .. } | LifecycleEvent::Failed { error, .. } => {
            let error = (!error.is_null()).then(|| error.clone());
            let meta = FetchMetadata::of(&current).unwrap_or_default().failed(error);
            with_metadata(current, &meta)
        }
        _ => return next,
    };

    path::set_at(&mut next, store_path, node);
    next
}

/// Existing node as an object, `{}` when absent
fn node_at(state: &Value, store_path: &str) -> Value {
    match path::value_at(state, store_path) {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        Some(Value::Null) | None => Value::Object(Map::new()),
        Some(other) => json!({ "response": other }),
    }
}

/// `["a", "b"]` as `{ "0": "a", "1": "b" }` so the node can carry metadata
fn index_keyed(items: Vec<Value>) -> Value {
    Value::Object(
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (i.to_string(), item))
            .collect(),
    )
}

fn with_metadata(mut node: Value, meta: &FetchMetadata) -> Value {
    if let Value::Object(map) = &mut node {
        map.insert(METADATA_KEY.to_string(), meta.to_value());
    }
    node
}

/// Merge an incoming payload onto the current node.
///
/// Incoming fields win and scalars the payload leaves out are dropped.
/// Relations (objects/arrays) the payload does not mention are carried
/// forward, unless either side is a collection: then the payload is the
/// authoritative member list and missing members are dropped. Relations
/// present on both sides are merged recursively.
pub fn merge_value(current: &Value, incoming: &Value) -> Value {
    let (Value::Object(current_map), Value::Object(incoming_map)) = (current, incoming) else {
        return incoming.clone();
    };

    let authoritative = is_collection(current) || is_collection(incoming);
    let mut out = Map::new();

    for (key, value) in current_map {
        if incoming_map.contains_key(key) {
            continue;
        }
        let keep = if key == METADATA_KEY {
            true
        } else {
            is_relation(value) && !authoritative
        };
        if keep {
            out.insert(key.clone(), value.clone());
        }
    }

    for (key, value) in incoming_map {
        let merged = match current_map.get(key) {
            Some(existing) if key != METADATA_KEY && is_relation(existing) => {
                merge_value(existing, value)
            }
            _ => value.clone(),
        };
        out.insert(key.clone(), merged);
    }

    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn received(path: &str, data: Value) -> LifecycleEvent {
        LifecycleEvent::ResultReceived {
            store_path: Some(path.into()),
            guid: None,
            data,
        }
    }

    #[test]
    fn test_event_without_store_path_is_ignored() {
        let state = json!({ "users": {} });
        let event = LifecycleEvent::TransientResultReceived {
            guid: Some("g".into()),
            data: json!({ "id": 1 }),
        };
        assert_eq!(apply_at(&state, &event, NOW), state);
    }

    #[test]
    fn test_requested_preserves_data_and_fetched_at() {
        let state = json!({
            "users": { "1": {
                "id": 1,
                "data": { "name": "Ann" },
                "_metadata": { "isFetching": false, "hasError": true, "lastFetchError": "boom", "fetchedAt": 5 }
            } }
        });
        let event = LifecycleEvent::Requested {
            store_path: Some("users.1".into()),
            guid: None,
        };

        let next = apply_at(&state, &event, NOW);
        assert_eq!(
            next,
            json!({
                "users": { "1": {
                    "id": 1,
                    "data": { "name": "Ann" },
                    "_metadata": { "isFetching": true, "hasError": false, "fetchedAt": 5 }
                } }
            })
        );
        // input untouched
        assert_eq!(state["users"]["1"]["_metadata"]["hasError"], json!(true));
    }

    #[test]
    fn test_requested_on_empty_store_creates_node() {
        let next = apply_at(
            &json!({}),
            &LifecycleEvent::Requested {
                store_path: Some("users.5.posts".into()),
                guid: None,
            },
            NOW,
        );
        assert_eq!(
            next,
            json!({ "users": { "5": { "posts": {
                "_metadata": { "isFetching": true, "hasError": false }
            } } } })
        );
    }

    #[test]
    fn test_result_preserves_untouched_relations() {
        let state = json!({ "me": { "id": 1, "child": { "x": 1, "deep": [1, 2] } } });
        let next = apply_at(&state, &received("me", json!({ "id": 1, "name": "Bob" })), NOW);

        assert_eq!(
            next,
            json!({ "me": {
                "id": 1,
                "name": "Bob",
                "child": { "x": 1, "deep": [1, 2] },
                "_metadata": { "isFetching": false, "hasError": false, "fetchedAt": NOW }
            } })
        );
    }

    #[test]
    fn test_collection_refresh_prunes_members_and_keeps_nested_relations() {
        let member = |id: i64| {
            json!({
                "id": id,
                "name": format!("user {}", id),
                "_metadata": { "isFetching": false, "hasError": false, "fetchedAt": 1 }
            })
        };

        let state = json!({ "users": {
            "1": { "id": 1, "name": "user 1", "posts": { "10": { "id": 10 } } },
            "2": { "id": 2, "name": "user 2", "posts": { "20": { "id": 20 } } },
            "3": { "id": 3, "name": "user 3" }
        } });

        let next = apply_at(
            &state,
            &received("users", json!({ "1": member(1), "2": member(2) })),
            NOW,
        );

        let users = &next["users"];
        assert!(users.get("3").is_none());
        assert_eq!(users["1"]["posts"], json!({ "10": { "id": 10 } }));
        assert_eq!(users["2"]["posts"], json!({ "20": { "id": 20 } }));
        assert_eq!(users["1"]["_metadata"]["fetchedAt"], json!(1));
        assert_eq!(users["_metadata"]["fetchedAt"], json!(NOW));
    }

    #[test]
    fn test_empty_collection_result_drops_all_members() {
        let state = json!({ "users": { "1": { "id": 1 }, "2": { "id": 2 } } });
        let next = apply_at(&state, &received("users", json!([])), NOW);
        assert_eq!(
            next["users"],
            json!({ "_metadata": { "isFetching": false, "hasError": false, "fetchedAt": NOW } })
        );
    }

    #[test]
    fn test_omitted_scalars_are_cleared() {
        let state = json!({ "me": { "id": 1, "nickname": "old", "child": { "x": 1 } } });
        let next = apply_at(&state, &received("me", json!({ "id": 1, "name": "Bob" })), NOW);

        let me = next["me"].as_object().unwrap();
        assert!(!me.contains_key("nickname"));
        assert_eq!(me["name"], json!("Bob"));
        assert_eq!(me["child"], json!({ "x": 1 }));
    }

    #[test]
    fn test_plain_array_result_keyed_by_position() {
        let state = json!({ "tags": { "0": "x", "1": "y", "2": "z", "3": { "stale": true } } });
        let next = apply_at(&state, &received("tags", json!(["a", "b"])), NOW);
        assert_eq!(
            next["tags"],
            json!({
                "0": "a",
                "1": "b",
                "_metadata": { "isFetching": false, "hasError": false, "fetchedAt": NOW }
            })
        );
        assert!(next["tags"].get("response").is_none());

        let next = apply_at(&json!({}), &received("notes", json!([{ "text": "hi" }])), NOW);
        assert_eq!(next["notes"]["0"], json!({ "text": "hi" }));
    }

    #[test]
    fn test_nested_arrays_normalized_before_merge() {
        let state = json!({ "users": { "1": { "id": 1, "posts": { "10": { "id": 10, "title": "old", "comments": { "c": { "id": "c" } } } } } } });
        let next = apply_at(
            &state,
            &received(
                "users.1",
                json!({ "id": 1, "posts": [{ "id": 10, "title": "new" }, { "id": 11, "title": "other" }] }),
            ),
            NOW,
        );

        let posts = &next["users"]["1"]["posts"];
        assert_eq!(posts["10"]["title"], json!("new"));
        assert_eq!(posts["10"]["comments"], json!({ "c": { "id": "c" } }));
        assert_eq!(posts["11"]["title"], json!("other"));
    }

    #[test]
    fn test_scalar_result_is_wrapped() {
        let next = apply_at(&json!({}), &received("health", json!("OK")), NOW);
        assert_eq!(next["health"]["response"], json!("OK"));
        assert_eq!(next["health"]["_metadata"]["fetchedAt"], json!(NOW));
    }

    #[test]
    fn test_failure_keeps_data_and_fetched_at() {
        let state = json!({ "me": {
            "id": 1,
            "name": "Ann",
            "_metadata": { "isFetching": true, "hasError": false, "fetchedAt": 5 }
        } });
        let error = json!({ "title": "Error", "message": "Bad Gateway", "code": 502 });

        for event in [
            LifecycleEvent::TryFailed { store_path: Some("me".into()), guid: None, error: error.clone() },
            LifecycleEvent::Failed { store_path: Some("me".into()), guid: None, error: error.clone() },
        ] {
            let next = apply_at(&state, &event, NOW);
            assert_eq!(next["me"]["name"], json!("Ann"));
            assert_eq!(
                next["me"]["_metadata"],
                json!({ "isFetching": false, "hasError": true, "lastFetchError": error, "fetchedAt": 5 })
            );
        }
    }

    #[test]
    fn test_key_removal_deletes_subtree() {
        let state = json!({ "users": { "1": { "id": 1 }, "tmp-1": { "title": "draft" } } });
        let next = apply_at(
            &state,
            &LifecycleEvent::KeyRemoval {
                store_path: Some("users.tmp-1".into()),
                guid: Some("tmp-1".into()),
            },
            NOW,
        );
        assert_eq!(next, json!({ "users": { "1": { "id": 1 } } }));
    }

    #[test]
    fn test_numeric_and_string_keys_are_identical() {
        let state = json!({ "users": { "1": { "id": "1", "name": "a" } } });
        let next = apply_at(&state, &received("users", json!([{ "id": 1, "name": "b" }])), NOW);
        assert_eq!(next["users"]["1"]["name"], json!("b"));
        assert_eq!(next["users"].as_object().unwrap().len(), 2);
    }
}
