//! Shaping successful results before they reach the store

use serde_json::{Map, Value};

use crate::endpoint::{Method, RequestPlan};
use crate::store::metadata::{FetchMetadata, METADATA_KEY};
use crate::store::normalize::id_key;

/// Store change derived from a successful response
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Settled {
    Store { path: String, data: Value },
    Remove { path: String },
}

/// Turn a successful payload into the store changes it implies.
///
/// - `DELETE` on a collection removes the node
/// - member fetches and non-collection endpoints store the payload as is
/// - creates store the payload under its new id and drop the temporary guid entry
/// - full collection reads are keyed by id, each member stamped with fresh metadata
pub(crate) fn settle(plan: &RequestPlan, data: Option<Value>, now_ms: i64) -> Vec<Settled> {
    let data = attach_guid(data.unwrap_or(Value::Null), plan.guid.as_deref());
    let path = plan.store_path.clone();

    if !plan.is_collection {
        return vec![Settled::Store { path, data }];
    }
    if plan.method == Method::Delete {
        return vec![Settled::Remove { path }];
    }
    if plan.is_collection_item_create {
        return match id_key(&data) {
            Some(id) => vec![
                Settled::Store {
                    path: format!("{}.{}", plan.parent_store_path(), id),
                    data,
                },
                Settled::Remove { path },
            ],
            None => vec![Settled::Store { path, data }],
        };
    }
    if plan.is_collection_item_fetch {
        return vec![Settled::Store { path, data }];
    }

    vec![Settled::Store {
        path,
        data: key_by_id(data, now_ms),
    }]
}

fn attach_guid(mut data: Value, guid: Option<&str>) -> Value {
    if let (Some(guid), Value::Object(map)) = (guid, &mut data) {
        map.insert("guid".to_string(), Value::String(guid.to_string()));
    }
    data
}

/// Array or object of entities into `{ id: entity }`, stamping metadata
fn key_by_id(data: Value, now_ms: i64) -> Value {
    let entries: Vec<(Option<String>, Value)> = match data {
        Value::Array(items) => items.into_iter().map(|item| (None, item)).collect(),
        Value::Object(map) => map
            .into_iter()
            .filter(|(key, _)| key != METADATA_KEY)
            .map(|(key, item)| (Some(key), item))
            .collect(),
        other => return other,
    };

    let meta = FetchMetadata::received(now_ms).to_value();
    let mut keyed = Map::new();
    for (fallback_key, mut item) in entries {
        let Some(key) = id_key(&item).or(fallback_key) else {
            tracing::debug!("Skipping collection element without id");
            continue;
        };
        match &mut item {
            Value::Object(fields) => {
                fields.insert(METADATA_KEY.to_string(), meta.clone());
            }
            _ => {
                tracing::debug!(key = %key, "Skipping non-object collection element");
                continue;
            }
        }
        keyed.insert(key, item);
    }
    Value::Object(keyed)
}
