//! Endpoint resolution
//!
//! Turns a dotted model name plus the endpoint tree into a concrete request
//! plan: URL, method, headers, body and the canonical store path with
//! collection ids substituted.
//!
//! For collection trees the URL is synthesized level by level:
//! - the root level contributes its fetch path, or `<api_prefix>/<segment>`
//! - a level below a collection inserts an `{:id}` placeholder first, and
//!   the store path gets a matching id segment
//! - a nested relative path (or the bare segment) is appended, an absolute
//!   path (leading `/`) replaces everything accumulated so far
//!
//! Ids consumed by levels before an absolute reset drop out of the URL but
//! still fill the store path.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::mapping::{EndpointTree, Level};
use super::request::{Method, RequestBody, RequestDescriptor};
use super::template::{self, Piece};
use crate::config::RestConfig;
use crate::error::{RestError, Result};

/// Concrete request produced by [`resolve`]
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPlan {
    pub model_name: String,
    pub url: String,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
    pub query_params: BTreeMap<String, String>,
    pub content_type: Option<String>,
    /// Dotted store location with ids (and a create guid) substituted
    pub store_path: String,
    pub guid: Option<String>,
    /// The endpoint's last level is a collection
    pub is_collection: bool,
    /// Targets a single member of a collection
    pub is_collection_item_fetch: bool,
    /// POST against a collection
    pub is_collection_item_create: bool,
    pub is_url_valid: bool,
}

impl RequestPlan {
    /// Store path without its last segment
    pub fn parent_store_path(&self) -> &str {
        match self.store_path.rfind('.') {
            Some(pos) => &self.store_path[..pos],
            None => "",
        }
    }

    /// URL still holds `{{name}}` placeholders that need a state snapshot
    pub fn needs_state(&self) -> bool {
        !template::state_placeholders(&self.url).is_empty()
    }

    /// Fill `{{name}}` placeholders from a live state snapshot
    pub fn with_state_params(&self, snapshot: &Value) -> RequestPlan {
        let (url, valid) = template::substitute_state(&self.url, snapshot);
        RequestPlan {
            url,
            is_url_valid: self.is_url_valid && valid,
            ..self.clone()
        }
    }
}

/// Resolve a request descriptor against the endpoint tree.
///
/// Fails only when the model name is empty or not present in the tree;
/// unresolvable placeholders produce a plan with `is_url_valid == false`.
pub fn resolve(
    tree: &EndpointTree,
    config: &RestConfig,
    request: &RequestDescriptor,
) -> Result<RequestPlan> {
    if request.model_name.is_empty() {
        return Err(RestError::Validation("modelName is required".into()));
    }
    let levels = tree.levels(&request.model_name).ok_or_else(|| {
        RestError::Validation(format!("unknown model: {}", request.model_name))
    })?;

    let defaults = merge_templates(&levels);
    let method = request.method.or(defaults.method).unwrap_or_default();

    let mut headers = defaults.headers;
    headers.extend(request.headers.clone());
    let mut query_params = defaults.query_params;
    query_params.extend(request.query_params.clone());

    let body = match (defaults.body, request.body.clone()) {
        (Some(RequestBody::Json(base)), Some(RequestBody::Json(overlay))) => {
            Some(RequestBody::Json(merge_body(&base, &overlay)))
        }
        (_, Some(body)) => Some(body),
        (base, None) => base,
    };

    let mut next_index = 0;
    let (mut url, mut store) = if levels.iter().any(Level::is_collection) {
        collection_pieces(&levels, &config.api_prefix, &mut next_index)
    } else {
        let url = levels[0]
            .path()
            .map(|p| template::parse_path(p, &mut next_index))
            .unwrap_or_default();
        let store = levels.iter().map(|l| Piece::text(l.segment)).collect();
        (url, store)
    };

    let is_collection = levels.last().map(Level::is_collection).unwrap_or(false);
    let mut guid = request.guid.clone();
    let mut is_collection_item_fetch = false;
    let mut is_collection_item_create = false;

    if is_collection {
        if method == Method::Post {
            let guid = guid.get_or_insert_with(|| uuid::Uuid::new_v4().to_string());
            store.push(Piece::text(guid.as_str()));
            is_collection_item_create = true;
        } else if request.path_params.len() > next_index {
            url.push(Piece::text("/"));
            url.push(Piece::id(next_index));
            store.push(Piece::id(next_index));
            is_collection_item_fetch = true;
        }
    }

    let (url, url_valid) = template::render(&url, &request.path_params, "", true);
    let (store_path, store_valid) = template::render(&store, &request.path_params, ".", false);

    Ok(RequestPlan {
        model_name: request.model_name.clone(),
        is_url_valid: url_valid && store_valid && !url.is_empty(),
        url,
        method,
        headers,
        body,
        query_params,
        content_type: request.content_type.clone(),
        store_path,
        guid,
        is_collection,
        is_collection_item_fetch,
        is_collection_item_create,
    })
}

fn collection_pieces(
    levels: &[Level<'_>],
    api_prefix: &str,
    next_index: &mut usize,
) -> (Vec<Piece>, Vec<Piece>) {
    let mut url = Vec::new();
    let mut store = Vec::new();

    for (i, level) in levels.iter().enumerate() {
        if i == 0 {
            url = match level.path() {
                Some(path) => template::parse_path(path, next_index),
                None => vec![Piece::text(format!("{}/{}", api_prefix, level.segment))],
            };
            store.push(Piece::text(level.segment));
            continue;
        }

        if levels[i - 1].is_collection() {
            url.push(Piece::text("/"));
            url.push(Piece::id(*next_index));
            store.push(Piece::id(*next_index));
            *next_index += 1;
        }

        match level.path() {
            Some(path) if path.starts_with('/') => {
                url = template::parse_path(path, next_index);
            }
            Some(path) => {
                url.push(Piece::text("/"));
                url.extend(template::parse_path(path, next_index));
            }
            None => url.push(Piece::text(format!("/{}", level.segment))),
        }
        store.push(Piece::text(level.segment));
    }

    (url, store)
}

/// Request parts merged across levels, most specific last
struct MergedTemplate {
    method: Option<Method>,
    headers: BTreeMap<String, String>,
    query_params: BTreeMap<String, String>,
    body: Option<RequestBody>,
}

fn merge_templates(levels: &[Level<'_>]) -> MergedTemplate {
    let mut merged = MergedTemplate {
        method: None,
        headers: BTreeMap::new(),
        query_params: BTreeMap::new(),
        body: None,
    };

    for fetch in levels.iter().filter_map(Level::fetch) {
        if fetch.method.is_some() {
            merged.method = fetch.method;
        }
        merged.headers.extend(fetch.headers.clone());
        merged.query_params.extend(
            fetch
                .query_params
                .iter()
                .filter_map(|(k, v)| template::scalar_string(v).map(|v| (k.clone(), v))),
        );
        if let Some(body) = &fetch.body {
            merged.body = Some(match (merged.body.take(), RequestBody::from_value(body.clone())) {
                (Some(RequestBody::Json(base)), RequestBody::Json(overlay)) => {
                    RequestBody::Json(merge_body(&base, &overlay))
                }
                (_, body) => body,
            });
        }
    }

    merged
}

/// Deep-merge objects, union arrays, otherwise the overlay wins
pub(crate) fn merge_body(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut out: Map<String, Value> = base.clone();
            for (key, value) in overlay {
                let merged = match out.get(key) {
                    Some(existing) => merge_body(existing, value),
                    None => value.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        (Value::Array(base), Value::Array(overlay)) => {
            let mut out = base.clone();
            for value in overlay {
                if !out.contains(value) {
                    out.push(value.clone());
                }
            }
            Value::Array(out)
        }
        (_, overlay) => overlay.clone(),
    }
}
