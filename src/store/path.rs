//! Dotted path access into the nested store

use serde_json::{Map, Value};

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

/// Value at a dotted path; array elements are addressed by index
pub fn value_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Write `value` at a dotted path, creating intermediate objects.
///
/// Non-object intermediates are replaced by objects.
pub fn set_at(root: &mut Value, path: &str, value: Value) {
    let mut node = root;
    for segment in segments(path) {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            unreachable!("node was just made an object");
        };
        node = map.entry(segment.to_string()).or_insert(Value::Null);
    }
    *node = value;
}

/// Remove the subtree at a dotted path, returning it
pub fn remove_at(root: &mut Value, path: &str) -> Option<Value> {
    let (parent, key) = match path.rfind('.') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => ("", path),
    };

    let mut node = root;
    for segment in segments(parent) {
        node = node.as_object_mut()?.get_mut(segment)?;
    }
    node.as_object_mut()?.remove(key)
}
