//! Endpoint tree: named REST endpoints and their fetch templates
//!
//! The tree is supplied once by the application (usually as JSON or YAML)
//! and is read-only afterwards. Every object key is a child segment except
//! the reserved `config` key:
//!
//! ```yaml
//! users:
//!   config:
//!     isCollection: true
//!     fetch:
//!       path: /api/v2/users
//!       headers:
//!         Accept: application/json
//!   posts:
//!     config:
//!       isCollection: true
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::request::Method;
use crate::error::{RestError, Result};

/// Reserved key holding a node's configuration
pub const CONFIG_KEY: &str = "config";

/// Per-endpoint configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    /// Level holds zero or more entities keyed by id
    #[serde(default)]
    pub is_collection: bool,
    /// Fetch template for this level
    #[serde(default)]
    pub fetch: Option<FetchTemplate>,
}

/// Default request parts declared by an endpoint level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchTemplate {
    /// Relative segment or absolute (`/`-prefixed) path, may contain `{:name}` placeholders
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub method: Option<Method>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// JSON body; a string value is sent verbatim as a form body
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub query_params: BTreeMap<String, Value>,
}

/// A node in the endpoint tree
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointNode {
    /// Node with nested endpoints
    Branch {
        config: Option<EndpointConfig>,
        children: BTreeMap<String, EndpointNode>,
    },
    /// Terminal endpoint
    Leaf { config: EndpointConfig },
}

impl EndpointNode {
    pub fn leaf(config: EndpointConfig) -> Self {
        EndpointNode::Leaf { config }
    }

    pub fn branch(
        config: Option<EndpointConfig>,
        children: impl IntoIterator<Item = (String, EndpointNode)>,
    ) -> Self {
        EndpointNode::Branch {
            config,
            children: children.into_iter().collect(),
        }
    }

    pub fn config(&self) -> Option<&EndpointConfig> {
        match self {
            EndpointNode::Branch { config, .. } => config.as_ref(),
            EndpointNode::Leaf { config } => Some(config),
        }
    }

    pub fn child(&self, segment: &str) -> Option<&EndpointNode> {
        match self {
            EndpointNode::Branch { children, .. } => children.get(segment),
            EndpointNode::Leaf { .. } => None,
        }
    }

    fn from_json(path: &str, value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            RestError::Config(format!("endpoint '{}' must be an object", path))
        })?;

        let config = match obj.get(CONFIG_KEY) {
            Some(raw) => Some(serde_json::from_value::<EndpointConfig>(raw.clone()).map_err(
                |e| RestError::Config(format!("endpoint '{}' has invalid config: {}", path, e)),
            )?),
            None => None,
        };

        let mut children = BTreeMap::new();
        for (segment, child) in obj.iter().filter(|(k, _)| k.as_str() != CONFIG_KEY) {
            let child_path = format!("{}.{}", path, segment);
            children.insert(segment.clone(), EndpointNode::from_json(&child_path, child)?);
        }

        Ok(match (config, children.is_empty()) {
            (Some(config), true) => EndpointNode::Leaf { config },
            (config, _) => EndpointNode::Branch { config, children },
        })
    }
}

/// One resolved level of a model path
#[derive(Debug, Clone, Copy)]
pub struct Level<'a> {
    pub segment: &'a str,
    pub config: Option<&'a EndpointConfig>,
}

impl Level<'_> {
    pub fn is_collection(&self) -> bool {
        self.config.map(|c| c.is_collection).unwrap_or(false)
    }

    pub fn fetch(&self) -> Option<&FetchTemplate> {
        self.config.and_then(|c| c.fetch.as_ref())
    }

    pub fn path(&self) -> Option<&str> {
        self.fetch().and_then(|f| f.path.as_deref())
    }
}

/// Root of the endpoint tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointTree {
    roots: BTreeMap<String, EndpointNode>,
}

impl EndpointTree {
    pub fn new(roots: impl IntoIterator<Item = (String, EndpointNode)>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }

    /// Build from a JSON mapping
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| RestError::Config("endpoint tree must be an object".into()))?;

        let mut roots = BTreeMap::new();
        for (segment, node) in obj {
            roots.insert(segment.clone(), EndpointNode::from_json(segment, node)?);
        }
        Ok(Self { roots })
    }

    /// Build from a YAML document
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(s)?;
        Self::from_json(&value)
    }

    /// Walk a dotted model name, returning one entry per segment
    ///
    /// Returns `None` when any segment is not present in the tree.
    pub fn levels<'a>(&'a self, model_name: &'a str) -> Option<Vec<Level<'a>>> {
        let mut segments = model_name.split('.');
        let first = segments.next()?;
        let mut node = self.roots.get(first)?;
        let mut levels = vec![Level {
            segment: first,
            config: node.config(),
        }];

        for segment in segments {
            node = node.child(segment)?;
            levels.push(Level {
                segment,
                config: node.config(),
            });
        }

        Some(levels)
    }

    pub fn contains(&self, model_name: &str) -> bool {
        !model_name.is_empty() && self.levels(model_name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tree_from_json() {
        let tree = EndpointTree::from_json(&json!({
            "users": {
                "config": { "isCollection": true, "fetch": { "path": "/api/v2/users" } },
                "posts": { "config": { "isCollection": true } }
            },
            "session": { "config": { "fetch": { "path": "/auth/session", "method": "POST" } } }
        }))
        .unwrap();

        let levels = tree.levels("users.posts").unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].path(), Some("/api/v2/users"));
        assert!(levels[0].is_collection());
        assert!(levels[1].is_collection());
        assert_eq!(levels[1].path(), None);

        let session = tree.levels("session").unwrap();
        assert_eq!(session[0].fetch().unwrap().method, Some(Method::Post));
        assert!(!session[0].is_collection());
    }

    #[test]
    fn test_leaf_and_branch_shapes() {
        let tree = EndpointTree::from_json(&json!({
            "users": {
                "config": { "isCollection": true },
                "posts": { "config": { "isCollection": true } }
            },
            "settings": {}
        }))
        .unwrap();

        assert!(matches!(tree.roots["users"], EndpointNode::Branch { .. }));
        assert!(matches!(
            tree.roots["users"].child("posts"),
            Some(EndpointNode::Leaf { .. })
        ));
        assert!(matches!(
            tree.roots["settings"],
            EndpointNode::Branch { config: None, .. }
        ));
    }

    #[test]
    fn test_unknown_segments() {
        let tree = EndpointTree::from_json(&json!({ "users": { "posts": {} } })).unwrap();
        assert!(tree.contains("users.posts"));
        assert!(!tree.contains("users.comments"));
        assert!(!tree.contains("accounts"));
        assert!(!tree.contains(""));
    }

    #[test]
    fn test_tree_from_yaml() {
        let tree = EndpointTree::from_yaml_str(
            r#"
users:
  config:
    isCollection: true
    fetch:
      headers:
        Accept: application/json
"#,
        )
        .unwrap();

        let levels = tree.levels("users").unwrap();
        assert_eq!(
            levels[0].fetch().unwrap().headers.get("Accept").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = EndpointTree::from_json(&json!({
            "users": { "config": { "isCollection": "yes" } }
        }))
        .unwrap_err();
        assert!(matches!(err, RestError::Config(_)));

        let err = EndpointTree::from_json(&json!(["users"])).unwrap_err();
        assert!(matches!(err, RestError::Config(_)));
    }
}
