//! Hook registry for `no_store` requests
//!
//! Lets a caller await the outcome of a single request without the result
//! being written to the store. Each registration receives at most one
//! delivery.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::oneshot;

type HookCallback = Box<dyn FnOnce(Option<Value>) + Send + Sync>;

/// Callbacks keyed by request guid
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Arc<DashMap<String, HookCallback>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; replaces any previous one for the guid
    pub fn register<F>(&self, guid: impl Into<String>, callback: F)
    where
        F: FnOnce(Option<Value>) + Send + Sync + 'static,
    {
        self.hooks.insert(guid.into(), Box::new(callback));
    }

    /// Register and receive the payload through a channel
    pub fn register_channel(&self, guid: impl Into<String>) -> oneshot::Receiver<Option<Value>> {
        let (tx, rx) = oneshot::channel();
        self.register(guid, move |payload| {
            let _ = tx.send(payload);
        });
        rx
    }

    pub fn unregister(&self, guid: &str) -> bool {
        self.hooks.remove(guid).is_some()
    }

    /// Hand the terminal payload (`None` on failure) to the guid's callback.
    ///
    /// Returns `false` when nothing was registered.
    pub fn deliver(&self, guid: &str, payload: Option<Value>) -> bool {
        match self.hooks.remove(guid) {
            Some((_, callback)) => {
                callback(payload);
                true
            }
            None => {
                tracing::debug!(guid = %guid, "No hook registered for transient result");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
