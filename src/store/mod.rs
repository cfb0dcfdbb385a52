//! Normalized nested store
//!
//! The store is a single JSON tree. Every update goes through
//! [`merge::apply`], which returns a fresh tree that is then published
//! through a `watch` channel, so readers always hold a complete snapshot.

pub mod merge;
pub mod metadata;
pub mod normalize;
pub mod path;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;

use crate::fetch::{EventSink, LifecycleEvent, StateSource};
pub use metadata::{FetchMetadata, METADATA_KEY};

/// Application store fed by lifecycle events
pub struct Store {
    tx: watch::Sender<Arc<Value>>,
}

impl Store {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_state(Value::Object(Map::new()))
    }

    /// Create a store with initial state
    pub fn with_state(state: Value) -> Self {
        let (tx, _) = watch::channel(Arc::new(state));
        Self { tx }
    }

    /// Fold one event into the store
    pub fn dispatch(&self, event: &LifecycleEvent) {
        tracing::trace!(
            kind = event.kind(),
            store_path = event.store_path().unwrap_or(""),
            "Applying lifecycle event"
        );
        self.tx.send_modify(|state| {
            *state = Arc::new(merge::apply(state, event));
        });
    }

    /// Current store value
    pub fn snapshot(&self) -> Arc<Value> {
        self.tx.borrow().clone()
    }

    /// Value at a dotted path
    pub fn select(&self, path: &str) -> Option<Value> {
        path::value_at(&self.tx.borrow(), path).cloned()
    }

    /// Fetch metadata at a dotted path
    pub fn metadata(&self, path: &str) -> Option<FetchMetadata> {
        path::value_at(&self.tx.borrow(), path).and_then(FetchMetadata::of)
    }

    /// Receive every published store value
    pub fn subscribe(&self) -> watch::Receiver<Arc<Value>> {
        self.tx.subscribe()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for Store {
    fn emit(&self, event: LifecycleEvent) {
        self.dispatch(&event);
    }
}

#[async_trait]
impl StateSource for Store {
    async fn state_snapshot(&self) -> Value {
        self.snapshot().as_ref().clone()
    }
}
