//! Lifecycle events emitted by the orchestrator and folded into the store

use serde_json::Value;
use tokio::sync::mpsc;

/// One step of a request's lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// An attempt is about to start
    Requested {
        store_path: Option<String>,
        guid: Option<String>,
    },
    /// Successful result to merge at `store_path`
    ResultReceived {
        store_path: Option<String>,
        guid: Option<String>,
        data: Value,
    },
    /// A single attempt failed; more may follow
    TryFailed {
        store_path: Option<String>,
        guid: Option<String>,
        error: Value,
    },
    /// All attempts failed, or the URL could not be resolved
    Failed {
        store_path: Option<String>,
        guid: Option<String>,
        error: Value,
    },
    /// Delete the subtree at `store_path`
    KeyRemoval {
        store_path: Option<String>,
        guid: Option<String>,
    },
    /// Result of a `no_store` request, delivered through hooks only
    TransientResultReceived { guid: Option<String>, data: Value },
    /// Failure of a `no_store` request
    TransientFailed { guid: Option<String>, error: Value },
    /// A recurring task stopped after cancellation
    PeriodicTerminationSucceeded { task_id: String },
}

impl LifecycleEvent {
    pub fn store_path(&self) -> Option<&str> {
        match self {
            LifecycleEvent::Requested { store_path, .. }
            | LifecycleEvent::ResultReceived { store_path, .. }
            | LifecycleEvent::TryFailed { store_path, .. }
            | LifecycleEvent::Failed { store_path, .. }
            | LifecycleEvent::KeyRemoval { store_path, .. } => store_path.as_deref(),
            _ => None,
        }
    }

    pub fn guid(&self) -> Option<&str> {
        match self {
            LifecycleEvent::Requested { guid, .. }
            | LifecycleEvent::ResultReceived { guid, .. }
            | LifecycleEvent::TryFailed { guid, .. }
            | LifecycleEvent::Failed { guid, .. }
            | LifecycleEvent::KeyRemoval { guid, .. }
            | LifecycleEvent::TransientResultReceived { guid, .. }
            | LifecycleEvent::TransientFailed { guid, .. } => guid.as_deref(),
            LifecycleEvent::PeriodicTerminationSucceeded { .. } => None,
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::Requested { .. } => "requested",
            LifecycleEvent::ResultReceived { .. } => "result_received",
            LifecycleEvent::TryFailed { .. } => "try_failed",
            LifecycleEvent::Failed { .. } => "failed",
            LifecycleEvent::KeyRemoval { .. } => "key_removal",
            LifecycleEvent::TransientResultReceived { .. } => "transient_result_received",
            LifecycleEvent::TransientFailed { .. } => "transient_failed",
            LifecycleEvent::PeriodicTerminationSucceeded { .. } => "periodic_termination_succeeded",
        }
    }
}

/// Receiver of lifecycle events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LifecycleEvent);
}

impl EventSink for mpsc::UnboundedSender<LifecycleEvent> {
    fn emit(&self, event: LifecycleEvent) {
        if self.send(event).is_err() {
            tracing::debug!("Lifecycle event dropped, receiver closed");
        }
    }
}

impl<S: EventSink + ?Sized> EventSink for std::sync::Arc<S> {
    fn emit(&self, event: LifecycleEvent) {
        (**self).emit(event)
    }
}
