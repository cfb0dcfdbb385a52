//! Request execution
//!
//! The orchestrator resolves a [`RequestDescriptor`](crate::RequestDescriptor),
//! sends it through a [`Transport`] with bounded retry and reports every step
//! as a [`LifecycleEvent`] to an [`EventSink`].

pub mod collaborators;
pub(crate) mod collection;
pub mod event;
pub mod hooks;
pub mod orchestrator;
pub mod transport;

pub use collaborators::{
    ErrorReporter, OAuthToken, StateSource, StaticToken, TokenProvider, TracingErrorReporter,
};
pub use event::{EventSink, LifecycleEvent};
pub use hooks::HookRegistry;
pub use orchestrator::{FetchOrchestrator, FetchOutcome, INVALID_URL};
pub use transport::{ReqwestTransport, Transport, TransportResponse};
