//! Elohim REST - declarative REST data access
//!
//! Maps dotted model names (`users.posts`) onto REST endpoints, runs the
//! requests with bounded retry and folds every step of their lifecycle
//! into a normalized, metadata-tracking store.
//!
//! # Architecture
//!
//! ```text
//! RequestDescriptor -> resolve -> RequestPlan -> FetchOrchestrator -> LifecycleEvent -> Store
//!                                                      |
//!                                                  Transport
//! ```
//!
//! - **endpoint**: the endpoint tree and request resolution
//! - **fetch**: orchestration, transport and injected collaborators
//! - **store**: copy-on-write merging of events into a JSON tree
//! - **recurring**: periodic requests cancellable by task id
//!
//! # Example
//!
//! ```rust,ignore
//! use elohim_rest::{EndpointTree, Method, RequestDescriptor, RestClient};
//! use serde_json::json;
//!
//! let tree = EndpointTree::from_json(&json!({
//!     "users": {
//!         "config": { "isCollection": true },
//!         "posts": { "config": { "isCollection": true } }
//!     }
//! }))?;
//! let client = RestClient::builder(tree).build()?;
//!
//! // GET /api/users/5/posts, stored under users.5.posts keyed by id
//! client.fetch(&RequestDescriptor::new("users.posts").with_path_param(5)).await?;
//!
//! // POST /api/users, held under users.<guid> until the server assigns an id
//! client
//!     .fetch(&RequestDescriptor::new("users").with_method(Method::Post).with_body(json!({ "name": "Ann" })))
//!     .await?;
//! ```

// Client facade
pub mod client;

// Client configuration
pub mod config;

// Endpoint tree and resolution
pub mod endpoint;

// Error types
pub mod error;

// Request execution
pub mod fetch;

// Periodic requests
pub mod recurring;

// Normalized store
pub mod store;

pub use client::{RestClient, RestClientBuilder};
pub use config::{RestConfig, RetryPolicy};
pub use endpoint::{
    resolve, EndpointConfig, EndpointNode, EndpointTree, FetchTemplate, Method, RequestBody,
    RequestDescriptor, RequestPlan,
};
pub use error::{RestError, Result};
pub use fetch::{
    ErrorReporter, EventSink, FetchOrchestrator, FetchOutcome, HookRegistry, LifecycleEvent,
    OAuthToken, ReqwestTransport, StateSource, StaticToken, TokenProvider, TracingErrorReporter,
    Transport, TransportResponse,
};
pub use recurring::RecurringTaskManager;
pub use store::{FetchMetadata, Store};
