//! Endpoint tree and request resolution

pub mod mapping;
pub mod request;
pub mod resolver;
pub(crate) mod template;

pub use mapping::{EndpointConfig, EndpointNode, EndpointTree, FetchTemplate, Level, CONFIG_KEY};
pub use request::{Method, RequestBody, RequestDescriptor};
pub use resolver::{resolve, RequestPlan};
