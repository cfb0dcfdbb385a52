//! Client facade
//!
//! Wires the endpoint tree, transport, store, hooks and recurring tasks
//! together so callers only deal with request descriptors.

use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::RestConfig;
use crate::endpoint::{EndpointTree, RequestDescriptor};
use crate::error::Result;
use crate::fetch::{
    ErrorReporter, FetchOrchestrator, FetchOutcome, HookRegistry, ReqwestTransport,
    TokenProvider, Transport,
};
use crate::recurring::RecurringTaskManager;
use crate::store::Store;

/// REST client backed by a normalized store
///
/// # Example
///
/// ```rust,ignore
/// use elohim_rest::{EndpointTree, RequestDescriptor, RestClient, RestConfig};
///
/// let tree = EndpointTree::from_yaml_str(include_str!("endpoints.yaml"))?;
/// let client = RestClient::builder(tree)
///     .config(RestConfig { base_url: "https://api.example.com".into(), ..Default::default() })
///     .build()?;
///
/// client.fetch(&RequestDescriptor::new("users")).await?;
/// let users = client.store().select("users");
/// ```
pub struct RestClient {
    store: Arc<Store>,
    hooks: HookRegistry,
    orchestrator: Arc<FetchOrchestrator>,
    recurring: RecurringTaskManager,
}

impl RestClient {
    pub fn builder(tree: EndpointTree) -> RestClientBuilder {
        RestClientBuilder {
            tree,
            config: RestConfig::default(),
            transport: None,
            tokens: None,
            errors: None,
            initial_state: None,
        }
    }

    /// Run a request, folding its lifecycle into the store
    pub async fn fetch(&self, request: &RequestDescriptor) -> Result<FetchOutcome> {
        self.orchestrator.run(request, self.store.as_ref()).await
    }

    /// Run a request without touching the store and return its payload.
    ///
    /// Resolves to `None` when the request failed.
    pub async fn fetch_transient(&self, request: RequestDescriptor) -> Result<Option<Value>> {
        let guid = request
            .guid
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let request = request.no_store().with_guid(guid.clone());

        let rx = self.hooks.register_channel(guid.clone());
        let outcome = self.orchestrator.run(&request, self.store.as_ref()).await;
        // drops the sender if the hook never fired
        self.hooks.unregister(&guid);
        outcome?;

        Ok(rx.await.ok().flatten())
    }

    /// Start a recurring request; see [`RecurringTaskManager::schedule`]
    pub fn schedule(&self, request: RequestDescriptor) -> Result<JoinHandle<()>> {
        self.recurring.schedule(request)
    }

    pub fn cancel(&self, task_id: &str) -> bool {
        self.recurring.cancel(task_id)
    }

    pub fn active_tasks(&self) -> Vec<String> {
        self.recurring.active_tasks()
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }
}

/// Builder for [`RestClient`]
pub struct RestClientBuilder {
    tree: EndpointTree,
    config: RestConfig,
    transport: Option<Arc<dyn Transport>>,
    tokens: Option<Arc<dyn TokenProvider>>,
    errors: Option<Arc<dyn ErrorReporter>>,
    initial_state: Option<Value>,
}

impl RestClientBuilder {
    pub fn config(mut self, config: RestConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default `reqwest` transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn error_reporter(mut self, errors: Arc<dyn ErrorReporter>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn initial_state(mut self, state: Value) -> Self {
        self.initial_state = Some(state);
        self
    }

    pub fn build(self) -> Result<RestClient> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };
        let store = Arc::new(match self.initial_state {
            Some(state) => Store::with_state(state),
            None => Store::new(),
        });
        let hooks = HookRegistry::new();

        let mut orchestrator = FetchOrchestrator::new(Arc::new(self.tree), transport)
            .with_config(self.config)
            .with_state_source(store.clone())
            .with_hooks(hooks.clone());
        if let Some(tokens) = self.tokens {
            orchestrator = orchestrator.with_token_provider(tokens);
        }
        if let Some(errors) = self.errors {
            orchestrator = orchestrator.with_error_reporter(errors);
        }
        let orchestrator = Arc::new(orchestrator);
        let recurring = RecurringTaskManager::new(orchestrator.clone(), store.clone());

        Ok(RestClient {
            store,
            hooks,
            orchestrator,
            recurring,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{Method, RequestPlan};
    use crate::error::RestError;
    use crate::fetch::TransportResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    /// Echoes the request URL and body back
    struct EchoTransport;

    #[async_trait]
    impl Transport for EchoTransport {
        async fn send(&self, plan: &RequestPlan) -> Result<TransportResponse> {
            if plan.url.ends_with("/broken") {
                return Ok(TransportResponse::error(500, "Internal Server Error"));
            }
            let body = plan.body.as_ref().and_then(|b| b.as_json()).cloned();
            Ok(TransportResponse::ok(
                200,
                Some(json!({ "id": 1, "url": plan.url, "body": body })),
            ))
        }
    }

    fn client() -> RestClient {
        let tree = EndpointTree::from_json(&json!({
            "users": { "config": { "isCollection": true } },
            "broken": { "config": { "fetch": { "path": "/api/broken" } } }
        }))
        .unwrap();
        RestClient::builder(tree)
            .config(RestConfig {
                retry: crate::config::RetryPolicy::immediate(),
                ..Default::default()
            })
            .transport(Arc::new(EchoTransport))
            .initial_state(json!({ "session": { "active": true } }))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_writes_store() {
        let client = client();
        let outcome = client
            .fetch(&RequestDescriptor::new("users").with_path_param(1))
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Succeeded);
        assert_eq!(client.store().select("users.1.url"), Some(json!("/api/users/1")));
        assert_eq!(client.store().select("session.active"), Some(json!(true)));
    }

    #[tokio::test]
    async fn test_fetch_transient_returns_payload_and_skips_store() {
        let client = client();
        let before = client.store().snapshot();

        let payload = client
            .fetch_transient(
                RequestDescriptor::new("users")
                    .with_method(Method::Post)
                    .with_body(json!({ "name": "Ann" })),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(payload["body"], json!({ "name": "Ann" }));
        assert!(payload["guid"].is_string());
        assert_eq!(client.store().snapshot(), before);
        assert!(client.hooks().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_transient_failure_is_none() {
        let client = client();
        let payload = client
            .fetch_transient(RequestDescriptor::new("broken").no_retry())
            .await
            .unwrap();
        assert_eq!(payload, None);
    }

    #[tokio::test]
    async fn test_fetch_transient_validation_error_cleans_up_hook() {
        let client = client();
        let err = client
            .fetch_transient(RequestDescriptor::new("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, RestError::Validation(_)));
        assert!(client.hooks().is_empty());
    }

    #[tokio::test]
    async fn test_schedule_and_cancel_through_client() {
        let client = client();
        let mut rx = client.store().subscribe();
        let handle = client
            .schedule(
                RequestDescriptor::new("users")
                    .with_path_param(1)
                    .with_period(Duration::from_millis(10))
                    .with_task_id("users-poll"),
            )
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while client.store().select("users.1.id").is_none() {
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        assert_eq!(client.active_tasks(), vec!["users-poll".to_string()]);
        assert!(client.cancel("users-poll"));
        handle.await.unwrap();
        assert!(client.active_tasks().is_empty());
    }
}
