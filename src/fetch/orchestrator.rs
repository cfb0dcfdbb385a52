//! Fetch orchestration
//!
//! Runs one request through its lifecycle:
//!
//! ```text
//! Idle -> Requesting -> Succeeded
//!              |
//!              +-> Retrying -> Requesting ... -> ExhaustedFailed
//! ```
//!
//! An unresolvable URL ends the request before the first attempt. Every
//! attempt emits `Requested` followed by `ResultReceived` or `TryFailed`;
//! `Failed` follows only once all attempts are used up.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::collaborators::{ErrorReporter, StateSource, TokenProvider, TracingErrorReporter};
use super::collection::{settle, Settled};
use super::event::{EventSink, LifecycleEvent};
use super::hooks::HookRegistry;
use super::transport::{error_payload, Transport, TransportResponse};
use crate::config::RestConfig;
use crate::endpoint::{resolve, EndpointTree, RequestDescriptor, RequestPlan};
use crate::error::{RestError, Result};
use crate::store::metadata::now_millis;

/// Error payload carried by the `Failed` event of an unresolvable request
pub const INVALID_URL: &str = "Invalid URL";

/// Terminal state of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Succeeded,
    ExhaustedFailed,
    InvalidUrl,
}

/// Outcome of a single attempt
enum Attempt {
    Success(Option<Value>),
    Failure { error: Value, report: bool },
}

/// Executes request descriptors with bounded retry
///
/// # Example
///
/// ```rust,ignore
/// use elohim_rest::{FetchOrchestrator, RequestDescriptor, ReqwestTransport, RestConfig};
///
/// let orchestrator = FetchOrchestrator::new(tree, Arc::new(ReqwestTransport::new(&config)?))
///     .with_config(config)
///     .with_token_provider(tokens);
///
/// let outcome = orchestrator.run(&RequestDescriptor::new("users"), &store).await?;
/// ```
pub struct FetchOrchestrator {
    endpoints: Arc<EndpointTree>,
    config: RestConfig,
    transport: Arc<dyn Transport>,
    tokens: Option<Arc<dyn TokenProvider>>,
    errors: Arc<dyn ErrorReporter>,
    state: Option<Arc<dyn StateSource>>,
    hooks: HookRegistry,
}

impl FetchOrchestrator {
    pub fn new(endpoints: Arc<EndpointTree>, transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoints,
            config: RestConfig::default(),
            transport,
            tokens: None,
            errors: Arc::new(TracingErrorReporter),
            state: None,
            hooks: HookRegistry::new(),
        }
    }

    pub fn with_config(mut self, config: RestConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn with_error_reporter(mut self, errors: Arc<dyn ErrorReporter>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_state_source(mut self, state: Arc<dyn StateSource>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn error_reporter(&self) -> &Arc<dyn ErrorReporter> {
        &self.errors
    }

    /// Run a request to a terminal state, emitting lifecycle events.
    ///
    /// Only validation problems are returned as errors; transport failures
    /// end up as `TryFailed`/`Failed` events.
    pub async fn run(
        &self,
        request: &RequestDescriptor,
        sink: &dyn EventSink,
    ) -> Result<FetchOutcome> {
        let mut plan = resolve(&self.endpoints, &self.config, request)?;
        if plan.needs_state() {
            let snapshot = match &self.state {
                Some(state) => state.state_snapshot().await,
                None => Value::Null,
            };
            plan = plan.with_state_params(&snapshot);
        }

        let store_path = (!request.no_store).then(|| plan.store_path.clone());

        if !plan.is_url_valid {
            let reason = RestError::InvalidUrl {
                model_name: plan.model_name.clone(),
                url: plan.url.clone(),
            };
            warn!(error = %reason, "Request not sent");
            let store_path = store_path.and_then(|p| resolved_prefix(&p));
            self.fail(&plan, request, store_path, json!(INVALID_URL), sink);
            return Ok(FetchOutcome::InvalidUrl);
        }

        let attempts = self.config.retry.attempts_for(request.no_retry);
        let mut last_error = Value::Null;

        for attempt in 0..attempts {
            sink.emit(LifecycleEvent::Requested {
                store_path: store_path.clone(),
                guid: plan.guid.clone(),
            });
            debug!(
                model_name = %plan.model_name,
                method = %plan.method,
                url = %plan.url,
                attempt,
                "Requesting"
            );

            match self.attempt(&plan).await {
                Attempt::Success(data) => {
                    self.succeed(&plan, store_path, data, sink);
                    return Ok(FetchOutcome::Succeeded);
                }
                Attempt::Failure { error, report } => {
                    sink.emit(LifecycleEvent::TryFailed {
                        store_path: store_path.clone(),
                        guid: plan.guid.clone(),
                        error: error.clone(),
                    });
                    warn!(
                        model_name = %plan.model_name,
                        url = %plan.url,
                        attempt,
                        error = %error,
                        "Request attempt failed"
                    );
                    if report {
                        self.errors.report(&failure_message(&plan, &error));
                    }
                    last_error = error;
                }
            }

            if attempt + 1 < attempts {
                let delay = self.config.retry.delay_for(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        error!(
            model_name = %plan.model_name,
            url = %plan.url,
            attempts,
            "Request failed after all attempts"
        );
        self.fail(&plan, request, store_path, last_error, sink);
        Ok(FetchOutcome::ExhaustedFailed)
    }

    async fn attempt(&self, plan: &RequestPlan) -> Attempt {
        let mut outgoing = plan.clone();
        if let Some(tokens) = &self.tokens {
            if let Some(token) = tokens.access_token(&plan.model_name).await {
                outgoing
                    .headers
                    .insert("Authorization".to_string(), token.authorization_header());
            }
        }

        match self.transport.send(&outgoing).await {
            Ok(TransportResponse { ok: true, data, .. }) => Attempt::Success(data),
            Ok(TransportResponse { status, data, .. }) => Attempt::Failure {
                error: data.unwrap_or(Value::Null),
                report: status != 401,
            },
            Err(RestError::Transport { status, message }) => Attempt::Failure {
                error: error_payload(status, &message, None),
                report: status != 401,
            },
            Err(e) => Attempt::Failure {
                report: !e.is_unauthorized(),
                error: json!({ "title": "Error", "message": e.to_string() }),
            },
        }
    }

    fn succeed(
        &self,
        plan: &RequestPlan,
        store_path: Option<String>,
        data: Option<Value>,
        sink: &dyn EventSink,
    ) {
        let settled = settle(plan, data, now_millis());

        if store_path.is_none() {
            let data = settled
                .into_iter()
                .find_map(|s| match s {
                    Settled::Store { data, .. } => Some(data),
                    Settled::Remove { .. } => None,
                })
                .unwrap_or(Value::Null);
            self.deliver_hook(plan, Some(data.clone()));
            sink.emit(LifecycleEvent::TransientResultReceived {
                guid: plan.guid.clone(),
                data,
            });
            return;
        }

        debug!(model_name = %plan.model_name, store_path = %plan.store_path, "Request succeeded");
        for change in settled {
            sink.emit(match change {
                Settled::Store { path, data } => LifecycleEvent::ResultReceived {
                    store_path: Some(path),
                    guid: plan.guid.clone(),
                    data,
                },
                Settled::Remove { path } => LifecycleEvent::KeyRemoval {
                    store_path: Some(path),
                    guid: plan.guid.clone(),
                },
            });
        }
    }

    fn fail(
        &self,
        plan: &RequestPlan,
        request: &RequestDescriptor,
        store_path: Option<String>,
        error: Value,
        sink: &dyn EventSink,
    ) {
        if request.no_store {
            self.deliver_hook(plan, None);
            sink.emit(LifecycleEvent::TransientFailed {
                guid: plan.guid.clone(),
                error,
            });
        } else {
            sink.emit(LifecycleEvent::Failed {
                store_path,
                guid: plan.guid.clone(),
                error,
            });
        }
    }

    fn deliver_hook(&self, plan: &RequestPlan, payload: Option<Value>) {
        if let Some(guid) = &plan.guid {
            self.hooks.deliver(guid, payload);
        }
    }
}

/// Store path up to its first unfilled `{:name}` segment, `None` when
/// nothing before it is resolved
fn resolved_prefix(store_path: &str) -> Option<String> {
    let resolved = match store_path.find("{:") {
        Some(pos) => store_path[..pos].trim_end_matches('.'),
        None => store_path,
    };
    (!resolved.is_empty()).then(|| resolved.to_string())
}

fn failure_message(plan: &RequestPlan, error: &Value) -> String {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    match error.get("code") {
        Some(code) => format!("{} {} failed ({}): {}", plan.method, plan.url, code, message),
        None => format!("{} {} failed: {}", plan.method, plan.url, message),
    }
}
