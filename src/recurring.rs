//! Recurring fetches
//!
//! A scheduled request runs, sleeps for its period and runs again until a
//! cancellation for its task id arrives on the shared broadcast channel.

use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::endpoint::RequestDescriptor;
use crate::error::{RestError, Result};
use crate::fetch::{EventSink, FetchOrchestrator, LifecycleEvent};

const CANCEL_CHANNEL_CAPACITY: usize = 64;

/// Supervises periodic orchestrator runs keyed by task id
pub struct RecurringTaskManager {
    orchestrator: Arc<FetchOrchestrator>,
    sink: Arc<dyn EventSink>,
    cancel_tx: broadcast::Sender<String>,
    active: Arc<DashSet<String>>,
}

impl RecurringTaskManager {
    pub fn new(orchestrator: Arc<FetchOrchestrator>, sink: Arc<dyn EventSink>) -> Self {
        let (cancel_tx, _) = broadcast::channel(CANCEL_CHANNEL_CAPACITY);
        Self {
            orchestrator,
            sink,
            cancel_tx,
            active: Arc::new(DashSet::new()),
        }
    }

    /// Start a recurring request.
    ///
    /// The request needs both a period and a task id, and the task id must
    /// not already be running.
    pub fn schedule(&self, request: RequestDescriptor) -> Result<JoinHandle<()>> {
        let period = request
            .period
            .filter(|p| !p.is_zero())
            .ok_or_else(|| RestError::Validation("period is required".into()))?;
        let task_id = request
            .task_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RestError::Validation("taskId is required".into()))?;

        if !self.active.insert(task_id.clone()) {
            return Err(RestError::Validation(format!(
                "task already scheduled: {}",
                task_id
            )));
        }

        // Subscribe before spawning so an immediate cancel is not missed
        let mut cancel_rx = self.cancel_tx.subscribe();
        let orchestrator = self.orchestrator.clone();
        let sink = self.sink.clone();
        let active = self.active.clone();

        Ok(tokio::spawn(async move {
            info!(
                task_id = %task_id,
                model_name = %request.model_name,
                period_ms = period.as_millis() as u64,
                "Recurring task started"
            );

            tokio::select! {
                cancelled = wait_for_cancel(&mut cancel_rx, &task_id) => {
                    if cancelled {
                        sink.emit(LifecycleEvent::PeriodicTerminationSucceeded {
                            task_id: task_id.clone(),
                        });
                        info!(task_id = %task_id, "Recurring task cancelled");
                    } else {
                        info!(task_id = %task_id, "Task manager dropped, recurring task stopping");
                    }
                }
                e = run_until_error(&orchestrator, &request, period, sink.as_ref()) => {
                    orchestrator
                        .error_reporter()
                        .report(&format!("Recurring task {} failed: {}", task_id, e));
                }
            }

            active.remove(&task_id);
        }))
    }

    /// Signal the task with this id to stop. Returns `false` when no such
    /// task is running.
    pub fn cancel(&self, task_id: &str) -> bool {
        if !self.active.contains(task_id) {
            return false;
        }
        self.cancel_tx.send(task_id.to_string()).is_ok()
    }

    /// Ids of the running tasks
    pub fn active_tasks(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.active.iter().map(|id| id.key().clone()).collect();
        ids.sort();
        ids
    }
}

async fn run_until_error(
    orchestrator: &FetchOrchestrator,
    request: &RequestDescriptor,
    period: Duration,
    sink: &dyn EventSink,
) -> RestError {
    loop {
        if let Err(e) = orchestrator.run(request, sink).await {
            return e;
        }
        tokio::time::sleep(period).await;
    }
}

/// Resolves `true` on a cancel for `task_id`, `false` once the manager is gone
async fn wait_for_cancel(rx: &mut broadcast::Receiver<String>, task_id: &str) -> bool {
    loop {
        match rx.recv().await {
            Ok(id) if id == task_id => return true,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(task_id = %task_id, "Recurring task lagged {} cancel signals", n);
            }
            Err(broadcast::error::RecvError::Closed) => return false,
        }
    }
}
