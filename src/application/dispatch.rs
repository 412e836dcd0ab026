//! Concurrent fan-out of delegated task lists to category workers.
//!
//! Every non-empty category gets its own spawned task that owns its worker
//! handle and task list; nothing mutable is shared between them. The
//! caller waits for all of them (a join barrier). A category that errors,
//! times out, panics or has no worker is reported as failed and its partial
//! results are discarded; the other categories are unaffected.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::entities::task::{Task, WorkerResult};
use crate::domain::error::DomainError;
use crate::domain::ports::worker::Worker;
use crate::domain::values::node_kind::WorkerCategory;

#[derive(Debug, Clone, Serialize)]
pub struct CategoryFailure {
    pub category: WorkerCategory,
    pub reason: String,
}

impl CategoryFailure {
    fn new(category: WorkerCategory, reason: impl Into<String>) -> Self {
        let error = DomainError::WorkerUnavailable {
            category: category.to_string(),
            reason: reason.into(),
        };
        warn!(%category, "{error}");
        Self {
            category,
            reason: error.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Results of every category that completed, empty lists included.
    pub results: BTreeMap<WorkerCategory, Vec<WorkerResult>>,
    pub failures: Vec<CategoryFailure>,
}

pub async fn dispatch(
    workers: &BTreeMap<WorkerCategory, Arc<dyn Worker>>,
    tasks: BTreeMap<WorkerCategory, Vec<Task>>,
    timeout: Duration,
) -> DispatchOutcome {
    let mut outcome = DispatchOutcome::default();
    let mut spawned = Vec::new();
    let mut handles = Vec::new();

    for (category, list) in tasks {
        if list.is_empty() {
            outcome.results.insert(category, Vec::new());
            continue;
        }
        let Some(worker) = workers.get(&category).cloned() else {
            outcome
                .failures
                .push(CategoryFailure::new(category, "no worker registered"));
            continue;
        };

        debug!(%category, tasks = list.len(), worker = worker.name(), "Dispatching category");
        spawned.push(category);
        handles.push(tokio::spawn(async move {
            tokio::time::timeout(timeout, run_category(worker, list)).await
        }));
    }

    for (category, joined) in spawned.into_iter().zip(join_all(handles).await) {
        match joined {
            Ok(Ok(Ok(results))) => {
                outcome.results.insert(category, results);
            }
            Ok(Ok(Err(e))) => outcome.failures.push(CategoryFailure::new(category, e.to_string())),
            Ok(Err(_)) => outcome.failures.push(CategoryFailure::new(
                category,
                format!("timed out after {}ms", timeout.as_millis()),
            )),
            Err(e) => outcome
                .failures
                .push(CategoryFailure::new(category, format!("worker task aborted: {e}"))),
        }
    }
    outcome
}

/// Tasks of one category run in priority order; the first error fails the
/// whole category.
async fn run_category(
    worker: Arc<dyn Worker>,
    tasks: Vec<Task>,
) -> Result<Vec<WorkerResult>, DomainError> {
    let mut results = Vec::with_capacity(tasks.len());
    for task in &tasks {
        results.push(worker.process(task).await?);
    }
    Ok(results)
}
