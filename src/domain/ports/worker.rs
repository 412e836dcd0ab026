//! Worker port for per-modality analysis.
//!
//! Defines the [`Worker`] trait the coordinator dispatches prioritized
//! tasks to. Each worker serves exactly one [`WorkerCategory`] and owns its
//! own state; nothing is shared between workers.
//!
//! # Overview
//!
//! - Implement [`Worker`] to add a new analyzer for a category
//! - [`Worker::process`] turns one [`Task`] into a [`WorkerResult`]
//! - [`Worker::learn`] receives recorded experiences so a worker can
//!   calibrate itself over time

use async_trait::async_trait;

use crate::domain::entities::experience::Experience;
use crate::domain::entities::task::{Task, WorkerResult};
use crate::domain::error::DomainError;
use crate::domain::values::node_kind::WorkerCategory;

/// Capability interface for category workers.
///
/// # Example
///
/// ```ignore
/// struct EchoWorker;
///
/// #[async_trait]
/// impl Worker for EchoWorker {
///     fn name(&self) -> &'static str { "echo" }
///     fn category(&self) -> WorkerCategory { WorkerCategory::Text }
///
///     async fn process(&self, task: &Task) -> Result<WorkerResult, DomainError> {
///         Ok(WorkerResult {
///             node_id: task.node_id.clone(),
///             worker: self.name().into(),
///             insights: vec![],
///             confidence: Confidence::default(),
///             trend: None,
///         })
///     }
///
///     fn learn(&self, _experience: &Experience) {}
/// }
/// ```
#[async_trait]
pub trait Worker: Send + Sync {
    /// Unique name for this worker.
    fn name(&self) -> &'static str;

    /// Category whose task list this worker consumes.
    fn category(&self) -> WorkerCategory;

    /// Analyze one task.
    async fn process(&self, task: &Task) -> Result<WorkerResult, DomainError>;

    /// Absorb a recorded outcome.
    fn learn(&self, experience: &Experience);
}
