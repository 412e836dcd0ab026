pub mod text;
pub mod video;
pub mod vision;

use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::entities::experience::Experience;
use crate::domain::ports::worker::Worker;
use crate::domain::values::confidence::Confidence;
use crate::domain::values::node_kind::WorkerCategory;

pub use text::TextWorker;
pub use video::VideoWorker;
pub use vision::VisionWorker;

const EXPERTISE_STEP: f64 = 0.05;

/// One worker per category, ready to hand to a coordinator.
pub fn default_workers() -> Vec<Arc<dyn Worker>> {
    vec![
        Arc::new(TextWorker::new()),
        Arc::new(VisionWorker::new()),
        Arc::new(VideoWorker::new()),
    ]
}

#[derive(Debug, Default)]
struct ExpertiseState {
    tasks: u64,
    level: f64,
}

/// Per-worker task counter and expertise level in [0, 1].
///
/// The level rises by 0.05 for every rewarded experience whose action is
/// this worker's category, and scales the worker's confidence by
/// `1 + level`.
#[derive(Debug, Default)]
pub struct Expertise {
    state: Mutex<ExpertiseState>,
}

impl Expertise {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_task(&self) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.tasks += 1;
        state.tasks
    }

    pub fn tasks(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).tasks
    }

    pub fn level(&self) -> f64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).level
    }

    pub fn reinforce(&self, category: WorkerCategory, experience: &Experience) {
        if experience.action.kind != category.to_string() || !experience.is_success() {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.level = (state.level + EXPERTISE_STEP).min(1.0);
    }

    /// `min(1, base × (1 + level))`.
    pub fn calibrate(&self, base: f64) -> Confidence {
        Confidence::saturating(base * (1.0 + self.level()))
    }
}
