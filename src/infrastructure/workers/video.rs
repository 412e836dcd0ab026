use async_trait::async_trait;
use tracing::debug;

use super::Expertise;
use crate::domain::entities::experience::Experience;
use crate::domain::entities::market_data::{MarketItem, VideoClip};
use crate::domain::entities::task::{
    Insight, InsightDetail, InsightKind, KeyMoment, Task, WorkerResult,
};
use crate::domain::error::DomainError;
use crate::domain::ports::worker::Worker;
use crate::domain::values::node_kind::{NodeKind, WorkerCategory};

const BASE_CONFIDENCE: f64 = 0.65;

/// Videos: key moments spotted in the transcript.
#[derive(Debug, Default)]
pub struct VideoWorker {
    expertise: Expertise,
}

impl VideoWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expertise(&self) -> &Expertise {
        &self.expertise
    }
}

/// Results talk sits at the start, outlook at the midpoint.
pub fn key_moments(transcript: &str, duration: f64) -> Vec<KeyMoment> {
    let lower = transcript.to_lowercase();
    let mut moments = Vec::new();
    if lower.contains("earnings") || lower.contains("revenue") {
        moments.push(KeyMoment {
            timestamp: 0.0,
            topic: "financial_results".into(),
        });
    }
    if lower.contains("guidance") || lower.contains("forecast") {
        moments.push(KeyMoment {
            timestamp: duration / 2.0,
            topic: "future_outlook".into(),
        });
    }
    moments
}

#[async_trait]
impl Worker for VideoWorker {
    fn name(&self) -> &'static str {
        "video"
    }

    fn category(&self) -> WorkerCategory {
        WorkerCategory::Video
    }

    async fn process(&self, task: &Task) -> Result<WorkerResult, DomainError> {
        if task.kind != NodeKind::Video {
            return Err(DomainError::InvalidInput(format!(
                "video worker cannot handle '{}' nodes",
                task.kind
            )));
        }
        self.expertise.record_task();
        let clip = VideoClip::from_metadata(&task.metadata)?;
        let duration = clip.duration.filter(|d| d.is_finite() && *d >= 0.0).unwrap_or(0.0);
        let video_type = clip.video_type.clone().unwrap_or_else(|| "general".into());
        let moments = key_moments(clip.transcript.as_deref().unwrap_or_default(), duration);
        debug!(node_id = %task.node_id, moments = moments.len(), "Video worker analyzed clip");

        let confidence = self.expertise.calibrate(BASE_CONFIDENCE);
        let title = clip.title.as_deref().unwrap_or(task.node_id.as_str());
        let summary = if moments.is_empty() {
            format!("{title}: no key moments found")
        } else {
            let topics: Vec<&str> = moments.iter().map(|m| m.topic.as_str()).collect();
            format!("{title}: {}", topics.join(", "))
        };

        Ok(WorkerResult {
            node_id: task.node_id.clone(),
            worker: self.name().to_string(),
            insights: vec![Insight {
                kind: InsightKind::VideoAnalysis,
                node_id: task.node_id.clone(),
                confidence,
                summary,
                detail: InsightDetail::Video {
                    video_type,
                    duration,
                    key_moments: moments,
                },
            }],
            confidence,
            trend: None,
        })
    }

    fn learn(&self, experience: &Experience) {
        self.expertise.reinforce(self.category(), experience);
    }
}
