use async_trait::async_trait;
use tracing::debug;

use super::Expertise;
use crate::domain::entities::experience::Experience;
use crate::domain::entities::market_data::{ChartSeries, MarketItem};
use crate::domain::entities::task::{Insight, InsightDetail, InsightKind, Task, WorkerResult};
use crate::domain::error::DomainError;
use crate::domain::ports::worker::Worker;
use crate::domain::values::node_kind::{NodeKind, WorkerCategory};

const PATTERN_CONFIDENCE: f64 = 0.7;
const NO_PATTERN_CONFIDENCE: f64 = 0.3;

/// Charts: direction of the plotted series.
#[derive(Debug, Default)]
pub struct VisionWorker {
    expertise: Expertise,
}

impl VisionWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expertise(&self) -> &Expertise {
        &self.expertise
    }
}

/// `uptrend`, `downtrend` or `sideways` from first and last point; `None`
/// with fewer than two points.
pub fn chart_pattern(data: &[f64]) -> Option<&'static str> {
    match data {
        [first, .., last] if last > first => Some("uptrend"),
        [first, .., last] if last < first => Some("downtrend"),
        [_, .., _] => Some("sideways"),
        _ => None,
    }
}

fn direction(pattern: &str) -> &'static str {
    match pattern {
        "uptrend" => "bullish",
        "downtrend" => "bearish",
        _ => "sideways",
    }
}

#[async_trait]
impl Worker for VisionWorker {
    fn name(&self) -> &'static str {
        "vision"
    }

    fn category(&self) -> WorkerCategory {
        WorkerCategory::Vision
    }

    async fn process(&self, task: &Task) -> Result<WorkerResult, DomainError> {
        if task.kind != NodeKind::Chart {
            return Err(DomainError::InvalidInput(format!(
                "vision worker cannot handle '{}' nodes",
                task.kind
            )));
        }
        self.expertise.record_task();
        let chart = ChartSeries::from_metadata(&task.metadata)?;
        let chart_type = chart.chart_type.clone().unwrap_or_else(|| "line".into());
        let pattern = chart_pattern(&chart.data);
        debug!(node_id = %task.node_id, ?pattern, "Vision worker analyzed chart");

        let confidence = self.expertise.calibrate(if pattern.is_some() {
            PATTERN_CONFIDENCE
        } else {
            NO_PATTERN_CONFIDENCE
        });
        let patterns: Vec<String> = pattern.iter().map(|p| p.to_string()).collect();
        let summary = match pattern {
            Some(p) => format!("{chart_type} chart shows {p}"),
            None => format!("{chart_type} chart has too few points for a pattern"),
        };

        Ok(WorkerResult {
            node_id: task.node_id.clone(),
            worker: self.name().to_string(),
            insights: vec![Insight {
                kind: InsightKind::ChartAnalysis,
                node_id: task.node_id.clone(),
                confidence,
                summary,
                detail: InsightDetail::Chart {
                    chart_type,
                    patterns,
                },
            }],
            confidence,
            trend: pattern.map(|p| direction(p).to_string()),
        })
    }

    fn learn(&self, experience: &Experience) {
        self.expertise.reinforce(self.category(), experience);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_pattern() {
        assert_eq!(chart_pattern(&[1.0, 3.0, 2.0]), Some("uptrend"));
        assert_eq!(chart_pattern(&[3.0, 1.0]), Some("downtrend"));
        assert_eq!(chart_pattern(&[2.0, 5.0, 2.0]), Some("sideways"));
        assert_eq!(chart_pattern(&[2.0]), None);
        assert_eq!(chart_pattern(&[]), None);
    }
}
