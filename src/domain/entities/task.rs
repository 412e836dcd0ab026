//! Worker contract: the task handed to a worker and the result it returns.

use serde::{Deserialize, Serialize};

use crate::domain::entities::market_data::Metadata;
use crate::domain::values::confidence::Confidence;
use crate::domain::values::node_kind::NodeKind;

/// One prioritized node assigned to a worker category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub node_id: String,
    pub kind: NodeKind,
    /// Priority score in [0, 1].
    pub priority: f64,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    TextAnalysis,
    PriceAnalysis,
    ChartAnalysis,
    VideoAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMoment {
    /// Offset in seconds.
    pub timestamp: f64,
    pub topic: String,
}

/// Worker-specific findings with a fixed schema per worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "detail_type", rename_all = "snake_case")]
pub enum InsightDetail {
    Sentiment {
        sentiment: String,
        score: f64,
        positive_signals: usize,
        negative_signals: usize,
    },
    Price {
        trend: String,
        volatility: f64,
        data_points: usize,
        volume_trend: Option<String>,
        average_volume: Option<f64>,
    },
    Chart {
        chart_type: String,
        patterns: Vec<String>,
    },
    Video {
        video_type: String,
        duration: f64,
        key_moments: Vec<KeyMoment>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub node_id: String,
    pub confidence: Confidence,
    pub summary: String,
    pub detail: InsightDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub node_id: String,
    pub worker: String,
    pub insights: Vec<Insight>,
    pub confidence: Confidence,
    /// Directional call, if the worker makes one. Feeds the trend vote.
    #[serde(default)]
    pub trend: Option<String>,
}
