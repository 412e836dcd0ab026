//! Shared test helpers.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use trendgraph::domain::entities::experience::Experience;
use trendgraph::domain::entities::market_data::{MarketData, Metadata};
use trendgraph::domain::entities::task::{Insight, InsightDetail, InsightKind, Task, WorkerResult};
use trendgraph::domain::error::DomainError;
use trendgraph::domain::ports::insight_archive::{ArchiveStats, ArchivedInsight, InsightArchive};
use trendgraph::domain::ports::worker::Worker;
use trendgraph::domain::values::confidence::Confidence;
use trendgraph::domain::values::node_kind::WorkerCategory;
use trendgraph::infrastructure::archive::InMemoryArchive;
use trendgraph::infrastructure::config::Config;
use trendgraph::infrastructure::workers::default_workers;
use trendgraph::TrendGraph;

pub fn setup() -> TrendGraph {
    setup_with(Config::default(), default_workers())
}

pub fn setup_with(config: Config, workers: Vec<Arc<dyn Worker>>) -> TrendGraph {
    TrendGraph::with_components(&config, workers, Arc::new(InMemoryArchive::new(100)), None).unwrap()
}

pub fn sample_market_data() -> MarketData {
    serde_json::from_value(json!({
        "target": "tech_sector",
        "stocks": [
            {"symbol": "AAPL", "prices": [180.0, 182.5, 185.0], "volumes": [1000.0, 1200.0, 1500.0]},
            {"symbol": "MSFT", "prices": [410.0, 405.0], "weight": 1.2}
        ],
        "news": [
            {"title": "Apple profits rise on strong growth", "related_stocks": ["AAPL", "MSFT"]},
            {"title": "Chipmakers drop after loss warning", "related_stocks": ["NVDA"]}
        ],
        "charts": [
            {"data": [1.0, 2.0, 3.0], "chart_type": "candlestick"}
        ],
        "videos": [
            {"title": "Q3 call", "transcript": "Revenue beat; guidance raised", "duration": 600.0}
        ]
    }))
    .unwrap()
}

pub fn metadata(value: Value) -> Metadata {
    value.as_object().cloned().unwrap_or_default()
}

pub fn result_with(node_id: &str, trend: Option<&str>, confidence: f64) -> WorkerResult {
    let confidence = Confidence::saturating(confidence);
    WorkerResult {
        node_id: node_id.to_string(),
        worker: "stub".into(),
        insights: vec![Insight {
            kind: InsightKind::ChartAnalysis,
            node_id: node_id.to_string(),
            confidence,
            summary: format!("stub insight for {node_id}"),
            detail: InsightDetail::Chart {
                chart_type: "line".into(),
                patterns: vec![],
            },
        }],
        confidence,
        trend: trend.map(String::from),
    }
}

/// Answers every task with a fixed trend and confidence.
pub struct StubWorker {
    pub category: WorkerCategory,
    pub trend: Option<&'static str>,
    pub confidence: f64,
}

#[async_trait]
impl Worker for StubWorker {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn category(&self) -> WorkerCategory {
        self.category
    }

    async fn process(&self, task: &Task) -> Result<WorkerResult, DomainError> {
        Ok(result_with(&task.node_id, self.trend, self.confidence))
    }

    fn learn(&self, _experience: &Experience) {}
}

/// Fails every task.
pub struct FailingWorker(pub WorkerCategory);

#[async_trait]
impl Worker for FailingWorker {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn category(&self) -> WorkerCategory {
        self.0
    }

    async fn process(&self, task: &Task) -> Result<WorkerResult, DomainError> {
        Err(DomainError::InvalidInput(format!("cannot process {}", task.node_id)))
    }

    fn learn(&self, _experience: &Experience) {}
}

/// Sleeps past any reasonable test timeout.
pub struct SlowWorker(pub WorkerCategory);

#[async_trait]
impl Worker for SlowWorker {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn category(&self) -> WorkerCategory {
        self.0
    }

    async fn process(&self, task: &Task) -> Result<WorkerResult, DomainError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(result_with(&task.node_id, None, 0.5))
    }

    fn learn(&self, _experience: &Experience) {}
}

/// Archive whose writes never complete.
pub struct HangingArchive;

#[async_trait]
impl InsightArchive for HangingArchive {
    async fn store(&self, _insight: &Insight, _metadata: Metadata) -> Result<String, DomainError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("never".into())
    }

    async fn similar(&self, _query: &str, _top_k: usize) -> Result<Vec<ArchivedInsight>, DomainError> {
        Ok(Vec::new())
    }

    async fn stats(&self) -> Result<ArchiveStats, DomainError> {
        Ok(ArchiveStats {
            storage_type: "hanging".into(),
            total_insights: 0,
        })
    }
}
