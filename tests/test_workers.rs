//! Category workers against realistic tasks.

mod common;

use chrono::Utc;
use common::metadata;
use serde_json::{json, Value};
use trendgraph::application::experience_memory::{ExperienceMemory, MemoryConfig};
use trendgraph::domain::entities::experience::{Action, NewExperience};
use trendgraph::domain::entities::task::{InsightDetail, InsightKind, Task};
use trendgraph::domain::error::DomainError;
use trendgraph::domain::ports::worker::Worker;
use trendgraph::domain::values::node_kind::{NodeKind, WorkerCategory};
use trendgraph::infrastructure::workers::{TextWorker, VideoWorker, VisionWorker};

fn task(node_id: &str, kind: NodeKind, payload: Value) -> Task {
    Task {
        node_id: node_id.to_string(),
        kind,
        priority: 0.8,
        metadata: metadata(payload),
    }
}

#[tokio::test]
async fn test_text_worker_stock_trend() {
    let worker = TextWorker::new();
    let result = worker
        .process(&task(
            "stock_AAPL",
            NodeKind::Stock,
            json!({"symbol": "AAPL", "prices": [180.0, 184.0, 183.0, 190.0], "volumes": [10.0, 30.0]}),
        ))
        .await
        .unwrap();

    assert_eq!(result.node_id, "stock_AAPL");
    assert_eq!(result.worker, "text");
    assert_eq!(result.trend.as_deref(), Some("bullish"));
    assert!((result.confidence.value() - 0.51).abs() < 1e-9);

    let insight = &result.insights[0];
    assert_eq!(insight.kind, InsightKind::PriceAnalysis);
    match &insight.detail {
        InsightDetail::Price {
            trend,
            data_points,
            volume_trend,
            average_volume,
            ..
        } => {
            assert_eq!(trend, "upward");
            assert_eq!(*data_points, 4);
            assert_eq!(volume_trend.as_deref(), Some("increasing"));
            assert_eq!(*average_volume, Some(20.0));
        }
        other => panic!("unexpected detail {other:?}"),
    }
}

#[tokio::test]
async fn test_text_worker_stock_without_history() {
    let worker = TextWorker::new();
    let result = worker
        .process(&task("stock_X", NodeKind::Stock, json!({"symbol": "X", "price": 10.0})))
        .await
        .unwrap();
    assert_eq!(result.trend, None);
    assert!((result.confidence.value() - 0.3).abs() < 1e-9);
}

#[tokio::test]
async fn test_text_worker_news_sentiment() {
    let worker = TextWorker::new();
    let result = worker
        .process(&task(
            "news_0",
            NodeKind::News,
            json!({"title": "Shares fall", "content": "Bearish outlook after steep losses"}),
        ))
        .await
        .unwrap();

    assert_eq!(result.trend.as_deref(), Some("bearish"));
    assert_eq!(result.insights[0].kind, InsightKind::TextAnalysis);
    match &result.insights[0].detail {
        InsightDetail::Sentiment {
            sentiment,
            score,
            negative_signals,
            ..
        } => {
            assert_eq!(sentiment, "negative");
            assert_eq!(*score, 0.0);
            assert_eq!(*negative_signals, 3);
        }
        other => panic!("unexpected detail {other:?}"),
    }
    // strong signal either way means high confidence
    assert_eq!(result.confidence.value(), 1.0);
}

#[tokio::test]
async fn test_worker_rejects_foreign_kinds() {
    let err = TextWorker::new()
        .process(&task("chart_0", NodeKind::Chart, json!({"data": [1.0]})))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidInput(_)));

    let err = VisionWorker::new()
        .process(&task("video_0", NodeKind::Video, json!({"title": "t"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidInput(_)));
}

#[tokio::test]
async fn test_malformed_payload_is_reported() {
    let err = VisionWorker::new()
        .process(&task("chart_0", NodeKind::Chart, json!({"data": "up and to the right"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::MalformedInput(_)));
}

#[tokio::test]
async fn test_vision_worker_patterns() {
    let worker = VisionWorker::new();
    let result = worker
        .process(&task("chart_0", NodeKind::Chart, json!({"data": [5.0, 4.0, 2.0], "chart_type": "bar"})))
        .await
        .unwrap();
    assert_eq!(result.trend.as_deref(), Some("bearish"));
    assert!((result.confidence.value() - 0.7).abs() < 1e-9);
    assert_eq!(
        result.insights[0].detail,
        InsightDetail::Chart {
            chart_type: "bar".into(),
            patterns: vec!["downtrend".into()],
        }
    );
}

#[tokio::test]
async fn test_video_worker_key_moments() {
    let worker = VideoWorker::new();
    let result = worker
        .process(&task(
            "video_0",
            NodeKind::Video,
            json!({"title": "Q3 call", "transcript": "Earnings were solid. Forecast unchanged.", "duration": 1800.0}),
        ))
        .await
        .unwrap();

    assert_eq!(result.trend, None);
    assert!((result.confidence.value() - 0.65).abs() < 1e-9);
    match &result.insights[0].detail {
        InsightDetail::Video {
            duration,
            key_moments,
            ..
        } => {
            assert_eq!(*duration, 1800.0);
            assert_eq!(key_moments.len(), 2);
            assert_eq!(key_moments[1].timestamp, 900.0);
            assert_eq!(key_moments[1].topic, "future_outlook");
        }
        other => panic!("unexpected detail {other:?}"),
    }
}

#[tokio::test]
async fn test_learning_raises_calibrated_confidence() {
    let worker = VisionWorker::new();
    let mut memory = ExperienceMemory::new(MemoryConfig::default()).unwrap();
    let good = memory
        .store_at(NewExperience::new(Action::new("vision"), 0.5), Utc::now())
        .unwrap();
    let other = memory
        .store(NewExperience::new(Action::new("text"), 0.5))
        .unwrap();

    worker.learn(&other);
    assert_eq!(worker.expertise().level(), 0.0);
    worker.learn(&good);
    worker.learn(&good);
    assert!((worker.expertise().level() - 0.1).abs() < 1e-9);

    let result = worker
        .process(&task("chart_0", NodeKind::Chart, json!({"data": [1.0, 2.0]})))
        .await
        .unwrap();
    assert!((result.confidence.value() - 0.77).abs() < 1e-9);
    assert_eq!(worker.category(), WorkerCategory::Vision);
    assert_eq!(worker.expertise().tasks(), 1);
}
