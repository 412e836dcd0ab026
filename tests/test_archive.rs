//! Insight archives: in-memory similarity and the HTTP client.

use std::io::Write;
use std::time::Duration;

use mockito::Matcher;
use serde_json::json;
use trendgraph::domain::entities::market_data::Metadata;
use trendgraph::domain::entities::task::{Insight, InsightDetail, InsightKind};
use trendgraph::domain::error::DomainError;
use trendgraph::domain::ports::insight_archive::InsightArchive;
use trendgraph::domain::values::confidence::Confidence;
use trendgraph::infrastructure::archive::{HttpArchive, InMemoryArchive};

fn insight(node_id: &str, summary: &str) -> Insight {
    Insight {
        kind: InsightKind::TextAnalysis,
        node_id: node_id.to_string(),
        confidence: Confidence::saturating(0.8),
        summary: summary.to_string(),
        detail: InsightDetail::Sentiment {
            sentiment: "positive".into(),
            score: 0.9,
            positive_signals: 2,
            negative_signals: 0,
        },
    }
}

#[tokio::test]
async fn test_similar_ranks_matching_insight_first() {
    let archive = InMemoryArchive::new(10);
    archive
        .store(&insight("news_0", "Apple profits rise on iPhone demand"), Metadata::new())
        .await
        .unwrap();
    let chips = archive
        .store(&insight("news_1", "Semiconductor shortage hits chip makers"), Metadata::new())
        .await
        .unwrap();
    archive
        .store(&insight("video_0", "Central bank holds rates steady"), Metadata::new())
        .await
        .unwrap();

    let matches = archive.similar("chip shortage semiconductor", 2).await.unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, chips);
    assert!(matches[0].score > matches[1].score);
    assert_eq!(matches[0].metadata["node_id"], "news_1");
}

#[tokio::test]
async fn test_in_memory_archive_is_bounded_fifo() {
    let archive = InMemoryArchive::new(2);
    let first = archive.store(&insight("a", "first insight"), Metadata::new()).await.unwrap();
    archive.store(&insight("b", "second insight"), Metadata::new()).await.unwrap();
    archive.store(&insight("c", "third insight"), Metadata::new()).await.unwrap();

    let stats = archive.stats().await.unwrap();
    assert_eq!(stats.total_insights, 2);
    assert_eq!(stats.storage_type, "in_memory");

    let matches = archive.similar("first insight", 10).await.unwrap();
    assert!(matches.iter().all(|m| m.id != first));
}

fn json_header(mock: mockito::Mock) -> mockito::Mock {
    mock.with_status(200).with_header("content-type", "application/json")
}

#[tokio::test]
async fn test_http_archive_query() {
    let mut server = mockito::Server::new_async().await;
    let mock = json_header(
        server
            .mock("POST", "/query")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::Json(json!({"query": "apple trend", "top_k": 3}))),
    )
    .with_body(r#"{"matches": [{"id": "insight_1", "score": 0.93, "summary": "AAPL price trend upward"}]}"#)
    .create_async()
    .await;

    let archive = HttpArchive::new(format!("{}/", server.url()), Some("secret".into()));
    let matches = archive.similar("apple trend", 3).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "insight_1");
    assert_eq!(matches[0].score, 0.93);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_http_archive_store_returns_server_id() {
    let mut server = mockito::Server::new_async().await;
    let mock = json_header(
        server
            .mock("POST", "/insights")
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::PartialJson(json!({
                "insight": {"node_id": "news_0", "summary": "Apple profits rise"},
                "metadata": {"cycle_id": "c-1"}
            }))),
    )
    .with_body(r#"{"id": "remote-42"}"#)
    .create_async()
    .await;

    let archive = HttpArchive::new(server.url(), None);
    let mut metadata = Metadata::new();
    metadata.insert("cycle_id".into(), json!("c-1"));
    let id = archive
        .store(&insight("news_0", "Apple profits rise"), metadata)
        .await
        .unwrap();
    assert_eq!(id, "remote-42");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_http_archive_error_status() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/stats")
        .with_status(503)
        .with_body(r#"{"error": "down"}"#)
        .create_async()
        .await;

    let archive = HttpArchive::new(server.url(), None);
    let err = archive.stats().await.unwrap_err();
    assert!(matches!(err, DomainError::Archive(msg) if msg.contains("503")));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_http_archive_request_timeout() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/stats")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(Duration::from_millis(500));
            w.write_all(br#"{"total_insights": 1}"#)
        })
        .create_async()
        .await;

    let archive = HttpArchive::with_timeout(server.url(), None, Duration::from_millis(50));
    // headers may arrive before the stalled body, so either stage can trip
    let err = archive.stats().await.unwrap_err();
    assert!(matches!(err, DomainError::Archive(_) | DomainError::Parse(_)));
}
