use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::domain::entities::market_data::Metadata;
use crate::domain::entities::task::Insight;
use crate::domain::error::DomainError;
use crate::domain::ports::insight_archive::{ArchiveStats, ArchivedInsight, InsightArchive};

/// Remote archive speaking a small JSON API:
/// `POST /insights`, `POST /query`, `GET /stats`.
pub struct HttpArchive {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct StoreRequest<'a> {
    insight: &'a Insight,
    metadata: Metadata,
}

#[derive(Deserialize)]
struct StoreResponse {
    id: String,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    matches: Vec<ArchivedInsight>,
}

#[derive(Deserialize)]
struct StatsResponse {
    total_insights: usize,
}

/// Upper bound on any single archive request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

impl HttpArchive {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_timeout(endpoint, api_key, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.endpoint)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, DomainError> {
        let resp = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| DomainError::Archive(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DomainError::Archive(format!("archive returned {status}: {body}")));
        }
        Ok(resp)
    }
}

#[async_trait]
impl InsightArchive for HttpArchive {
    async fn store(&self, insight: &Insight, metadata: Metadata) -> Result<String, DomainError> {
        let request = self
            .client
            .post(self.url("insights"))
            .json(&StoreRequest { insight, metadata });
        let resp: StoreResponse = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| DomainError::Parse(e.to_string()))?;
        Ok(resp.id)
    }

    async fn similar(&self, query: &str, top_k: usize) -> Result<Vec<ArchivedInsight>, DomainError> {
        let request = self
            .client
            .post(self.url("query"))
            .json(&QueryRequest { query, top_k });
        let resp: QueryResponse = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| DomainError::Parse(e.to_string()))?;
        Ok(resp.matches)
    }

    async fn stats(&self) -> Result<ArchiveStats, DomainError> {
        let resp: StatsResponse = self
            .send(self.client.get(self.url("stats")))
            .await?
            .json()
            .await
            .map_err(|e| DomainError::Parse(e.to_string()))?;
        Ok(ArchiveStats {
            storage_type: "http".into(),
            total_insights: resp.total_insights,
        })
    }
}
