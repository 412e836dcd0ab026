use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::entities::market_data::Metadata;
use crate::domain::entities::task::Insight;
use crate::domain::error::DomainError;

/// An insight retrieved from the archive with its similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedInsight {
    pub id: String,
    pub score: f64,
    pub summary: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveStats {
    pub storage_type: String,
    pub total_insights: usize,
}

/// Long-term insight storage, selected once at construction time.
#[async_trait]
pub trait InsightArchive: Send + Sync {
    async fn store(&self, insight: &Insight, metadata: Metadata) -> Result<String, DomainError>;
    async fn similar(&self, query: &str, top_k: usize) -> Result<Vec<ArchivedInsight>, DomainError>;
    async fn stats(&self) -> Result<ArchiveStats, DomainError>;
}
