use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::domain::entities::market_data::Metadata;
use crate::domain::entities::task::Insight;
use crate::domain::error::DomainError;
use crate::domain::ports::insight_archive::{ArchiveStats, ArchivedInsight, InsightArchive};

pub const EMBEDDING_DIM: usize = 256;

struct Entry {
    id: String,
    embedding: Vec<f32>,
    summary: String,
    metadata: Metadata,
}

/// Process-local archive: bounded FIFO ranked by cosine similarity over
/// hashed bag-of-words embeddings.
pub struct InMemoryArchive {
    capacity: usize,
    entries: Mutex<VecDeque<Entry>>,
}

impl InMemoryArchive {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VecDeque<Entry>>, DomainError> {
        self.entries.lock().map_err(|e| DomainError::Archive(e.to_string()))
    }
}

/// Feature-hashed term counts scaled to unit length; the sign bit spreads
/// collisions. Text without tokens embeds to the zero vector.
pub fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0_f32; EMBEDDING_DIM];
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let h = hasher.finish();
        let slot = (h % EMBEDDING_DIM as u64) as usize;
        vector[slot] += if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

/// Similarity of two [`embed`] outputs. Both are unit length (or zero), so
/// the dot product is already the cosine.
pub fn similarity(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}

#[async_trait]
impl InsightArchive for InMemoryArchive {
    async fn store(&self, insight: &Insight, mut metadata: Metadata) -> Result<String, DomainError> {
        let id = format!("insight_{}", Uuid::new_v4());
        metadata.insert("node_id".into(), json!(insight.node_id));
        metadata.insert("kind".into(), serde_json::to_value(insight.kind)?);
        metadata.insert("confidence".into(), json!(insight.confidence.value()));
        metadata.insert("stored_at".into(), json!(Utc::now().to_rfc3339()));

        let entry = Entry {
            id: id.clone(),
            embedding: embed(&insight.summary),
            summary: insight.summary.clone(),
            metadata,
        };

        let mut entries = self.lock()?;
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        Ok(id)
    }

    async fn similar(&self, query: &str, top_k: usize) -> Result<Vec<ArchivedInsight>, DomainError> {
        let query = embed(query);
        let entries = self.lock()?;
        let mut scored: Vec<ArchivedInsight> = entries
            .iter()
            .map(|e| ArchivedInsight {
                id: e.id.clone(),
                score: similarity(&query, &e.embedding),
                summary: e.summary.clone(),
                metadata: e.metadata.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn stats(&self) -> Result<ArchiveStats, DomainError> {
        Ok(ArchiveStats {
            storage_type: "in_memory".into(),
            total_insights: self.lock()?.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_is_unit_length() {
        let v = embed("AAPL price trend upward");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!((similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_scores_zero() {
        assert!(embed("").iter().all(|v| *v == 0.0));
        assert_eq!(similarity(&embed(""), &embed("anything")), 0.0);
        assert_eq!(similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_word_order_does_not_matter() {
        let a = embed("chip shortage");
        let b = embed("Shortage, chip!");
        assert!((similarity(&a, &b) - 1.0).abs() < 1e-5);
    }
}
