pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

use crate::application::coordinator::{AnalysisReport, BuildReport, Coordinator};
use crate::application::experience_memory::{
    ExperienceMemory, KnowledgeSnapshot, LearningResult, MemoryStats,
};
use crate::domain::entities::experience::{Experience, NewExperience};
use crate::domain::entities::market_data::MarketData;
use crate::domain::error::DomainError;
use crate::domain::ports::insight_archive::{ArchiveStats, ArchivedInsight, InsightArchive};
use crate::domain::ports::worker::Worker;
use crate::domain::priority_graph::PriorityGraph;
use crate::infrastructure::archive;
use crate::infrastructure::config::Config;
use crate::infrastructure::workers::default_workers;
use std::sync::{Arc, Mutex};

pub struct TrendGraph {
    coordinator: Coordinator,
}

impl TrendGraph {
    pub fn new(config: &Config) -> Result<Self, DomainError> {
        let archive = archive::from_config(&config.archive);
        Self::with_components(config, default_workers(), archive, None)
    }

    /// Like [`new`](Self::new), resuming from previously exported knowledge.
    pub fn restore(config: &Config, snapshot: KnowledgeSnapshot) -> Result<Self, DomainError> {
        let archive = archive::from_config(&config.archive);
        Self::with_components(config, default_workers(), archive, Some(snapshot))
    }

    pub fn with_components(
        config: &Config,
        workers: Vec<Arc<dyn Worker>>,
        archive: Arc<dyn InsightArchive>,
        snapshot: Option<KnowledgeSnapshot>,
    ) -> Result<Self, DomainError> {
        config.validate()?;
        let memory = match snapshot {
            Some(snapshot) => ExperienceMemory::from_snapshot(config.memory.clone(), snapshot)?,
            None => ExperienceMemory::new(config.memory.clone())?,
        };
        let coordinator = Coordinator::new(
            config.analysis.clone(),
            workers,
            Arc::new(Mutex::new(memory)),
            archive,
        )?;
        Ok(Self { coordinator })
    }

    pub async fn analyze(&mut self, data: &MarketData) -> Result<AnalysisReport, DomainError> {
        self.coordinator.analyze(data).await
    }

    pub async fn analyze_json(&mut self, json: &str) -> Result<AnalysisReport, DomainError> {
        let data: MarketData = serde_json::from_str(json)?;
        self.analyze(&data).await
    }

    pub fn build_graph(&self, data: &MarketData) -> (PriorityGraph, BuildReport) {
        self.coordinator.build_graph(data)
    }

    /// Priority ranking of `data` without dispatching any work.
    pub fn rank(
        &self,
        data: &MarketData,
        threshold: f64,
    ) -> Result<(PriorityGraph, Vec<(String, f64)>), DomainError> {
        let (graph, _) = self.coordinator.build_graph(data);
        let ranked = self
            .coordinator
            .prioritize(&graph, threshold, self.coordinator.config().max_nodes())?;
        Ok((graph, ranked))
    }

    pub fn record_experience(&self, experience: NewExperience) -> Result<Experience, DomainError> {
        self.coordinator.record_experience(experience)
    }

    /// Learn from a replay of `batch_size` experiences, or the configured
    /// default batch when `None`.
    pub fn learn(&mut self, batch_size: Option<usize>) -> Result<LearningResult, DomainError> {
        match batch_size {
            Some(n) => {
                let batch = self.with_memory(|m| m.replay(n))?;
                self.coordinator.learn(Some(&batch))
            }
            None => self.coordinator.learn(None),
        }
    }

    pub fn stats(&self) -> Result<MemoryStats, DomainError> {
        self.with_memory(|m| m.stats())
    }

    pub fn export_knowledge(&self) -> Result<KnowledgeSnapshot, DomainError> {
        self.with_memory(|m| m.export_knowledge())
    }

    pub async fn recall(&self, query: &str, limit: usize) -> Result<Vec<ArchivedInsight>, DomainError> {
        self.coordinator.recall(query, limit).await
    }

    pub async fn archive_stats(&self) -> Result<ArchiveStats, DomainError> {
        self.coordinator.archive().stats().await
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    fn with_memory<T>(&self, f: impl FnOnce(&ExperienceMemory) -> T) -> Result<T, DomainError> {
        let memory = self.coordinator.memory();
        let guard = memory
            .lock()
            .map_err(|e| DomainError::LockPoisoned(e.to_string()))?;
        Ok(f(&guard))
    }
}
