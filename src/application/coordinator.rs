//! Analysis cycle orchestration.
//!
//! One [`Coordinator::analyze`] call walks
//! `Idle → BuildingGraph → Prioritizing → Delegating → Aggregating → Idle`:
//!
//! 1. build a [`PriorityGraph`] from the market data (bad items skipped)
//! 2. rank nodes by normalized shortest-path distance from the root
//! 3. route ranked nodes to worker categories
//! 4. run the categories concurrently and fold their results into a
//!    [`ConsensusResult`]
//! 5. record one experience per category and archive the insights
//!
//! Only the experience memory, the insights cache and the learned kind
//! bias survive between cycles.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::consensus::{build_consensus, ConsensusMode, ConsensusResult};
use crate::application::dispatch::{dispatch, CategoryFailure};
use crate::application::experience_memory::{ExperienceMemory, LearningResult, Recommendation};
use crate::domain::entities::experience::{Action, Experience, NewExperience};
use crate::domain::entities::market_data::{
    ChartSeries, MarketData, MarketItem, Metadata, NewsArticle, StockQuote, VideoClip,
};
use crate::domain::entities::task::{Task, WorkerResult};
use crate::domain::error::DomainError;
use crate::domain::ports::insight_archive::{ArchivedInsight, InsightArchive};
use crate::domain::ports::worker::Worker;
use crate::domain::priority_graph::PriorityGraph;
use crate::domain::values::node_kind::{NodeKind, WorkerCategory};

pub const MENTIONS_RELATIONSHIP: &str = "mentions";

/// Default root-edge weight per item kind. Lower weight, higher priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KindWeights {
    pub stock: f64,
    pub news: f64,
    pub chart: f64,
    pub video: f64,
}

impl Default for KindWeights {
    fn default() -> Self {
        Self {
            stock: 1.0,
            news: 1.5,
            chart: 2.0,
            video: 3.0,
        }
    }
}

impl KindWeights {
    pub fn for_kind(&self, kind: &NodeKind) -> Option<f64> {
        match kind {
            NodeKind::Stock => Some(self.stock),
            NodeKind::News => Some(self.news),
            NodeKind::Chart => Some(self.chart),
            NodeKind::Video => Some(self.video),
            NodeKind::Root | NodeKind::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum priority score a node needs to be delegated.
    pub priority_threshold: f64,
    pub max_graph_depth: usize,
    pub node_count_multiplier: usize,
    pub kind_weights: KindWeights,
    /// Weight of news → stock `mentions` edges.
    pub mention_weight: f64,
    pub worker_timeout_ms: u64,
    pub consensus: ConsensusMode,
    pub min_bias: f64,
    pub max_bias: f64,
    /// Consensus results kept in the insights cache; oldest dropped first.
    pub insights_cache_limit: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            priority_threshold: 0.3,
            max_graph_depth: 5,
            node_count_multiplier: 3,
            kind_weights: KindWeights::default(),
            mention_weight: 0.5,
            worker_timeout_ms: 30_000,
            consensus: ConsensusMode::Majority,
            min_bias: 0.5,
            max_bias: 2.0,
            insights_cache_limit: 500,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !(0.0..=1.0).contains(&self.priority_threshold) {
            return Err(DomainError::Config(format!(
                "priority_threshold must be in [0, 1], got {}",
                self.priority_threshold
            )));
        }
        let w = &self.kind_weights;
        for (name, weight) in [
            ("stock", w.stock),
            ("news", w.news),
            ("chart", w.chart),
            ("video", w.video),
            ("mention", self.mention_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(DomainError::Config(format!(
                    "{name} weight must be a non-negative number, got {weight}"
                )));
            }
        }
        if self.max_graph_depth.checked_mul(self.node_count_multiplier).is_none() {
            return Err(DomainError::Config(format!(
                "max_graph_depth × node_count_multiplier overflows ({} × {})",
                self.max_graph_depth, self.node_count_multiplier
            )));
        }
        if self.worker_timeout_ms == 0 {
            return Err(DomainError::Config("worker_timeout_ms must be positive".into()));
        }
        if !(self.min_bias > 0.0 && self.min_bias <= 1.0 && self.max_bias >= 1.0) {
            return Err(DomainError::Config(format!(
                "bias bounds must satisfy 0 < min_bias <= 1 <= max_bias, got {}..{}",
                self.min_bias, self.max_bias
            )));
        }
        Ok(())
    }

    /// `max_graph_depth × node_count_multiplier`; zero means no limit.
    pub fn max_nodes(&self) -> Option<usize> {
        match self.max_graph_depth.saturating_mul(self.node_count_multiplier) {
            0 => None,
            n => Some(n),
        }
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    BuildingGraph,
    Prioritizing,
    Delegating,
    Aggregating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub section: String,
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildReport {
    pub skipped: Vec<SkippedItem>,
    pub mention_edges: usize,
}

impl BuildReport {
    fn skip(&mut self, section: &str, index: usize, reason: String) {
        warn!(section, index, %reason, "Skipping malformed item");
        self.skipped.push(SkippedItem {
            section: section.to_string(),
            index,
            reason,
        });
    }
}

/// Per-category task lists. Every category is present, possibly empty.
#[derive(Debug, Clone, Default)]
pub struct Delegation {
    pub tasks: BTreeMap<WorkerCategory, Vec<Task>>,
    /// Prioritized nodes whose kind has no worker category.
    pub dropped: usize,
}

impl Delegation {
    pub fn tasks_for(&self, category: WorkerCategory) -> &[Task] {
        self.tasks.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn counts(&self) -> BTreeMap<WorkerCategory, usize> {
        self.tasks.iter().map(|(c, t)| (*c, t.len())).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrioritizedNode {
    pub node_id: String,
    pub kind: NodeKind,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub cycle_id: String,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub node_count: usize,
    pub edge_count: usize,
    pub prioritized: Vec<PrioritizedNode>,
    pub delegated: BTreeMap<WorkerCategory, usize>,
    pub dropped_nodes: usize,
    pub skipped_items: Vec<SkippedItem>,
    pub failed_categories: Vec<CategoryFailure>,
    pub consensus: ConsensusResult,
    pub experiences_recorded: usize,
    pub archived_insights: usize,
}

impl AnalysisReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped_items.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed_categories.len()
    }
}

pub struct Coordinator {
    config: AnalysisConfig,
    workers: BTreeMap<WorkerCategory, Arc<dyn Worker>>,
    memory: Arc<Mutex<ExperienceMemory>>,
    archive: Arc<dyn InsightArchive>,
    state: CoordinatorState,
    insights_cache: Vec<ConsensusResult>,
    weight_bias: HashMap<NodeKind, f64>,
}

impl Coordinator {
    /// One worker per category; a later worker for the same category
    /// replaces an earlier one.
    pub fn new(
        config: AnalysisConfig,
        workers: Vec<Arc<dyn Worker>>,
        memory: Arc<Mutex<ExperienceMemory>>,
        archive: Arc<dyn InsightArchive>,
    ) -> Result<Self, DomainError> {
        config.validate()?;
        let workers = workers.into_iter().map(|w| (w.category(), w)).collect();
        Ok(Self {
            config,
            workers,
            memory,
            archive,
            state: CoordinatorState::Idle,
            insights_cache: Vec::new(),
            weight_bias: HashMap::new(),
        })
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Consensus results of past cycles, oldest first. Appended once per
    /// cycle and trimmed from the front to `insights_cache_limit`.
    pub fn insights_cache(&self) -> &[ConsensusResult] {
        &self.insights_cache
    }

    pub fn memory(&self) -> Arc<Mutex<ExperienceMemory>> {
        Arc::clone(&self.memory)
    }

    /// Learned multiplier on root-edge weights of `kind`; 1.0 until learned.
    pub fn weight_bias(&self, kind: &NodeKind) -> f64 {
        self.weight_bias.get(kind).copied().unwrap_or(1.0)
    }

    pub fn build_graph(&self, data: &MarketData) -> (PriorityGraph, BuildReport) {
        let mut graph = PriorityGraph::new();
        let mut report = BuildReport::default();
        let target = data.target();

        let mut root_meta = Metadata::new();
        root_meta.insert("timestamp".into(), json!(Utc::now().to_rfc3339()));
        graph.add_node(target, NodeKind::Root, root_meta);

        self.ingest::<StockQuote>(&mut graph, &mut report, target, "stocks", &data.stocks, |q, _| {
            format!("stock_{}", q.symbol)
        });

        let articles = self.ingest::<NewsArticle>(&mut graph, &mut report, target, "news", &data.news, |_, i| {
            format!("news_{i}")
        });
        for (news_id, article) in &articles {
            for symbol in &article.related_stocks {
                let stock_id = format!("stock_{symbol}");
                if !graph.contains(&stock_id) {
                    continue;
                }
                match graph.add_edge(news_id, &stock_id, self.config.mention_weight, MENTIONS_RELATIONSHIP) {
                    Ok(()) => report.mention_edges += 1,
                    Err(e) => warn!(%news_id, %stock_id, "Skipping mentions edge: {e}"),
                }
            }
        }

        self.ingest::<ChartSeries>(&mut graph, &mut report, target, "charts", &data.charts, |_, i| {
            format!("chart_{i}")
        });
        self.ingest::<VideoClip>(&mut graph, &mut report, target, "videos", &data.videos, |_, i| {
            format!("video_{i}")
        });

        info!(
            analysis_target = target,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            skipped = report.skipped.len(),
            "Built knowledge graph"
        );
        (graph, report)
    }

    /// Parse every item of one section and hang it off the root. Returns
    /// the ids and typed views of the items that made it into the graph.
    fn ingest<T: MarketItem>(
        &self,
        graph: &mut PriorityGraph,
        report: &mut BuildReport,
        root: &str,
        section: &str,
        items: &[Value],
        node_id: impl Fn(&T, usize) -> String,
    ) -> Vec<(String, T)> {
        let mut added = Vec::new();
        for (index, raw) in items.iter().enumerate() {
            let (item, metadata) = match T::parse(raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    report.skip(section, index, e.to_string());
                    continue;
                }
            };

            let id = node_id(&item, index);
            if id == root {
                report.skip(section, index, format!("node id '{id}' collides with the analysis target"));
                continue;
            }
            if graph.contains(&id) {
                report.skip(section, index, format!("duplicate node id '{id}'"));
                continue;
            }

            let base = item
                .weight()
                .or_else(|| self.config.kind_weights.for_kind(&T::KIND))
                .unwrap_or(1.0);
            let weight = base * self.weight_bias(&T::KIND);

            graph.add_node(id.as_str(), T::KIND, metadata);
            if let Err(e) = graph.connect(root, &id, weight) {
                report.skip(section, index, e.to_string());
                continue;
            }
            added.push((id, item));
        }
        added
    }

    pub fn prioritize(
        &self,
        graph: &PriorityGraph,
        threshold: f64,
        max_count: Option<usize>,
    ) -> Result<Vec<(String, f64)>, DomainError> {
        let root = graph
            .root()
            .ok_or_else(|| DomainError::UnknownNode("<root of empty graph>".into()))?;
        graph.priority_nodes(root, threshold, max_count)
    }

    pub fn delegate(
        &self,
        graph: &PriorityGraph,
        prioritized: &[(String, f64)],
    ) -> Result<Delegation, DomainError> {
        let mut delegation = Delegation {
            tasks: WorkerCategory::ALL.iter().map(|c| (*c, Vec::new())).collect(),
            dropped: 0,
        };

        for (node_id, score) in prioritized {
            let node = graph.node_info(node_id)?;
            match WorkerCategory::for_kind(&node.kind) {
                Some(category) => delegation.tasks.entry(category).or_default().push(Task {
                    node_id: node.id.clone(),
                    kind: node.kind.clone(),
                    priority: *score,
                    metadata: node.metadata.clone(),
                }),
                None => delegation.dropped += 1,
            }
        }

        if delegation.dropped > 0 {
            debug!(dropped = delegation.dropped, "Dropped nodes without a worker category");
        }
        Ok(delegation)
    }

    pub fn aggregate(&mut self, results: &BTreeMap<WorkerCategory, Vec<WorkerResult>>) -> ConsensusResult {
        let consensus = build_consensus(results, self.config.consensus);

        self.insights_cache.push(consensus.clone());
        if self.insights_cache.len() > self.config.insights_cache_limit {
            let excess = self.insights_cache.len() - self.config.insights_cache_limit;
            self.insights_cache.drain(..excess);
        }

        info!(
            insights = consensus.total_insights,
            confidence = consensus.confidence_score,
            trend = %consensus.overall_trend,
            "Aggregated worker results"
        );
        consensus
    }

    /// Run one full analysis cycle.
    pub async fn analyze(&mut self, data: &MarketData) -> Result<AnalysisReport, DomainError> {
        let outcome = self.run_cycle(data).await;
        self.enter(CoordinatorState::Idle);
        outcome
    }

    async fn run_cycle(&mut self, data: &MarketData) -> Result<AnalysisReport, DomainError> {
        let started_at = Utc::now();
        let cycle_id = Uuid::new_v4().to_string();
        info!(%cycle_id, analysis_target = data.target(), items = data.item_count(), "Starting analysis cycle");

        self.enter(CoordinatorState::BuildingGraph);
        let (graph, build_report) = self.build_graph(data);

        self.enter(CoordinatorState::Prioritizing);
        let prioritized = self.prioritize(&graph, self.config.priority_threshold, self.config.max_nodes())?;

        self.enter(CoordinatorState::Delegating);
        let delegation = self.delegate(&graph, &prioritized)?;
        let delegated = delegation.counts();
        let dropped_nodes = delegation.dropped;
        let outcome = dispatch(&self.workers, delegation.tasks, self.config.worker_timeout()).await;

        self.enter(CoordinatorState::Aggregating);
        let consensus = self.aggregate(&outcome.results);

        let mean_priority = if prioritized.is_empty() {
            0.0
        } else {
            prioritized.iter().map(|(_, s)| s).sum::<f64>() / prioritized.len() as f64
        };
        let state = json!({
            "target": data.target(),
            "condition": consensus.overall_trend,
            "nodes": graph.node_count(),
            "mean_priority": mean_priority,
        });
        let experiences = category_experiences(&outcome.results, &outcome.failures, &delegated, &state);
        let experiences_recorded = experiences.len();
        for experience in experiences {
            self.record_experience(experience)?;
        }

        let archived_insights = self.archive_insights(&consensus, &cycle_id, data.target()).await;

        let prioritized = prioritized
            .into_iter()
            .map(|(node_id, score)| {
                let kind = graph
                    .node_info(&node_id)
                    .map(|n| n.kind.clone())
                    .unwrap_or_else(|_| NodeKind::Other("unknown".into()));
                PrioritizedNode { node_id, kind, score }
            })
            .collect();

        Ok(AnalysisReport {
            cycle_id,
            target: data.target().to_string(),
            started_at,
            finished_at: Utc::now(),
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            prioritized,
            delegated,
            dropped_nodes,
            skipped_items: build_report.skipped,
            failed_categories: outcome.failures,
            consensus,
            experiences_recorded,
            archived_insights,
        })
    }

    /// Store caller-supplied outcome feedback and pass it on to every worker.
    pub fn record_experience(&self, experience: NewExperience) -> Result<Experience, DomainError> {
        let stored = self.lock_memory()?.store(experience)?;
        for worker in self.workers.values() {
            worker.learn(&stored);
        }
        Ok(stored)
    }

    /// Learn from `batch` (or a replay) and fold the recommendations into
    /// the per-kind weight bias.
    pub fn learn(&mut self, batch: Option<&[Experience]>) -> Result<LearningResult, DomainError> {
        let (result, step) = {
            let mut memory = self.lock_memory()?;
            let result = memory.learn_from_batch(batch);
            (result, memory.learning_rate() * memory.adaptation_factor())
        };

        for recommendation in &result.recommendations {
            let Ok(category) = recommendation.strategy().parse::<WorkerCategory>() else {
                continue;
            };
            let factor = match recommendation {
                Recommendation::Prioritize { .. } => 1.0 - step,
                Recommendation::Deprioritize { .. } => 1.0 + step,
            };
            for kind in category.kinds() {
                let bias = self.weight_bias.entry(kind.clone()).or_insert(1.0);
                *bias = (*bias * factor).clamp(self.config.min_bias, self.config.max_bias);
                debug!(%kind, bias = *bias, "Adjusted kind weight bias");
            }
        }
        Ok(result)
    }

    pub async fn recall(&self, query: &str, top_k: usize) -> Result<Vec<ArchivedInsight>, DomainError> {
        self.archive.similar(query, top_k).await
    }

    pub fn archive(&self) -> Arc<dyn InsightArchive> {
        Arc::clone(&self.archive)
    }

    fn enter(&mut self, next: CoordinatorState) {
        debug!(from = ?self.state, to = ?next, "Coordinator state transition");
        self.state = next;
    }

    fn lock_memory(&self) -> Result<MutexGuard<'_, ExperienceMemory>, DomainError> {
        self.memory
            .lock()
            .map_err(|e| DomainError::LockPoisoned(e.to_string()))
    }

    async fn archive_insights(&self, consensus: &ConsensusResult, cycle_id: &str, target: &str) -> usize {
        let mut archived = 0;
        for insight in &consensus.insights {
            let mut metadata = Metadata::new();
            metadata.insert("cycle_id".into(), json!(cycle_id));
            metadata.insert("target".into(), json!(target));
            let store = self.archive.store(insight, metadata);
            match tokio::time::timeout(self.config.worker_timeout(), store).await {
                Ok(Ok(_)) => archived += 1,
                Ok(Err(e)) => warn!(node_id = %insight.node_id, "Failed to archive insight: {e}"),
                Err(_) => warn!(
                    node_id = %insight.node_id,
                    timeout_ms = self.config.worker_timeout_ms,
                    "Archive write timed out"
                ),
            }
        }
        archived
    }
}

/// One experience per category that had work: mean confidence − 0.5 when it
/// completed, −1.0 when it failed.
fn category_experiences(
    results: &BTreeMap<WorkerCategory, Vec<WorkerResult>>,
    failures: &[CategoryFailure],
    delegated: &BTreeMap<WorkerCategory, usize>,
    state: &Value,
) -> Vec<NewExperience> {
    let mut experiences = Vec::new();

    for (category, category_results) in results {
        if category_results.is_empty() {
            continue;
        }
        let mean = category_results
            .iter()
            .map(|r| r.confidence.value())
            .sum::<f64>()
            / category_results.len() as f64;
        let insights: usize = category_results.iter().map(|r| r.insights.len()).sum();
        experiences.push(
            NewExperience::new(category_action(*category, delegated), mean - 0.5)
                .with_state(state.clone())
                .with_outcome(json!({"status": "completed", "results": category_results.len(), "insights": insights})),
        );
    }

    for failure in failures {
        experiences.push(
            NewExperience::new(category_action(failure.category, delegated), -1.0)
                .with_state(state.clone())
                .with_outcome(json!({"status": "failed", "reason": failure.reason})),
        );
    }
    experiences
}

fn category_action(category: WorkerCategory, delegated: &BTreeMap<WorkerCategory, usize>) -> Action {
    Action::new(category.to_string()).with_param("tasks", json!(delegated.get(&category).copied().unwrap_or(0)))
}
