//! Bounded experience memory with replay sampling and importance pruning.
//!
//! Stores `(state, action, outcome, reward)` records and turns them into
//! strategy recommendations:
//!
//! - [`ExperienceMemory::replay`] mixes the highest-priority records
//!   (`recency + max(0, reward)`) with a uniform random sample
//! - [`ExperienceMemory::prune`] evicts by importance
//!   (`reward_weight·|reward| + recency_weight·1/(1 + age_hours)`), not FIFO
//! - [`ExperienceMemory::learn_from_batch`] groups records by `action.kind`
//!   and flags strategies to prioritize or deprioritize
//!
//! The memory is a plain single-owner value. Callers that share it across
//! cycles wrap it in a mutex so that store and prune stay serialized.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::entities::experience::{Experience, NewExperience};
use crate::domain::error::DomainError;
use crate::domain::values::recency::recency_weight;

const SNAPSHOT_VERSION: &str = "1.0.0";
const SNAPSHOT_TOP_EXPERIENCES: usize = 100;
const SNAPSHOT_HISTORY: usize = 50;
const ADAPTATION_WINDOW: usize = 5;

/// Tuning for [`ExperienceMemory`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Hard cap on stored experiences.
    pub capacity: usize,
    /// Batch size used when `learn_from_batch` replays on its own.
    pub replay_batch_size: usize,
    /// Starting learning rate. Adapted within [0.001, 0.1].
    pub learning_rate: f64,
    /// Share of `capacity` kept after a prune.
    pub retention_ratio: f64,
    /// Weight of `|reward|` in the importance score.
    pub reward_weight: f64,
    /// Weight of the recency term in the importance score.
    pub recency_weight: f64,
    /// Learning events kept in history.
    pub history_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            replay_batch_size: 32,
            learning_rate: 0.01,
            retention_ratio: 0.8,
            reward_weight: 0.6,
            recency_weight: 0.4,
            history_limit: 1_000,
        }
    }
}

impl MemoryConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.capacity == 0 {
            return Err(DomainError::Config("memory capacity must be at least 1".into()));
        }
        if !(self.retention_ratio > 0.0 && self.retention_ratio <= 1.0) {
            return Err(DomainError::Config(format!(
                "retention_ratio must be in (0, 1], got {}",
                self.retention_ratio
            )));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(DomainError::Config(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        if self.reward_weight < 0.0 || self.recency_weight < 0.0 {
            return Err(DomainError::Config("importance weights must be non-negative".into()));
        }
        if self.history_limit == 0 {
            return Err(DomainError::Config("history_limit must be at least 1".into()));
        }
        Ok(())
    }

    /// `floor(capacity * retention_ratio)`.
    pub fn retained_size(&self) -> usize {
        // nudge so that e.g. 10 * 0.7 does not floor to 6
        (self.capacity as f64 * self.retention_ratio + 1e-9).floor() as usize
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_experiences: u64,
    pub successful_predictions: u64,
    pub failed_predictions: u64,
    pub accuracy: f64,
}

impl PerformanceMetrics {
    fn record(&mut self, success: bool) {
        self.total_experiences += 1;
        if success {
            self.successful_predictions += 1;
        } else {
            self.failed_predictions += 1;
        }
        self.accuracy = self.successful_predictions as f64 / self.total_experiences as f64;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub strategy: String,
    pub count: usize,
    pub total_reward: f64,
    pub avg_reward: f64,
    pub success_count: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionStats {
    pub condition: String,
    pub count: usize,
    pub total_reward: f64,
    pub avg_reward: f64,
}

/// Aggregates extracted from one learning batch, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patterns {
    pub strategies: Vec<StrategyStats>,
    pub conditions: Vec<ConditionStats>,
}

impl Patterns {
    pub fn strategy(&self, name: &str) -> Option<&StrategyStats> {
        self.strategies.iter().find(|s| s.strategy == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recommendation {
    Prioritize { strategy: String, avg_reward: f64 },
    Deprioritize { strategy: String, success_rate: f64 },
}

impl Recommendation {
    pub fn strategy(&self) -> &str {
        match self {
            Recommendation::Prioritize { strategy, .. }
            | Recommendation::Deprioritize { strategy, .. } => strategy,
        }
    }

    pub fn reason(&self) -> String {
        match self {
            Recommendation::Prioritize { avg_reward, .. } => {
                format!("Highest average reward: {avg_reward:.3}")
            }
            Recommendation::Deprioritize { success_rate, .. } => {
                format!("Low success rate: {:.2}%", success_rate * 100.0)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningStatus {
    Learned,
    NoExperiences,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningResult {
    pub status: LearningStatus,
    pub batch_size: usize,
    pub learning_updates: usize,
    pub patterns: Patterns,
    pub recommendations: Vec<Recommendation>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub performance_metrics: PerformanceMetrics,
    pub learning_rate: f64,
    pub adaptation_factor: f64,
    pub memory_usage: usize,
    pub memory_capacity: usize,
    pub total_learning_events: usize,
    pub prune_count: u64,
    pub recent_recommendations: Vec<Recommendation>,
}

/// Exportable learned state; see [`ExperienceMemory::export_knowledge`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub performance_metrics: PerformanceMetrics,
    pub learning_rate: f64,
    pub adaptation_factor: f64,
    pub top_experiences: Vec<Experience>,
    pub learning_history: Vec<LearningResult>,
}

#[derive(Debug)]
pub struct ExperienceMemory {
    config: MemoryConfig,
    memory: Vec<Experience>,
    next_id: u64,
    metrics: PerformanceMetrics,
    history: Vec<LearningResult>,
    learning_rate: f64,
    adaptation_factor: f64,
    prune_count: u64,
}

impl ExperienceMemory {
    pub fn new(config: MemoryConfig) -> Result<Self, DomainError> {
        config.validate()?;
        Ok(Self {
            learning_rate: config.learning_rate,
            config,
            memory: Vec::new(),
            next_id: 0,
            metrics: PerformanceMetrics::default(),
            history: Vec::new(),
            adaptation_factor: 1.0,
            prune_count: 0,
        })
    }

    /// Rebuild a memory from an exported snapshot. Imported experiences get
    /// fresh ids but keep their timestamps; counters come from the snapshot.
    pub fn from_snapshot(config: MemoryConfig, snapshot: KnowledgeSnapshot) -> Result<Self, DomainError> {
        let metrics = snapshot.performance_metrics;
        if metrics.successful_predictions + metrics.failed_predictions != metrics.total_experiences {
            return Err(DomainError::InvalidInput(
                "snapshot counters do not add up to total_experiences".into(),
            ));
        }
        if (metrics.total_experiences as usize) < snapshot.top_experiences.len() {
            return Err(DomainError::InvalidInput(
                "snapshot holds more experiences than its counters record".into(),
            ));
        }

        let mut memory = Self::new(config)?;
        memory.metrics = metrics;
        memory.learning_rate = snapshot.learning_rate.clamp(0.001, 0.1);
        memory.adaptation_factor = snapshot.adaptation_factor;

        let mut experiences = snapshot.top_experiences;
        experiences.sort_by_key(|e| e.id);
        for mut exp in experiences {
            if !exp.reward.is_finite() {
                return Err(DomainError::InvalidInput(format!(
                    "snapshot experience {} has non-finite reward",
                    exp.id
                )));
            }
            exp.id = memory.next_id;
            memory.next_id += 1;
            memory.memory.push(exp);
        }

        let skip = snapshot
            .learning_history
            .len()
            .saturating_sub(memory.config.history_limit);
        memory.history = snapshot.learning_history.into_iter().skip(skip).collect();

        if memory.memory.len() > memory.config.capacity {
            memory.prune();
        }
        Ok(memory)
    }

    /// Store an experience stamped with the current time and return the
    /// stored record.
    pub fn store(&mut self, experience: NewExperience) -> Result<Experience, DomainError> {
        self.store_at(experience, Utc::now())
    }

    /// Store an experience with an explicit timestamp.
    pub fn store_at(
        &mut self,
        experience: NewExperience,
        timestamp: DateTime<Utc>,
    ) -> Result<Experience, DomainError> {
        if !experience.reward.is_finite() {
            return Err(DomainError::InvalidInput(format!(
                "reward must be finite, got {}",
                experience.reward
            )));
        }

        let id = self.next_id;
        self.next_id += 1;

        let exp = Experience::from_new(id, experience, timestamp);
        self.metrics.record(exp.is_success());
        self.memory.push(exp.clone());

        if self.memory.len() > self.config.capacity {
            self.prune();
        }
        Ok(exp)
    }

    /// Priority-weighted replay sample using the thread-local RNG.
    pub fn replay(&self, batch_size: usize) -> Vec<Experience> {
        self.replay_with_rng(batch_size, &mut rand::thread_rng())
    }

    /// Replay `batch_size` distinct experiences: the top half by
    /// `index/len + max(0, reward)`, the rest drawn uniformly from the
    /// remaining pool. Asking for the whole memory returns it in order.
    pub fn replay_with_rng<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Vec<Experience> {
        if self.memory.is_empty() || batch_size == 0 {
            return Vec::new();
        }
        if batch_size >= self.memory.len() {
            return self.memory.clone();
        }

        let len = self.memory.len() as f64;
        let mut ranked: Vec<(usize, f64)> = self
            .memory
            .iter()
            .enumerate()
            .map(|(i, exp)| (i, i as f64 / len + exp.reward.max(0.0)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let top_half = batch_size / 2;
        let random_half = batch_size - top_half;

        let mut sampled: Vec<Experience> = ranked[..top_half]
            .iter()
            .map(|(i, _)| self.memory[*i].clone())
            .collect();

        let pool = &ranked[top_half..];
        for pos in rand::seq::index::sample(rng, pool.len(), random_half) {
            sampled.push(self.memory[pool[pos].0].clone());
        }
        sampled
    }

    /// Evict down to `floor(capacity * retention_ratio)` by importance.
    pub fn prune(&mut self) {
        self.prune_at(Utc::now());
    }

    /// [`prune`](Self::prune) with ages measured against `now`.
    pub fn prune_at(&mut self, now: DateTime<Utc>) {
        let target = self.config.retained_size();
        let before = self.memory.len();
        if before <= target {
            return;
        }

        let mut ranked: Vec<(usize, f64)> = self
            .memory
            .iter()
            .enumerate()
            .map(|(i, exp)| (i, self.importance(exp, &now)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut keep: Vec<usize> = ranked.into_iter().take(target).map(|(i, _)| i).collect();
        keep.sort_unstable();

        let mut old = std::mem::take(&mut self.memory);
        let mut kept = Vec::with_capacity(target);
        for i in keep.into_iter().rev() {
            kept.push(old.swap_remove(i));
        }
        kept.reverse();
        self.memory = kept;
        self.prune_count += 1;

        debug!(before, after = self.memory.len(), "Pruned experience memory");
    }

    /// Eviction score: reward magnitude blended with hyperbolic recency.
    pub fn importance(&self, experience: &Experience, now: &DateTime<Utc>) -> f64 {
        self.config.reward_weight * experience.reward.abs()
            + self.config.recency_weight * recency_weight(&experience.timestamp, now)
    }

    /// Learn from `batch`, or from a default-sized replay when `None`.
    pub fn learn_from_batch(&mut self, batch: Option<&[Experience]>) -> LearningResult {
        let replayed;
        let batch = match batch {
            Some(b) => b,
            None => {
                replayed = self.replay(self.config.replay_batch_size);
                &replayed[..]
            }
        };

        if batch.is_empty() {
            return LearningResult {
                status: LearningStatus::NoExperiences,
                batch_size: 0,
                learning_updates: 0,
                patterns: Patterns::default(),
                recommendations: Vec::new(),
                timestamp: Utc::now(),
            };
        }

        let patterns = extract_patterns(batch);
        let recommendations = recommend(&patterns);
        let result = LearningResult {
            status: LearningStatus::Learned,
            batch_size: batch.len(),
            learning_updates: recommendations.len(),
            patterns,
            recommendations,
            timestamp: Utc::now(),
        };

        self.history.push(result.clone());
        if self.history.len() > self.config.history_limit {
            let excess = self.history.len() - self.config.history_limit;
            self.history.drain(..excess);
        }

        self.adapt_learning_rate();
        result
    }

    /// Scale the learning rate by the average update count of the last
    /// five learning events: up when busy, down when stagnant.
    pub fn adapt_learning_rate(&mut self) {
        if self.history.len() < ADAPTATION_WINDOW {
            return;
        }

        let recent = &self.history[self.history.len() - ADAPTATION_WINDOW..];
        let avg_updates = recent.iter().map(|e| e.learning_updates).sum::<usize>() as f64
            / ADAPTATION_WINDOW as f64;

        if avg_updates > 3.0 {
            self.learning_rate = (self.learning_rate * 1.1).min(0.1);
        } else if avg_updates < 1.0 {
            self.learning_rate = (self.learning_rate * 0.9).max(0.001);
        }
        self.adaptation_factor = 1.0 + self.learning_rate * 10.0;
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            performance_metrics: self.metrics.clone(),
            learning_rate: self.learning_rate,
            adaptation_factor: self.adaptation_factor,
            memory_usage: self.memory.len(),
            memory_capacity: self.config.capacity,
            total_learning_events: self.history.len(),
            prune_count: self.prune_count,
            recent_recommendations: self
                .history
                .last()
                .map(|e| e.recommendations.clone())
                .unwrap_or_default(),
        }
    }

    pub fn export_knowledge(&self) -> KnowledgeSnapshot {
        let skip = self.history.len().saturating_sub(SNAPSHOT_HISTORY);
        KnowledgeSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            exported_at: Utc::now(),
            performance_metrics: self.metrics.clone(),
            learning_rate: self.learning_rate,
            adaptation_factor: self.adaptation_factor,
            top_experiences: self.replay(SNAPSHOT_TOP_EXPERIENCES),
            learning_history: self.history[skip..].to_vec(),
        }
    }

    pub fn experiences(&self) -> &[Experience] {
        &self.memory
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn history(&self) -> &[LearningResult] {
        &self.history
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn adaptation_factor(&self) -> f64 {
        self.adaptation_factor
    }

    pub fn prune_count(&self) -> u64 {
        self.prune_count
    }
}

fn extract_patterns(batch: &[Experience]) -> Patterns {
    let mut patterns = Patterns::default();

    for exp in batch {
        let pos = match patterns
            .strategies
            .iter()
            .position(|s| s.strategy == exp.action.kind)
        {
            Some(pos) => pos,
            None => {
                patterns.strategies.push(StrategyStats {
                    strategy: exp.action.kind.clone(),
                    count: 0,
                    total_reward: 0.0,
                    avg_reward: 0.0,
                    success_count: 0,
                    success_rate: 0.0,
                });
                patterns.strategies.len() - 1
            }
        };
        let s = &mut patterns.strategies[pos];
        s.count += 1;
        s.total_reward += exp.reward;
        if exp.is_success() {
            s.success_count += 1;
        }

        let condition = exp.condition();
        let pos = match patterns.conditions.iter().position(|c| c.condition == condition) {
            Some(pos) => pos,
            None => {
                patterns.conditions.push(ConditionStats {
                    condition: condition.to_string(),
                    count: 0,
                    total_reward: 0.0,
                    avg_reward: 0.0,
                });
                patterns.conditions.len() - 1
            }
        };
        let c = &mut patterns.conditions[pos];
        c.count += 1;
        c.total_reward += exp.reward;
    }

    for s in &mut patterns.strategies {
        s.avg_reward = s.total_reward / s.count as f64;
        s.success_rate = s.success_count as f64 / s.count as f64;
    }
    for c in &mut patterns.conditions {
        c.avg_reward = c.total_reward / c.count as f64;
    }
    patterns
}

fn recommend(patterns: &Patterns) -> Vec<Recommendation> {
    let mut updates = Vec::new();

    // a later strategy must beat the current best strictly; ties keep the first seen
    let best = patterns.strategies.iter().fold(None::<&StrategyStats>, |best, s| match best {
        Some(b) if b.avg_reward >= s.avg_reward => Some(b),
        _ => Some(s),
    });
    if let Some(best) = best {
        updates.push(Recommendation::Prioritize {
            strategy: best.strategy.clone(),
            avg_reward: best.avg_reward,
        });
    }

    for s in &patterns.strategies {
        if s.success_rate < 0.3 && s.count > 5 {
            updates.push(Recommendation::Deprioritize {
                strategy: s.strategy.clone(),
                success_rate: s.success_rate,
            });
        }
    }
    updates
}
