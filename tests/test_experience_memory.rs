//! Storage, replay, pruning and learning of the experience memory.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use trendgraph::application::experience_memory::{
    ExperienceMemory, LearningStatus, MemoryConfig, Recommendation,
};
use trendgraph::domain::entities::experience::{Action, Experience, NewExperience};
use trendgraph::domain::error::DomainError;

fn memory(capacity: usize) -> ExperienceMemory {
    ExperienceMemory::new(MemoryConfig {
        capacity,
        ..Default::default()
    })
    .unwrap()
}

fn exp(kind: &str, reward: f64) -> NewExperience {
    NewExperience::new(Action::new(kind), reward)
}

fn stored(mem: &mut ExperienceMemory, batch: &[(&str, f64)]) -> Vec<Experience> {
    batch
        .iter()
        .map(|(kind, reward)| mem.store(exp(kind, *reward)).unwrap())
        .collect()
}

#[test]
fn test_store_assigns_ids_and_counts_outcomes() {
    let mut mem = memory(100);
    let first = mem.store(exp("text", 0.4)).unwrap();
    let second = mem.store(exp("text", 0.0)).unwrap();
    let third = mem.store(exp("vision", -1.0)).unwrap();
    assert!(first.id < second.id && second.id < third.id);

    let m = mem.metrics();
    assert_eq!(m.total_experiences, 3);
    assert_eq!(m.successful_predictions, 1);
    assert_eq!(m.failed_predictions, 2);
    assert!((m.accuracy - 1.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_non_finite_reward_rejected() {
    let mut mem = memory(10);
    assert!(matches!(mem.store(exp("text", f64::NAN)), Err(DomainError::InvalidInput(_))));
    assert!(mem.is_empty());
    assert_eq!(mem.metrics().total_experiences, 0);
}

#[test]
fn test_capacity_overflow_prunes_once_to_retained_size() {
    let mut mem = memory(10);
    for i in 0..10 {
        mem.store(exp("text", i as f64 / 10.0)).unwrap();
    }
    assert_eq!(mem.len(), 10);
    assert_eq!(mem.prune_count(), 0);

    mem.store(exp("text", 0.5)).unwrap();
    assert_eq!(mem.len(), 8);
    assert_eq!(mem.prune_count(), 1);
    assert_eq!(mem.metrics().total_experiences, 11);
}

#[test]
fn test_pruning_is_by_importance_not_age() {
    let mut mem = memory(10);
    let now = Utc::now();
    let veteran = mem
        .store_at(exp("text", 5.0), now - Duration::hours(48))
        .unwrap();
    for _ in 0..10 {
        mem.store_at(exp("text", 0.0), now).unwrap();
    }

    assert_eq!(mem.len(), 8);
    let ids: Vec<u64> = mem.experiences().iter().map(|e| e.id).collect();
    assert!(ids.contains(&veteran.id), "high-reward veteran evicted: {ids:?}");
    // survivors stay in insertion order
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
}

#[test]
fn test_pruned_memory_never_exceeds_capacity() {
    let mut mem = memory(5);
    for i in 0..50 {
        mem.store(exp("text", (i % 7) as f64 - 3.0)).unwrap();
        assert!(mem.len() <= 5);
    }
}

#[test]
fn test_replay_empty_and_whole_memory() {
    let mut mem = memory(100);
    assert!(mem.replay(10).is_empty());

    stored(&mut mem, &[("a", 0.1), ("b", 0.2), ("c", 0.3)]);
    let all = mem.replay(3);
    let ids: Vec<u64> = all.iter().map(|e| e.id).collect();
    let expected: Vec<u64> = mem.experiences().iter().map(|e| e.id).collect();
    assert_eq!(ids, expected);
    assert_eq!(mem.replay(50).len(), 3);
}

#[test]
fn test_replay_sample_is_distinct_and_sized() {
    let mut mem = memory(100);
    for i in 0..20 {
        mem.store(exp("text", (i % 5) as f64 * 0.1)).unwrap();
    }
    let mut rng = StdRng::seed_from_u64(7);
    for batch in [1, 2, 5, 10, 19] {
        let sample = mem.replay_with_rng(batch, &mut rng);
        assert_eq!(sample.len(), batch);
        let unique: HashSet<u64> = sample.iter().map(|e| e.id).collect();
        assert_eq!(unique.len(), batch, "duplicate in batch of {batch}");
    }
}

#[test]
fn test_replay_top_half_favours_reward() {
    let mut mem = memory(100);
    mem.store(exp("text", 3.0)).unwrap();
    for _ in 0..9 {
        mem.store(exp("text", 0.0)).unwrap();
    }
    let mut rng = StdRng::seed_from_u64(1);
    let sample = mem.replay_with_rng(4, &mut rng);
    assert_eq!(sample[0].reward, 3.0);
}

#[test]
fn test_learn_finds_best_and_weak_strategies() {
    let mut mem = memory(100);
    let mut batch = stored(&mut mem, &[("text", 0.5), ("text", 0.3)]);
    batch.extend(stored(&mut mem, &[("vision", -0.2); 6]));

    let result = mem.learn_from_batch(Some(&batch));
    assert_eq!(result.status, LearningStatus::Learned);
    assert_eq!(result.batch_size, 8);

    let text = result.patterns.strategy("text").unwrap();
    assert_eq!(text.count, 2);
    assert!((text.avg_reward - 0.4).abs() < 1e-9);
    assert_eq!(text.success_rate, 1.0);

    assert_eq!(result.learning_updates, 2);
    assert!(matches!(
        &result.recommendations[0],
        Recommendation::Prioritize { strategy, .. } if strategy == "text"
    ));
    assert!(matches!(
        &result.recommendations[1],
        Recommendation::Deprioritize { strategy, .. } if strategy == "vision"
    ));
    assert_eq!(mem.history().len(), 1);
}

#[test]
fn test_learn_groups_conditions() {
    let mut mem = memory(100);
    let batch = vec![
        mem.store(exp("text", 1.0).with_state(json!({"condition": "bullish"}))).unwrap(),
        mem.store(exp("text", 0.0).with_state(json!({"condition": "bullish"}))).unwrap(),
        mem.store(exp("video", -1.0)).unwrap(),
    ];
    let result = mem.learn_from_batch(Some(&batch));
    let conditions = &result.patterns.conditions;
    assert_eq!(conditions.len(), 2);
    assert_eq!(conditions[0].condition, "bullish");
    assert_eq!(conditions[0].count, 2);
    assert!((conditions[0].avg_reward - 0.5).abs() < 1e-9);
    assert_eq!(conditions[1].condition, "unknown");
}

#[test]
fn test_empty_batch_records_nothing() {
    let mut mem = memory(100);
    let result = mem.learn_from_batch(None);
    assert_eq!(result.status, LearningStatus::NoExperiences);
    assert!(mem.history().is_empty());

    let result = mem.learn_from_batch(Some(&[]));
    assert_eq!(result.status, LearningStatus::NoExperiences);
    assert!(mem.history().is_empty());
}

#[test]
fn test_learning_rate_rises_when_busy() {
    let mut mem = memory(200);
    let mut batch = Vec::new();
    for kind in ["a", "b", "c"] {
        batch.extend(stored(&mut mem, &[(kind, -1.0); 6]));
    }
    batch.extend(stored(&mut mem, &[("d", 1.0)]));

    for round in 1..=4 {
        let result = mem.learn_from_batch(Some(&batch));
        assert_eq!(result.learning_updates, 4);
        assert_eq!(mem.learning_rate(), 0.01, "adapted early at round {round}");
        assert_eq!(mem.adaptation_factor(), 1.0);
    }

    mem.learn_from_batch(Some(&batch));
    assert!((mem.learning_rate() - 0.011).abs() < 1e-12);
    assert!((mem.adaptation_factor() - 1.11).abs() < 1e-9);
}

#[test]
fn test_learning_rate_stays_in_bounds() {
    let mut mem = memory(200);
    let mut batch = Vec::new();
    for kind in ["a", "b", "c", "d"] {
        batch.extend(stored(&mut mem, &[(kind, -1.0); 6]));
    }
    for _ in 0..100 {
        mem.learn_from_batch(Some(&batch));
        assert!(mem.learning_rate() <= 0.1);
        assert!(mem.learning_rate() >= 0.001);
    }
    assert!((mem.learning_rate() - 0.1).abs() < 1e-12);
}

#[test]
fn test_snapshot_round_trip_keeps_counters() {
    let mut mem = memory(100);
    stored(&mut mem, &[("text", 0.5), ("vision", -0.5), ("video", 0.1)]);
    mem.learn_from_batch(None);

    let snapshot = mem.export_knowledge();
    assert_eq!(snapshot.version, "1.0.0");
    assert_eq!(snapshot.top_experiences.len(), 3);
    assert_eq!(snapshot.learning_history.len(), 1);

    let json = serde_json::to_string(&snapshot).unwrap();
    let restored =
        ExperienceMemory::from_snapshot(MemoryConfig::default(), serde_json::from_str(&json).unwrap())
            .unwrap();
    let m = restored.metrics();
    assert_eq!(m.total_experiences, 3);
    assert_eq!(m.successful_predictions + m.failed_predictions, m.total_experiences);
    assert_eq!(restored.len(), 3);
    assert_eq!(restored.history().len(), 1);
    assert_eq!(restored.learning_rate(), mem.learning_rate());
}

#[test]
fn test_snapshot_with_inconsistent_counters_rejected() {
    let mut mem = memory(100);
    stored(&mut mem, &[("text", 0.5)]);
    let mut snapshot = mem.export_knowledge();
    snapshot.performance_metrics.successful_predictions = 5;
    assert!(matches!(
        ExperienceMemory::from_snapshot(MemoryConfig::default(), snapshot),
        Err(DomainError::InvalidInput(_))
    ));
}

#[test]
fn test_stats_reflect_state() {
    let mut mem = memory(10);
    stored(&mut mem, &[("text", 0.5), ("text", 0.2)]);
    mem.learn_from_batch(None);
    let stats = mem.stats();
    assert_eq!(stats.memory_usage, 2);
    assert_eq!(stats.memory_capacity, 10);
    assert_eq!(stats.total_learning_events, 1);
    assert_eq!(stats.recent_recommendations.len(), 1);
}
