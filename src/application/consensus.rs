//! Consensus building over per-category worker results.
//!
//! Confidence is a plain average (`Σ result.confidence / total_insights`).
//! The overall trend is a vote over the `trend` field of every result:
//! by default one result, one vote; [`ConsensusMode::ConfidenceWeighted`]
//! weighs each vote by the result's confidence instead. Ties go to the
//! trend seen first, iterating categories in `text, vision, video` order.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::task::{Insight, WorkerResult};
use crate::domain::values::node_kind::WorkerCategory;

pub const NEUTRAL_TREND: &str = "neutral";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusMode {
    #[default]
    Majority,
    ConfidenceWeighted,
}

impl fmt::Display for ConsensusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusMode::Majority => write!(f, "majority"),
            ConsensusMode::ConfidenceWeighted => write!(f, "confidence_weighted"),
        }
    }
}

impl FromStr for ConsensusMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "majority" => Ok(ConsensusMode::Majority),
            "confidence_weighted" | "weighted" => Ok(ConsensusMode::ConfidenceWeighted),
            _ => Err(format!("Unknown consensus mode: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendVote {
    pub trend: String,
    pub votes: usize,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub timestamp: DateTime<Utc>,
    pub insights: Vec<Insight>,
    pub total_insights: usize,
    pub confidence_score: f64,
    pub overall_trend: String,
    pub trend_votes: Vec<TrendVote>,
    pub results_by_category: BTreeMap<WorkerCategory, usize>,
}

pub fn build_consensus(
    results: &BTreeMap<WorkerCategory, Vec<WorkerResult>>,
    mode: ConsensusMode,
) -> ConsensusResult {
    let mut insights = Vec::new();
    let mut total_confidence = 0.0;
    let mut votes: Vec<TrendVote> = Vec::new();
    let mut results_by_category = BTreeMap::new();

    for (category, category_results) in results {
        results_by_category.insert(*category, category_results.len());
        for result in category_results {
            insights.extend(result.insights.iter().cloned());
            total_confidence += result.confidence.value();

            if let Some(trend) = &result.trend {
                match votes.iter_mut().find(|v| &v.trend == trend) {
                    Some(vote) => {
                        vote.votes += 1;
                        vote.weight += result.confidence.value();
                    }
                    None => votes.push(TrendVote {
                        trend: trend.clone(),
                        votes: 1,
                        weight: result.confidence.value(),
                    }),
                }
            }
        }
    }

    let total_insights = insights.len();
    let confidence_score = if total_insights > 0 {
        total_confidence / total_insights as f64
    } else {
        0.0
    };

    ConsensusResult {
        timestamp: Utc::now(),
        insights,
        total_insights,
        confidence_score,
        overall_trend: winning_trend(&votes, mode),
        trend_votes: votes,
        results_by_category,
    }
}

fn winning_trend(votes: &[TrendVote], mode: ConsensusMode) -> String {
    let mut best: Option<&TrendVote> = None;
    for vote in votes {
        let better = match best {
            None => true,
            Some(b) => match mode {
                ConsensusMode::Majority => vote.votes > b.votes,
                ConsensusMode::ConfidenceWeighted => vote.weight > b.weight,
            },
        };
        if better {
            best = Some(vote);
        }
    }
    best.map(|v| v.trend.clone())
        .unwrap_or_else(|| NEUTRAL_TREND.to_string())
}
