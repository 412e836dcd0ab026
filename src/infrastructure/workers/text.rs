use async_trait::async_trait;
use tracing::debug;

use super::Expertise;
use crate::domain::entities::experience::Experience;
use crate::domain::entities::market_data::{MarketItem, NewsArticle, StockQuote};
use crate::domain::entities::task::{Insight, InsightDetail, InsightKind, Task, WorkerResult};
use crate::domain::error::DomainError;
use crate::domain::ports::worker::Worker;
use crate::domain::values::node_kind::{NodeKind, WorkerCategory};

const POSITIVE_WORDS: &[&str] = &[
    "gain", "gains", "profit", "profits", "growth", "up", "rise", "rises", "rising", "bullish",
    "positive", "rally", "surge", "beat",
];
const NEGATIVE_WORDS: &[&str] = &[
    "loss", "losses", "decline", "declines", "down", "fall", "falls", "falling", "bearish",
    "negative", "drop", "drops", "miss",
];

/// Confidence when a stock has fewer than two prices to compare.
const THIN_DATA_CONFIDENCE: f64 = 0.3;

/// Stocks and news: price trend and keyword sentiment.
#[derive(Debug, Default)]
pub struct TextWorker {
    expertise: Expertise,
}

impl TextWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expertise(&self) -> &Expertise {
        &self.expertise
    }

    /// Grows with experience: `min(0.9, 0.5 + tasks·0.01)`.
    fn base_confidence(tasks: u64) -> f64 {
        (0.5 + tasks as f64 * 0.01).min(0.9)
    }

    fn analyze_stock(&self, task: &Task, quote: &StockQuote, tasks: u64) -> WorkerResult {
        let Some(price) = price_analysis(&quote.prices) else {
            let confidence = self.expertise.calibrate(THIN_DATA_CONFIDENCE);
            return WorkerResult {
                node_id: task.node_id.clone(),
                worker: self.name().to_string(),
                insights: vec![Insight {
                    kind: InsightKind::PriceAnalysis,
                    node_id: task.node_id.clone(),
                    confidence,
                    summary: format!("{}: not enough price history for a trend", quote.symbol),
                    detail: InsightDetail::Price {
                        trend: "unknown".into(),
                        volatility: 0.0,
                        data_points: quote.prices.len(),
                        volume_trend: None,
                        average_volume: None,
                    },
                }],
                confidence,
                trend: None,
            };
        };

        let (volume_trend, average_volume) = match volume_analysis(&quote.volumes) {
            Some((trend, avg)) => (Some(trend.to_string()), Some(avg)),
            None => (None, None),
        };
        let confidence = self.expertise.calibrate(Self::base_confidence(tasks));

        WorkerResult {
            node_id: task.node_id.clone(),
            worker: self.name().to_string(),
            insights: vec![Insight {
                kind: InsightKind::PriceAnalysis,
                node_id: task.node_id.clone(),
                confidence,
                summary: format!(
                    "{} price trend {} (volatility {:.2})",
                    quote.symbol, price.trend, price.volatility
                ),
                detail: InsightDetail::Price {
                    trend: price.trend.to_string(),
                    volatility: price.volatility,
                    data_points: quote.prices.len(),
                    volume_trend,
                    average_volume,
                },
            }],
            confidence,
            trend: Some(price.direction.to_string()),
        }
    }

    fn analyze_news(&self, task: &Task, article: &NewsArticle) -> WorkerResult {
        let sentiment = sentiment(&article.text());
        let confidence = self
            .expertise
            .calibrate(0.5 + (sentiment.score - 0.5).abs());
        let headline = article
            .title
            .clone()
            .unwrap_or_else(|| task.node_id.clone());

        WorkerResult {
            node_id: task.node_id.clone(),
            worker: self.name().to_string(),
            insights: vec![Insight {
                kind: InsightKind::TextAnalysis,
                node_id: task.node_id.clone(),
                confidence,
                summary: format!("{headline}: {} sentiment", sentiment.label),
                detail: InsightDetail::Sentiment {
                    sentiment: sentiment.label.to_string(),
                    score: sentiment.score,
                    positive_signals: sentiment.positive,
                    negative_signals: sentiment.negative,
                },
            }],
            confidence,
            trend: sentiment.direction.map(String::from),
        }
    }
}

#[async_trait]
impl Worker for TextWorker {
    fn name(&self) -> &'static str {
        "text"
    }

    fn category(&self) -> WorkerCategory {
        WorkerCategory::Text
    }

    async fn process(&self, task: &Task) -> Result<WorkerResult, DomainError> {
        let tasks = self.expertise.record_task();
        debug!(node_id = %task.node_id, kind = %task.kind, "Text worker processing task");
        match task.kind {
            NodeKind::Stock => {
                let quote = StockQuote::from_metadata(&task.metadata)?;
                Ok(self.analyze_stock(task, &quote, tasks))
            }
            NodeKind::News => {
                let article = NewsArticle::from_metadata(&task.metadata)?;
                Ok(self.analyze_news(task, &article))
            }
            ref other => Err(DomainError::InvalidInput(format!(
                "text worker cannot handle '{other}' nodes"
            ))),
        }
    }

    fn learn(&self, experience: &Experience) {
        self.expertise.reinforce(self.category(), experience);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceAnalysis {
    /// `upward`, `downward` or `sideways`.
    pub trend: &'static str,
    /// Normalized for the consensus vote.
    pub direction: &'static str,
    /// Mean absolute change between consecutive prices.
    pub volatility: f64,
}

pub fn price_analysis(prices: &[f64]) -> Option<PriceAnalysis> {
    let (first, last) = match prices {
        [first, .., last] => (*first, *last),
        _ => return None,
    };
    let (trend, direction) = if last > first {
        ("upward", "bullish")
    } else if last < first {
        ("downward", "bearish")
    } else {
        ("sideways", "sideways")
    };
    let volatility = prices.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f64>()
        / (prices.len() - 1) as f64;
    Some(PriceAnalysis {
        trend,
        direction,
        volatility,
    })
}

/// `increasing` when the latest volume beats the average, else `decreasing`.
pub fn volume_analysis(volumes: &[f64]) -> Option<(&'static str, f64)> {
    let last = *volumes.last()?;
    let average = volumes.iter().sum::<f64>() / volumes.len() as f64;
    let trend = if last > average { "increasing" } else { "decreasing" };
    Some((trend, average))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sentiment {
    pub label: &'static str,
    /// 0.5 is neutral; above leans positive, below negative.
    pub score: f64,
    pub positive: usize,
    pub negative: usize,
    pub direction: Option<&'static str>,
}

pub fn sentiment(text: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let positive = words.iter().filter(|w| POSITIVE_WORDS.contains(*w)).count();
    let negative = words.iter().filter(|w| NEGATIVE_WORDS.contains(*w)).count();
    let total = (positive + negative) as f64;

    if positive > negative {
        Sentiment {
            label: "positive",
            score: 0.5 + positive as f64 / (2.0 * total),
            positive,
            negative,
            direction: Some("bullish"),
        }
    } else if negative > positive {
        Sentiment {
            label: "negative",
            score: 0.5 - negative as f64 / (2.0 * total),
            positive,
            negative,
            direction: Some("bearish"),
        }
    } else {
        Sentiment {
            label: "neutral",
            score: 0.5,
            positive,
            negative,
            direction: None,
        }
    }
}
