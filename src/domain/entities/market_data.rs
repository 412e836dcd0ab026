//! Market-data input record and the typed item schemas behind it.
//!
//! Items arrive as raw JSON so that one malformed entry never rejects the
//! whole record: each item is parsed on its own by [`MarketItem::parse`]
//! while the graph is built, and anything the schema does not name is kept
//! as pass-through metadata.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::DomainError;
use crate::domain::values::node_kind::NodeKind;

/// Opaque key/value payload carried on nodes and tasks.
pub type Metadata = serde_json::Map<String, Value>;

pub const DEFAULT_TARGET: &str = "market_analysis";

/// One analysis request: a target plus the items collected for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketData {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub stocks: Vec<Value>,
    #[serde(default)]
    pub news: Vec<Value>,
    #[serde(default)]
    pub charts: Vec<Value>,
    #[serde(default)]
    pub videos: Vec<Value>,
}

impl MarketData {
    pub fn target(&self) -> &str {
        self.target.as_deref().unwrap_or(DEFAULT_TARGET)
    }

    pub fn item_count(&self) -> usize {
        self.stocks.len() + self.news.len() + self.charts.len() + self.videos.len()
    }
}

/// A typed view over one market-data item.
pub trait MarketItem: DeserializeOwned + Sized {
    const KIND: NodeKind;

    /// Explicit root-edge weight, if the item carries one.
    fn weight(&self) -> Option<f64>;

    /// Schema checks beyond what deserialization enforces.
    fn validate(&self) -> Result<(), String>;

    /// Parse and validate a raw item, returning the typed view and the raw
    /// object map to keep as node metadata.
    fn parse(raw: &Value) -> Result<(Self, Metadata), DomainError> {
        let map = raw
            .as_object()
            .cloned()
            .ok_or_else(|| DomainError::MalformedInput(format!("{} item is not an object", Self::KIND)))?;
        let item: Self = serde_json::from_value(raw.clone())
            .map_err(|e| DomainError::MalformedInput(format!("{} item: {e}", Self::KIND)))?;
        item.validate().map_err(DomainError::MalformedInput)?;
        if let Some(w) = item.weight() {
            if !w.is_finite() || w < 0.0 {
                return Err(DomainError::MalformedInput(format!(
                    "{} item has invalid weight {w}",
                    Self::KIND
                )));
            }
        }
        Ok((item, map))
    }

    /// Re-read the typed view from task metadata on the worker side.
    fn from_metadata(metadata: &Metadata) -> Result<Self, DomainError> {
        serde_json::from_value(Value::Object(metadata.clone()))
            .map_err(|e| DomainError::MalformedInput(format!("{} payload: {e}", Self::KIND)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockQuote {
    pub symbol: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub prices: Vec<f64>,
    #[serde(default)]
    pub volumes: Vec<f64>,
}

impl MarketItem for StockQuote {
    const KIND: NodeKind = NodeKind::Stock;

    fn weight(&self) -> Option<f64> {
        self.weight
    }

    fn validate(&self) -> Result<(), String> {
        if self.symbol.trim().is_empty() {
            return Err("stock item has an empty symbol".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub related_stocks: Vec<String>,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl NewsArticle {
    /// Everything worth reading, title last.
    pub fn text(&self) -> String {
        let body = self
            .content
            .as_deref()
            .or(self.description.as_deref())
            .unwrap_or_default();
        format!("{} {}", body, self.title.as_deref().unwrap_or_default())
    }
}

impl MarketItem for NewsArticle {
    const KIND: NodeKind = NodeKind::News;

    fn weight(&self) -> Option<f64> {
        self.weight
    }

    fn validate(&self) -> Result<(), String> {
        if self.title.is_none() && self.content.is_none() {
            return Err("news item needs a title or content".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSeries {
    pub data: Vec<f64>,
    #[serde(default)]
    pub chart_type: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl MarketItem for ChartSeries {
    const KIND: NodeKind = NodeKind::Chart;

    fn weight(&self) -> Option<f64> {
        self.weight
    }

    fn validate(&self) -> Result<(), String> {
        if self.data.iter().any(|v| !v.is_finite()) {
            return Err("chart series contains non-finite values".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoClip {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
    /// Length in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub video_type: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl MarketItem for VideoClip {
    const KIND: NodeKind = NodeKind::Video;

    fn weight(&self) -> Option<f64> {
        self.weight
    }

    fn validate(&self) -> Result<(), String> {
        if self.title.is_none() && self.transcript.is_none() {
            return Err("video item needs a title or transcript".into());
        }
        Ok(())
    }
}
