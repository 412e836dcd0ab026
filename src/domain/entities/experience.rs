use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::entities::market_data::Metadata;

/// What was done: a strategy name plus free-form parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: String,
    #[serde(default)]
    pub params: Metadata,
}

impl Action {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Metadata::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }
}

/// An outcome waiting to be stored. Id and timestamp are assigned by the
/// memory on insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExperience {
    #[serde(default)]
    pub state: Value,
    pub action: Action,
    #[serde(default)]
    pub outcome: Value,
    pub reward: f64,
}

impl NewExperience {
    pub fn new(action: Action, reward: f64) -> Self {
        Self {
            state: Value::Null,
            action,
            outcome: Value::Null,
            reward,
        }
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }

    pub fn with_outcome(mut self, outcome: Value) -> Self {
        self.outcome = outcome;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub id: u64,
    pub state: Value,
    pub action: Action,
    pub outcome: Value,
    pub reward: f64,
    pub timestamp: DateTime<Utc>,
}

impl Experience {
    pub(crate) fn from_new(id: u64, new: NewExperience, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            state: new.state,
            action: new.action,
            outcome: new.outcome,
            reward: new.reward,
            timestamp,
        }
    }

    /// Positive reward counts as success; zero and below as failure.
    pub fn is_success(&self) -> bool {
        self.reward > 0.0
    }

    /// `state.condition` when present, used to group market conditions.
    pub fn condition(&self) -> &str {
        self.state
            .get("condition")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }
}
