use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Invalid weight {weight} on edge {source_id} -> {target_id}")]
    InvalidWeight {
        source_id: String,
        target_id: String,
        weight: f64,
    },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Worker category '{category}' unavailable: {reason}")]
    WorkerUnavailable { category: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Parse(e.to_string())
    }
}

impl From<&str> for DomainError {
    fn from(s: &str) -> Self {
        DomainError::InvalidInput(s.to_string())
    }
}
