//! Application configuration loading and validation.
//!
//! [`Config`] aggregates the analysis, memory, archive and logging settings.
//! Every default lives in a `Default` impl. Sources, lowest precedence first:
//!
//! - built-in defaults
//! - a TOML file ([`Config::load`] / [`Config::from_toml_str`])
//! - `TRENDGRAPH_*` environment variables, with `.env` loaded through
//!   `dotenvy` ([`Config::from_env`] / [`Config::apply_env_overrides`])
//!
//! # Example
//!
//! ```no_run
//! use trendgraph::infrastructure::config::Config;
//!
//! let config = Config::load("trendgraph.toml").expect("valid config");
//! config.logging.init();
//! ```

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::application::coordinator::AnalysisConfig;
use crate::application::experience_memory::MemoryConfig;
use crate::domain::error::DomainError;
use crate::infrastructure::logging::LoggingConfig;

/// Where archived insights live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArchiveConfig {
    /// Process-local, bounded FIFO.
    InMemory { capacity: usize },
    /// Remote archive service.
    Http {
        endpoint: String,
        #[serde(default)]
        api_key: Option<String>,
    },
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        ArchiveConfig::InMemory { capacity: 1_000 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub memory: MemoryConfig,
    pub archive: ArchiveConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse and validate a TOML document. Missing sections take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, DomainError> {
        let config: Self =
            toml::from_str(content).map_err(|e| DomainError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DomainError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Defaults overridden by the environment (and `.env`, when present).
    pub fn from_env() -> Result<Self, DomainError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Layer `TRENDGRAPH_*` variables over the current values and re-validate.
    pub fn apply_env_overrides(&mut self) -> Result<(), DomainError> {
        let _ = dotenvy::dotenv();
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with an
    /// explicit variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let analysis = &mut self.analysis;
        set(&lookup, "TRENDGRAPH_PRIORITY_THRESHOLD", &mut analysis.priority_threshold)?;
        set(&lookup, "TRENDGRAPH_MAX_GRAPH_DEPTH", &mut analysis.max_graph_depth)?;
        set(&lookup, "TRENDGRAPH_NODE_COUNT_MULTIPLIER", &mut analysis.node_count_multiplier)?;
        set(&lookup, "TRENDGRAPH_MENTION_WEIGHT", &mut analysis.mention_weight)?;
        set(&lookup, "TRENDGRAPH_WORKER_TIMEOUT_MS", &mut analysis.worker_timeout_ms)?;
        set(&lookup, "TRENDGRAPH_CONSENSUS", &mut analysis.consensus)?;

        let memory = &mut self.memory;
        set(&lookup, "TRENDGRAPH_MEMORY_CAPACITY", &mut memory.capacity)?;
        set(&lookup, "TRENDGRAPH_REPLAY_BATCH_SIZE", &mut memory.replay_batch_size)?;
        set(&lookup, "TRENDGRAPH_LEARNING_RATE", &mut memory.learning_rate)?;

        if let Some(endpoint) = lookup("TRENDGRAPH_ARCHIVE_URL").filter(|s| !s.trim().is_empty()) {
            self.archive = ArchiveConfig::Http {
                endpoint,
                api_key: lookup("TRENDGRAPH_ARCHIVE_API_KEY"),
            };
        } else if let ArchiveConfig::InMemory { capacity } = &mut self.archive {
            set(&lookup, "TRENDGRAPH_ARCHIVE_CAPACITY", capacity)?;
        }

        if let Some(level) = lookup("TRENDGRAPH_LOG_LEVEL") {
            self.logging.level = level;
        }
        set(&lookup, "TRENDGRAPH_LOG_FORMAT", &mut self.logging.format)?;

        self.validate()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.analysis.validate()?;
        self.memory.validate()?;
        match &self.archive {
            ArchiveConfig::InMemory { capacity } if *capacity == 0 => {
                return Err(DomainError::Config("archive capacity must be at least 1".into()));
            }
            ArchiveConfig::Http { endpoint, .. }
                if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) =>
            {
                return Err(DomainError::Config(format!(
                    "archive endpoint must be an http(s) URL, got '{endpoint}'"
                )));
            }
            _ => {}
        }
        if self.logging.level.trim().is_empty() {
            return Err(DomainError::Config("logging level must not be empty".into()));
        }
        Ok(())
    }
}

fn set<T, F>(lookup: &F, key: &str, slot: &mut T) -> Result<(), DomainError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| DomainError::Config(format!("{key}='{raw}': {e}")))?;
    }
    Ok(())
}
