pub mod http;
pub mod memory;

use std::sync::Arc;

use crate::domain::ports::insight_archive::InsightArchive;
use crate::infrastructure::config::ArchiveConfig;

pub use http::HttpArchive;
pub use memory::InMemoryArchive;

/// Pick the archive backend once, at construction.
pub fn from_config(config: &ArchiveConfig) -> Arc<dyn InsightArchive> {
    match config {
        ArchiveConfig::InMemory { capacity } => Arc::new(InMemoryArchive::new(*capacity)),
        ArchiveConfig::Http { endpoint, api_key } => {
            Arc::new(HttpArchive::new(endpoint.clone(), api_key.clone()))
        }
    }
}
