pub mod confidence;
pub mod node_kind;
pub mod recency;
