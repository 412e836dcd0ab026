use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a knowledge-graph node. Open enumeration: anything not known
/// ends up in `Other` and is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Root,
    Stock,
    News,
    Chart,
    Video,
    Other(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Stock => "stock",
            NodeKind::News => "news",
            NodeKind::Chart => "chart",
            NodeKind::Video => "video",
            NodeKind::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "root" => NodeKind::Root,
            "stock" => NodeKind::Stock,
            "news" => NodeKind::News,
            "chart" => NodeKind::Chart,
            "video" => NodeKind::Video,
            _ => NodeKind::Other(s.to_string()),
        }
    }
}

impl From<String> for NodeKind {
    fn from(s: String) -> Self {
        NodeKind::from(s.as_str())
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Worker category a prioritized node is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerCategory {
    Text,
    Vision,
    Video,
}

impl WorkerCategory {
    pub const ALL: [WorkerCategory; 3] =
        [WorkerCategory::Text, WorkerCategory::Vision, WorkerCategory::Video];

    /// Routing table: `{stock, news} → text`, `chart → vision`, `video → video`.
    pub fn for_kind(kind: &NodeKind) -> Option<WorkerCategory> {
        match kind {
            NodeKind::Stock | NodeKind::News => Some(WorkerCategory::Text),
            NodeKind::Chart => Some(WorkerCategory::Vision),
            NodeKind::Video => Some(WorkerCategory::Video),
            NodeKind::Root | NodeKind::Other(_) => None,
        }
    }

    /// Node kinds served by this category.
    pub fn kinds(&self) -> &'static [NodeKind] {
        static TEXT: [NodeKind; 2] = [NodeKind::Stock, NodeKind::News];
        static VISION: [NodeKind; 1] = [NodeKind::Chart];
        static VIDEO: [NodeKind; 1] = [NodeKind::Video];
        match self {
            WorkerCategory::Text => &TEXT,
            WorkerCategory::Vision => &VISION,
            WorkerCategory::Video => &VIDEO,
        }
    }
}

impl fmt::Display for WorkerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerCategory::Text => write!(f, "text"),
            WorkerCategory::Vision => write!(f, "vision"),
            WorkerCategory::Video => write!(f, "video"),
        }
    }
}

impl FromStr for WorkerCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(WorkerCategory::Text),
            "vision" => Ok(WorkerCategory::Vision),
            "video" => Ok(WorkerCategory::Video),
            _ => Err(format!("Unknown worker category: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind_is_preserved() {
        let kind = NodeKind::from("podcast");
        assert_eq!(kind, NodeKind::Other("podcast".into()));
        assert_eq!(kind.to_string(), "podcast");
    }

    #[test]
    fn test_kind_serde_as_plain_string() {
        let json = serde_json::to_string(&NodeKind::Chart).unwrap();
        assert_eq!(json, "\"chart\"");
        let back: NodeKind = serde_json::from_str("\"NEWS\"").unwrap();
        assert_eq!(back, NodeKind::News);
    }

    #[test]
    fn test_routing_table() {
        assert_eq!(WorkerCategory::for_kind(&NodeKind::Stock), Some(WorkerCategory::Text));
        assert_eq!(WorkerCategory::for_kind(&NodeKind::News), Some(WorkerCategory::Text));
        assert_eq!(WorkerCategory::for_kind(&NodeKind::Chart), Some(WorkerCategory::Vision));
        assert_eq!(WorkerCategory::for_kind(&NodeKind::Video), Some(WorkerCategory::Video));
        assert_eq!(WorkerCategory::for_kind(&NodeKind::Root), None);
        assert_eq!(WorkerCategory::for_kind(&NodeKind::Other("x".into())), None);
    }

    #[test]
    fn test_kinds_round_trip_through_routing() {
        for category in WorkerCategory::ALL {
            for kind in category.kinds() {
                assert_eq!(WorkerCategory::for_kind(kind), Some(category));
            }
        }
    }
}
