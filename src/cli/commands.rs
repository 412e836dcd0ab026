use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "trendgraph", about = "Graph-prioritized market data analysis")]
pub struct Cli {
    /// TOML config file; TRENDGRAPH_* variables override it
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Knowledge snapshot to resume from and save back to
    #[arg(long, global = true)]
    pub knowledge: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one analysis cycle over a market-data JSON file
    Analyze {
        /// Path to {target, stocks, news, charts, videos} JSON ("-" for stdin)
        input: PathBuf,
        #[arg(long)]
        threshold: Option<f64>,
        /// Learn from memory after the cycle
        #[arg(long)]
        learn: bool,
    },
    /// Print the knowledge graph and its priority ranking
    Graph {
        input: PathBuf,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Record an outcome
    Record {
        /// JSON with action {kind, params?}, reward, state?, outcome?
        json: String,
    },
    /// Learn from replayed experiences
    Learn {
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Show experience memory statistics
    Stats,
    /// Find archived insights similar to a query
    Recall {
        query: String,
        #[arg(long, default_value = "5")]
        limit: usize,
    },
}

impl Commands {
    /// Commands that change learned state, so the snapshot is saved after.
    pub fn mutates_knowledge(&self) -> bool {
        matches!(
            self,
            Commands::Analyze { .. } | Commands::Record { .. } | Commands::Learn { .. }
        )
    }
}
