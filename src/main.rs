use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use trendgraph::application::experience_memory::KnowledgeSnapshot;
use trendgraph::cli::commands::{Cli, Commands};
use trendgraph::domain::entities::experience::NewExperience;
use trendgraph::domain::entities::market_data::MarketData;
use trendgraph::infrastructure::config::Config;
use trendgraph::TrendGraph;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides()?;
    if let Commands::Analyze { threshold: Some(t), .. } | Commands::Graph { threshold: Some(t), .. } =
        &cli.command
    {
        config.analysis.priority_threshold = *t;
        config.validate()?;
    }
    config.logging.init();

    let tg = match cli.knowledge.as_deref().filter(|p| p.exists()) {
        Some(path) => TrendGraph::restore(&config, read_snapshot(path)?)?,
        None => TrendGraph::new(&config)?,
    };

    let save = cli.command.mutates_knowledge();
    let tg = run_command(tg, cli.command).await?;

    if let (true, Some(path)) = (save, &cli.knowledge) {
        let snapshot = tg.export_knowledge()?;
        std::fs::write(path, serde_json::to_string_pretty(&snapshot)?)
            .with_context(|| format!("writing knowledge to {}", path.display()))?;
    }
    Ok(())
}

async fn run_command(mut tg: TrendGraph, cmd: Commands) -> Result<TrendGraph> {
    match cmd {
        Commands::Analyze { input, learn, .. } => {
            let data = read_market_data(&input)?;
            let report = tg.analyze(&data).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if learn {
                let result = tg.learn(None)?;
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }
        Commands::Graph { input, threshold } => {
            let data = read_market_data(&input)?;
            let threshold =
                threshold.unwrap_or(tg.coordinator().config().priority_threshold);
            let (graph, ranked) = tg.rank(&data, threshold)?;
            print!("{}", graph.describe());
            println!("\nPriority Nodes:");
            for (node_id, score) in ranked {
                println!("  {score:.3}  {node_id}");
            }
        }
        Commands::Record { json } => {
            let experience: NewExperience =
                serde_json::from_str(&json).context("parsing experience JSON")?;
            let stored = tg.record_experience(experience)?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        Commands::Learn { batch_size } => {
            let result = tg.learn(batch_size)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Stats => {
            let stats = tg.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Recall { query, limit } => {
            let matches = tg.recall(&query, limit).await?;
            println!("{}", serde_json::to_string_pretty(&matches)?);
        }
    }
    Ok(tg)
}

fn read_market_data(path: &Path) -> Result<MarketData> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    serde_json::from_str(&content).context("parsing market data JSON")
}

fn read_snapshot(path: &Path) -> Result<KnowledgeSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading knowledge from {}", path.display()))?;
    serde_json::from_str(&content).context("parsing knowledge snapshot")
}
