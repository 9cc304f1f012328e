//! nft-rarity CLI
//!
//! Crawls an NFT collection and ranks its tokens by rarity.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use rarity_core::RankKey;
use rarity_runtime::{rescore, Pipeline, ProjectConfig, Snapshot};

#[derive(Parser)]
#[command(name = "nft-rarity")]
#[command(author, version, about = "NFT collection crawler and rarity ranker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a collection and write a scored snapshot
    Rank {
        /// Project config (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Marketplace API key (or set OPENSEA_API_KEY env var)
        #[arg(long, env = "OPENSEA_API_KEY")]
        api_key: Option<String>,

        /// Marketplace API root, overrides the config
        #[arg(long)]
        marketplace_url: Option<String>,

        /// Output file (default: <name>_<timestamp>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of top tokens to print
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Check that the marketplace endpoints for a project respond
    Check {
        /// Project config (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Marketplace API key (or set OPENSEA_API_KEY env var)
        #[arg(long, env = "OPENSEA_API_KEY")]
        api_key: Option<String>,
    },

    /// Re-run rarity scoring on a saved snapshot with the config's rules
    Rescore {
        /// Project config (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Snapshot written by `rank`
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (default: overwrite the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of top tokens to print
        #[arg(long, default_value = "10")]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Rank {
            config,
            api_key,
            marketplace_url,
            output,
            top,
        } => {
            let config = load_config(&config, api_key.as_deref(), marketplace_url.as_deref())?;
            run_rank(config, output, top).await?;
        }
        Commands::Check { config, api_key } => {
            let config = load_config(&config, api_key.as_deref(), None)?;
            run_check(config).await?;
        }
        Commands::Rescore {
            config,
            input,
            output,
            top,
        } => {
            let config = load_config(&config, None, None)?;
            run_rescore(&config, &input, output, top)?;
        }
    }

    Ok(())
}

fn load_config(
    path: &Path,
    api_key: Option<&str>,
    marketplace_url: Option<&str>,
) -> Result<ProjectConfig> {
    let mut config = ProjectConfig::load(path)
        .with_context(|| format!("loading project config {}", path.display()))?;
    if let Some(api_key) = api_key {
        config = config.with_api_key(api_key);
    }
    if let Some(url) = marketplace_url {
        config = config.with_marketplace_url(url);
    }
    Ok(config)
}

fn default_output(name: &str) -> PathBuf {
    let slug: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let timestamp = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S");
    PathBuf::from(format!("{}_{}.json", slug, timestamp))
}

fn write_snapshot(snapshot: &Snapshot, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json).with_context(|| format!("writing snapshot {}", path.display()))?;
    Ok(())
}

fn print_summary(snapshot: &Snapshot, top: usize) {
    let collection = &snapshot.collection;
    println!("\n{}", "=".repeat(60));
    println!("📦 {} ({} tokens)", collection.name, collection.num_tokens());
    if let Some(floor) = snapshot.floor_price {
        println!("   Marketplace floor: {} ETH", floor);
    }
    if !snapshot.revealed {
        println!("   ⚠️  Collection does not look revealed yet");
    }

    for token in collection.ranked_by(RankKey::Score).into_iter().take(top) {
        let price = token
            .market
            .as_ref()
            .and_then(|m| m.price)
            .map(|p| format!("{} ETH", p))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "   #{:<5} {:<8} score {:>10.3}  {}",
            token.score_rank().unwrap_or(0),
            token.token_id,
            token.score,
            price
        );
    }
}

async fn run_rank(config: ProjectConfig, output: Option<PathBuf>, top: usize) -> Result<()> {
    let output_path = output.unwrap_or_else(|| default_output(&config.collection.name));

    println!("🚀 Crawling {}...", config.collection.name);
    let pipeline = Pipeline::from_config(config)?;
    let snapshot = pipeline.run().await?;

    write_snapshot(&snapshot, &output_path)?;
    println!("\n✅ Ranking complete!");
    println!("📄 Snapshot saved to: {}", output_path.display());
    println!("📊 Fetch stats: {}", snapshot.fetch_stats.total());
    print_summary(&snapshot, top);

    Ok(())
}

async fn run_check(config: ProjectConfig) -> Result<()> {
    println!("🔌 Checking marketplace at {}...\n", config.marketplace.base_url);

    let contract = config.collection.contract_address.clone();
    let pipeline = Pipeline::from_config(config)?;
    let report = pipeline.check().await;

    if report.contract_ok {
        println!("✅ Contract {} found", contract);
    } else {
        println!("❌ Contract {} not reachable ({})", contract, report.stats);
    }
    match report.stats_ok {
        Some(true) => match report.floor_price {
            Some(floor) => println!("✅ Collection stats ok, floor {} ETH", floor),
            None => println!("✅ Collection stats ok, no floor"),
        },
        Some(false) => println!("❌ Collection stats not reachable"),
        None => println!("   No slug configured, stats skipped"),
    }

    Ok(())
}

fn run_rescore(config: &ProjectConfig, input: &Path, output: Option<PathBuf>, top: usize) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("reading snapshot {}", input.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&text)
        .with_context(|| format!("parsing snapshot {}", input.display()))?;

    let rescored = rescore(snapshot, &config.rules, &config.floors.trait_types)?;

    let output_path = output.unwrap_or_else(|| input.to_path_buf());
    write_snapshot(&rescored, &output_path)?;
    println!("✅ Rescored snapshot saved to: {}", output_path.display());
    print_summary(&rescored, top);

    Ok(())
}
