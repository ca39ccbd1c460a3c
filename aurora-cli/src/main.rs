//! AuroraMag CLI
//!
//! Torrent metadata enrichment and related-content ranking.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use aurora_core::{
    expand_keywords, extract_keywords, CacheSummary, CandidateItem, Category, Fingerprint,
    Keyword,
};
use aurora_runtime::{AuroraConfig, EnrichmentService};

/// Hashes resolved at once by `resolve`
const RESOLVE_CONCURRENCY: usize = 4;

#[derive(Parser)]
#[command(name = "aurora")]
#[command(author, version, about = "AuroraMag: torrent metadata enrichment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML)
    #[arg(long, global = true, env = "AURORA_CONFIG")]
    config: Option<PathBuf>,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve infohashes into enrichment records
    Resolve {
        /// Hex infohashes
        #[arg(required = true)]
        hashes: Vec<String>,

        /// Pretty-print JSON
        #[arg(long)]
        pretty: bool,

        /// Write records to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print cache statistics afterwards
        #[arg(long)]
        stats: bool,
    },

    /// Show extracted and expanded keywords for a title
    Keywords {
        #[arg(short, long)]
        title: String,

        /// movie, tv, pc-games, console-games, pc-software or other
        #[arg(short, long, default_value = "movie")]
        category: Category,
    },

    /// Rank related items for a title against the upstream index
    Related {
        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "movie")]
        category: Category,

        /// Infohash of the subject, excluded from the results
        #[arg(long)]
        hash: Option<String>,

        /// Order by recommendation score instead of relatedness
        #[arg(long)]
        recommended: bool,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let config = AuroraConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Resolve {
            hashes,
            pretty,
            output,
            stats,
        } => {
            run_resolve(&config, hashes, pretty, output, stats).await?;
        }
        Commands::Keywords { title, category } => {
            show_keywords(&config, &title, category);
        }
        Commands::Related {
            title,
            category,
            hash,
            recommended,
        } => {
            run_related(&config, &title, category, hash.as_deref(), recommended).await?;
        }
        Commands::Config => {
            print!("{}", config.to_redacted_toml()?);
        }
    }

    Ok(())
}

async fn run_resolve(
    config: &AuroraConfig,
    hashes: Vec<String>,
    pretty: bool,
    output: Option<PathBuf>,
    show_stats: bool,
) -> Result<()> {
    let (hashes, rejected) = split_valid_hashes(hashes);
    for hash in &rejected {
        eprintln!("{}: not a 40-character hex infohash", hash);
    }

    let service = EnrichmentService::from_config(config)?;

    let results: Vec<_> = stream::iter(hashes)
        .map(|hash| {
            let service = &service;
            async move {
                let result = service.resolve(&hash).await;
                (hash, result)
            }
        })
        .buffered(RESOLVE_CONCURRENCY)
        .collect()
        .await;

    let mut records = Vec::new();
    for (hash, result) in results {
        match result {
            Ok(record) => records.push(record),
            Err(e) if e.is_not_found() => eprintln!("{}: not found", hash),
            Err(e) => eprintln!("{}: {}", hash, e),
        }
    }

    let json = if pretty {
        serde_json::to_string_pretty(&records)?
    } else {
        serde_json::to_string(&records)?
    };

    match output {
        Some(path) => {
            fs::write(&path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} record(s) to {}", records.len(), path.display());
        }
        None => println!("{}", json),
    }

    if show_stats {
        print_stats(&service.cache_stats());
    }

    Ok(())
}

/// Split into well-formed infohashes and everything else
fn split_valid_hashes(hashes: Vec<String>) -> (Vec<String>, Vec<String>) {
    hashes
        .into_iter()
        .partition(|hash| Fingerprint::new(hash).is_valid_infohash())
}

fn show_keywords(config: &AuroraConfig, title: &str, category: Category) {
    let keywords = extract_keywords(title, category);
    let expanded = expand_keywords(&keywords, category, title, &config.franchise_table());

    println!("Title:    {}", title);
    println!("Category: {}\n", category);

    println!("Extracted ({}):", keywords.len());
    print_keywords(&keywords);

    println!("\nExpanded ({}):", expanded.len());
    print_keywords(&expanded);
}

fn print_keywords(keywords: &[Keyword]) {
    if keywords.is_empty() {
        println!("  (none)");
    }
    for (i, k) in keywords.iter().enumerate() {
        println!("  {:>2}. {:<32} {:?}", i + 1, k.text, k.origin);
    }
}

async fn run_related(
    config: &AuroraConfig,
    title: &str,
    category: Category,
    hash: Option<&str>,
    recommended: bool,
) -> Result<()> {
    let service = EnrichmentService::from_config(config)?;
    let mut related = service.related(title, category, hash).await;

    if related.is_empty() {
        println!("No related items found.");
        return Ok(());
    }

    if recommended {
        related.sort_by(|a, b| b.recommendation_score.total_cmp(&a.recommendation_score));
    }

    println!("{:>5} {:>6} {:>6} {:<8} NAME", "MATCH", "SCORE", "SEEDS", "QUALITY");
    for item in &related {
        println!("{}", related_row(item));
    }

    Ok(())
}

fn related_row(item: &CandidateItem) -> String {
    format!(
        "{:>5} {:>6.1} {:>6} {:<8} {}",
        item.match_score,
        item.recommendation_score,
        item.seeders,
        item.quality.label(),
        item.name
    )
}

fn print_stats(summary: &CacheSummary) {
    println!("\nCache statistics:");
    for (name, stats) in [
        ("descriptors", &summary.descriptors),
        ("searches", &summary.searches),
        ("records", &summary.records),
        ("ratings", &summary.ratings),
        ("overall", &summary.overall),
    ] {
        println!(
            "  {:<12} size {:>5}  hits {:>5}  misses {:>5}  hit rate {:.1}%",
            name,
            stats.size,
            stats.hits,
            stats.misses,
            stats.hit_rate * 100.0
        );
    }
}
