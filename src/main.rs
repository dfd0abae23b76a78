//! Ledger Gateway CLI
//!
//! Loads a JSON index snapshot and answers explorer queries through the
//! cached services, printing results as JSON.

use clap::{Parser, Subcommand};
use ledger_gateway::{
    config::ConfigLoader,
    logging::init_tracing,
    models::TransactionStatus,
    services::TransactionFilter,
    InMemorySearchBackend, QueryLimits, QueryPagination, ServiceBuilder,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ledger-gateway")]
#[command(about = "Cached query gateway for ledger explorer data", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// JSON file mapping collection names to arrays of records
    #[arg(long)]
    data: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List NFT tags, most used first
    Tags {
        #[arg(long, default_value = "0")]
        from: u64,
        #[arg(long, default_value = "25")]
        size: u64,
        #[arg(long)]
        search: Option<String>,
    },
    /// Count NFT tags
    TagCount {
        #[arg(long)]
        search: Option<String>,
    },
    /// List transactions, newest first
    Transactions {
        #[arg(long, default_value = "0")]
        from: u64,
        #[arg(long, default_value = "25")]
        size: u64,
        #[arg(long)]
        sender: Option<String>,
        #[arg(long)]
        receiver: Option<String>,
        /// success, pending, invalid or fail
        #[arg(long)]
        status: Option<TransactionStatus>,
    },
    /// Print the effective configuration and cache statistics
    Stats {
        /// Print cache counters in Prometheus text format instead
        #[arg(long)]
        prometheus: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_path(path);
    }
    let config = loader.load()?;
    init_tracing(&config.logging.filter);

    let limits = QueryLimits::from(&config.search);
    let backend = match &args.data {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            let data: serde_json::Value = serde_json::from_str(&content)?;
            info!(path = %path, "loaded index snapshot");
            InMemorySearchBackend::from_json(data, limits)?
        }
        None => InMemorySearchBackend::new(limits),
    };

    let container = ServiceBuilder::new()
        .with_config(config)
        .with_backend(Arc::new(backend))
        .build()?;

    match args.command {
        Command::Tags { from, size, search } => {
            let tags = container
                .tags()
                .get_nft_tags(QueryPagination::new(from, size), search.as_deref())
                .await?;
            print_json(&tags)?;
        }
        Command::TagCount { search } => {
            let count = container.tags().get_nft_tag_count(search.as_deref()).await?;
            print_json(&count)?;
        }
        Command::Transactions {
            from,
            size,
            sender,
            receiver,
            status,
        } => {
            let filter = TransactionFilter {
                sender,
                receiver,
                status,
                ..Default::default()
            };
            let transactions = container
                .transactions()
                .get_transactions(&filter, QueryPagination::new(from, size))
                .await?;
            print_json(&transactions)?;
        }
        Command::Stats { prometheus } => {
            let stats = container.cache().stats();
            if prometheus {
                print!("{}", stats.to_prometheus_format());
            } else {
                print_json(&serde_json::json!({
                    "config": container.config(),
                    "cache": stats,
                    "hit_ratio": stats.hit_ratio(),
                }))?;
            }
        }
    }

    Ok(())
}
