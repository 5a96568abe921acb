use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use mosaicdb_core::{Level, MosaicConfig, MosaicError, Shard, ShardCentroid, ShardId, ShardStatus, ZeroVectorEmbedder};
use mosaicdb_coordinator::bootstrap;
use mosaicdb_coordinator::engine::{run_analytics, run_hot_search, HotSearchParams};
use mosaicdb_routing::ShardRegistration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mosaicdb-cli")]
#[command(about = "Admin CLI for the MosaicDB coordinator", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding the coordinator's routing index and shard files.
    #[arg(long, env = "MOSAICDB_STORAGE_ROOT", default_value = "./data")]
    storage_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Registers a shard with the routing index.
    RegisterShard {
        #[arg(long)]
        id: String,
        #[arg(long)]
        path: String,
        #[arg(long, default_value = "0")]
        doc_count: u64,
        #[arg(long, default_value = "paragraph")]
        level: String,
        /// Comma-separated centroid vector, e.g. "0.1,0.2,0.3".
        #[arg(long)]
        centroid: String,
    },

    /// Runs a vector search against the hot path.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "10")]
        limit: usize,
        #[arg(long, default_value = "0.0")]
        min_similarity: f32,
    },

    /// Runs SQL through the federated analytics bridge.
    Analytics {
        #[arg(long)]
        sql: String,
    },

    /// Prints the coordinator's current metric values.
    Metrics,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        tracing::error!(error = %err, "command failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), MosaicError> {
    std::fs::create_dir_all(&cli.storage_root)
        .map_err(|e| MosaicError::internal(format!("failed to create storage root: {e}")))?;

    let config = MosaicConfig::load().map_err(|e| MosaicError::internal(format!("config error: {e}")))?;
    let embedder = Arc::new(ZeroVectorEmbedder::new(config.routing.dimension));
    let state = bootstrap::bootstrap(config, &cli.storage_root, embedder)?;

    match cli.command {
        Commands::RegisterShard { id, path, doc_count, level, centroid } => {
            let level = parse_level(&level)?;
            let centroid: Vec<f32> = centroid
                .split(',')
                .map(|s| s.trim().parse::<f32>())
                .collect::<Result<_, _>>()
                .map_err(|e| MosaicError::invalid_input(format!("invalid centroid component: {e}")))?;
            let centroid_norm = mosaicdb_core::vector::norm(&centroid);

            let shard_id = ShardId::from(id);
            let reg = ShardRegistration {
                shard: Shard {
                    id: shard_id.clone(),
                    path,
                    doc_count,
                    query_count: 0,
                    last_accessed: None,
                    status: ShardStatus::Active,
                    bloom_filter: None,
                },
                centroids: vec![ShardCentroid { shard_id, level, centroid, centroid_norm }],
            };
            state.register_shard(reg).await?;
            println!("registered shard");
        }

        Commands::Search { query, limit, min_similarity } => {
            let params = HotSearchParams {
                query_text: query,
                sql_filter: None,
                level: Level::default(),
                limit,
                min_similarity,
                shard_limit: state.config.api.shard_limit_max,
                query_terms: None,
            };
            let results = run_hot_search(&state, params).await?;
            print_json(&results)?;
        }

        Commands::Analytics { sql } => {
            let results = run_analytics(&state, sql).await?;
            print_json(&results)?;
        }

        Commands::Metrics => {
            let shard_count = state.routing_index.shard_count()?;
            println!(
                "cache_hits={} cache_misses={} shard_count={} attached_shard_count={}",
                mosaicdb_core::metrics::CACHE_HITS.get(),
                mosaicdb_core::metrics::CACHE_MISSES.get(),
                shard_count,
                mosaicdb_core::metrics::ATTACHED_SHARD_COUNT.get(),
            );
        }
    }

    Ok(())
}

fn parse_level(s: &str) -> Result<Level, MosaicError> {
    match s {
        "document" => Ok(Level::Document),
        "paragraph" => Ok(Level::Paragraph),
        "sentence" => Ok(Level::Sentence),
        other => Err(MosaicError::invalid_input(format!("unknown level '{other}'"))),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), MosaicError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| MosaicError::internal(format!("failed to serialize result: {e}")))?;
    println!("{text}");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).with_target(false).init();
}

