//! # Stream Ingest CLI
//!
//! Runs the ingestion pipeline once, replays an export onto a stream, or prints
//! the effective configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use stream_ingest::config::{BackendKind, ConfigLoader, IngestConfig};
use stream_ingest::handler::{Backends, IngestionHandler, InvocationEvent};
use stream_ingest::logging::init_tracing;
use stream_ingest::publish::Publisher;
use stream_ingest::stream::{LocalStreamClient, StreamWriter};

#[derive(Parser)]
#[command(name = "stream-ingest")]
#[command(about = "Checkpointed stream to Parquet ingestion worker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (default: config/stream-ingest.toml, optional)
    #[arg(short, long, env = "STREAM_INGEST_CONFIG")]
    config: Option<PathBuf>,

    /// Environment used to pick `{config}.{environment}.toml`
    #[arg(short, long)]
    environment: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline once and print the run result as JSON
    Run {
        /// Secret holding the stream and bucket names; overrides the configured one
        #[arg(long)]
        secret_name: Option<String>,
    },

    /// Put the documents of a JSON export onto a stream
    Publish {
        /// Export file: an array of `{"_id": ..., "payload": ...}` documents
        #[arg(short, long)]
        file: PathBuf,

        /// Target stream
        #[arg(short, long)]
        stream: String,
    },

    /// Create an empty stream under the local backend root
    CreateStream {
        stream: String,

        #[arg(short, long, default_value_t = 1)]
        partitions: usize,
    },

    /// Print the effective configuration as JSON
    Config,
}

fn load_config(cli: &Cli) -> Result<IngestConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    if let Some(environment) = &cli.environment {
        loader = loader.with_environment(environment);
    }
    loader.load().context("failed to load configuration")
}

async fn stream_writer(config: &IngestConfig) -> Result<Arc<dyn StreamWriter>> {
    match config.backend.kind {
        BackendKind::Local => Ok(Arc::new(LocalStreamClient::new(
            config.backend.local_root.join("streams"),
        ))),
        #[cfg(feature = "aws")]
        BackendKind::Aws => {
            let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(aws_config::Region::new(config.backend.region.clone()))
                .load()
                .await;
            Ok(Arc::new(
                stream_ingest::stream::KinesisStreamClient::from_conf(&sdk_config),
            ))
        }
        #[cfg(not(feature = "aws"))]
        BackendKind::Aws => anyhow::bail!("backend.kind = \"aws\" requires the `aws` feature"),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("❌ {e:#}");
            process::exit(2);
        }
    }
}

/// Returns whether the command succeeded
async fn run(cli: Cli) -> Result<bool> {
    let config = load_config(&cli)?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Run { secret_name } => {
            let backends = Backends::from_config(&config).await?;
            let handler = IngestionHandler::new(config, backends);
            let result = handler.invoke(InvocationEvent { secret_name }).await;

            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(result.is_success())
        }
        Commands::Publish { file, stream } => {
            let publisher = Publisher::new(stream_writer(&config).await?);
            let summary = publisher.publish_export(&file, &stream).await?;

            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(summary.failed == 0)
        }
        Commands::CreateStream { stream, partitions } => {
            if config.backend.kind != BackendKind::Local {
                anyhow::bail!("create-stream only applies to the local backend");
            }
            let client = LocalStreamClient::new(config.backend.local_root.join("streams"));
            let ids = client.create_stream(&stream, partitions).await?;

            println!("✅ Created stream {stream} with partitions: {}", ids.join(", "));
            Ok(true)
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(true)
        }
    }
}
