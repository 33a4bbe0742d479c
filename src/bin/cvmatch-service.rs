//! cvmatch service daemon
//!
//! Runs the indexing consumer and the internal retrieval API in one
//! process: the consumer pulls `cv.created` events in the background
//! while the HTTP surface serves the upstream gateway.
//!
//! Usage:
//!   cvmatch-service [OPTIONS]
//!
//! Options:
//!   --config <PATH>      Path to configuration file (json/toml/yaml)
//!   --host <HOST>        API server host (overrides config)
//!   --port <PORT>        API server port (overrides config)

use cvmatch::api::{start_server, AppState};
use cvmatch::config::AppConfig;
use cvmatch::documents::DocumentClient;
use cvmatch::embedding::HttpEmbedder;
use cvmatch::indexer::{run_consumer, Indexer};
use cvmatch::retriever::Retriever;
use cvmatch::vector_store::PineconeIndex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Default)]
struct CliArgs {
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
}

fn parse_args() -> CliArgs {
    let mut cli = CliArgs::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                if let Some(path) = args.next() {
                    cli.config_path = Some(PathBuf::from(path));
                }
            }
            "--host" => {
                cli.host = args.next();
            }
            "--port" => {
                if let Some(port) = args.next() {
                    if let Ok(p) = port.parse() {
                        cli.port = Some(p);
                    }
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
    }

    cli
}

fn print_help() {
    println!("cvmatch service daemon");
    println!();
    println!("Usage: cvmatch-service [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config <PATH>    Path to configuration file (json/toml/yaml)");
    println!("  --host <HOST>      API server host (overrides config)");
    println!("  --port <PORT>      API server port (overrides config)");
    println!("  -h, --help         Print this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = parse_args();

    let mut config = AppConfig::load(cli.config_path.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;

    info!(version = cvmatch::VERSION, "Starting cvmatch service");

    let embedder = Arc::new(HttpEmbedder::new(config.embedding.clone()));
    let index = Arc::new(PineconeIndex::connect(config.vector_store.clone()).await?);
    let documents = Arc::new(DocumentClient::new(&config.documents));

    let indexer = Arc::new(Indexer::new(
        documents,
        embedder.clone(),
        index.clone(),
    ));
    tokio::spawn(run_consumer(indexer, config.queue.clone()));

    let state = AppState {
        retriever: Arc::new(Retriever::new(embedder, index.clone())),
        index,
    };

    start_server(state, &config.server.host, config.server.port).await?;
    Ok(())
}
