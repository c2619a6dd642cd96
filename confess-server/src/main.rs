//! Confess Server - Anonymous confession feed server
//!
//! Serves the confession API:
//! - Capped, newest-first record store persisted to a JSON document
//! - Live SSE fan-out of every accepted confession
//! - Single process, one store, one hub, no ambient globals

use anyhow::Result;
use clap::{Parser, Subcommand};
use confess_core::{BroadcastHub, RecordStore};
use confess_http::{ApiHandler, Config};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Confess Server Configuration
#[derive(Parser, Debug)]
#[command(name = "confessd")]
#[command(author = "Confess Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Anonymous confession feed server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the server
    Start {
        /// Listen address (e.g., 0.0.0.0:3000)
        #[arg(short, long, default_value = "0.0.0.0:3000")]
        addr: String,

        /// Path of the confession store document
        #[arg(short, long, default_value = "./data/confessions.json")]
        data_file: PathBuf,

        /// Enable debug logging
        #[arg(long)]
        debug: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            addr,
            data_file,
            debug,
        } => {
            let env_filter = if debug {
                tracing_subscriber::EnvFilter::new("debug")
            } else {
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(tracing::Level::INFO.into())
            };

            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer())
                .with(env_filter)
                .init();

            info!("Starting confession server on {}", addr);
            info!("Store document: {:?}", data_file);

            let store = Arc::new(RecordStore::open(&data_file));
            let hub = Arc::new(BroadcastHub::new());
            info!("Store loaded with {} confessions", store.len().await);

            let config = Config { debug, ..Config::default() };
            let handler = Arc::new(ApiHandler::with_config(config, store, hub));

            let addr: SocketAddr = addr.parse()?;
            let listener = TcpListener::bind(addr).await?;

            info!("Server listening on http://{}", addr);

            loop {
                let (stream, _) = listener.accept().await?;
                let handler = handler.clone();
                let io = TokioIo::new(stream);

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let handler = handler.clone();
                        async move { Ok::<_, std::convert::Infallible>(handler.handle(req).await) }
                    });
                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection: {:?}", e);
                    }
                });
            }
        }
    }
}
