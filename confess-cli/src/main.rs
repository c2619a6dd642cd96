//! confess — Terminal client for the anonymous confession feed.
//!
//! On startup the client probes the server; when reachable it syncs the
//! live feed over SSE, otherwise it runs entirely against the local cache.
//! Either way every submitted confession gets a rendered confirmation.
//!
//! # Usage
//!
//! ```bash
//! # Connect to a feed server
//! confess --server http://localhost:3000
//!
//! # Local-only mode (no probe)
//! confess --offline
//! ```

mod remote;
mod session;
mod terminal;

use anyhow::Result;
use clap::Parser;
use confess_core::LocalCache;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use remote::RemoteClient;
use session::{Session, UiEvent};
use terminal::Command;

#[derive(Parser, Debug)]
#[command(name = "confess")]
#[command(author = "Confess Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Terminal client for the anonymous confession feed")]
struct Cli {
    /// Feed server base URL
    #[arg(short, long, default_value = "http://localhost:3000")]
    server: String,

    /// Path of the local confession cache
    #[arg(short, long, default_value = "./confess-cache.json")]
    cache_file: PathBuf,

    /// Skip the server probe and run local-only
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("confess=warn".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let author = confess_core::generate_author_id();
    let cache = LocalCache::load(&cli.cache_file);
    let transport = RemoteClient::new(&cli.server)?;

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let mut session = Session::new(transport, cache, author.clone(), ui_tx);

    terminal::print_welcome();
    if !cli.offline {
        session.connect().await;
    }
    drain_events(&mut ui_rx);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    prompt(&author);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                if !handle_line(&mut session, &line).await {
                    break;
                }
                drain_events(&mut ui_rx);
                prompt(&author);
            }
            push = session.next_push() => {
                session.handle_push(push);
                drain_events(&mut ui_rx);
            }
        }
    }

    println!("Goodbye.");
    Ok(())
}

/// Dispatch one input line. Returns false when the session should end.
async fn handle_line<T: remote::Transport>(session: &mut Session<T>, line: &str) -> bool {
    if line.trim().is_empty() {
        return true;
    }

    match terminal::parse_command(line) {
        Ok(Command::Help) => terminal::print_help(),
        Ok(Command::About) => terminal::print_about(),
        Ok(Command::Clear) => terminal::clear_screen(),
        Ok(Command::Status) => println!("* Session state: {}", session.state().label()),
        Ok(Command::Quit) => return false,
        Ok(Command::Feed) => session.feed().await,
        Ok(Command::Confess(message)) => {
            if session.submit(&message).await.is_err() {
                println!("Usage: confess <your confession>");
            }
        }
        Err(word) => terminal::print_unknown(&word),
    }
    true
}

fn prompt(author: &str) {
    print!("{}:~$ ", author);
    let _ = std::io::stdout().flush();
}

/// Print pending session events in arrival order.
fn drain_events(ui_rx: &mut mpsc::UnboundedReceiver<UiEvent>) {
    while let Ok(event) = ui_rx.try_recv() {
        terminal::print_event(&event);
    }
}
