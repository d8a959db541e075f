//! Starward dedicated server.

mod clients;
mod match_runner;
mod net_io;
mod persist;
mod session;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use clients::ClientManager;
use session::{SessionConfig, SessionDirector};

#[derive(Parser, Debug)]
#[command(name = "starward-server", about = "Authoritative Starward game server")]
struct Args {
    /// Game difficulty, 1 (easiest) through 5.
    #[arg(long, default_value_t = 1)]
    difficulty: u8,

    /// Address to bind both listeners on.
    #[arg(long, default_value = "0.0.0.0")]
    bind_host: String,

    /// TCP control port.
    #[arg(long, default_value_t = 4242)]
    tcp_port: u16,

    /// UDP game port.
    #[arg(long, default_value_t = 4243)]
    udp_port: u16,

    /// Optional SQLite user/score database. Omit to disable persistence.
    #[arg(long)]
    database: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    anyhow::ensure!(
        (1..=5).contains(&args.difficulty),
        "difficulty must be between 1 and 5"
    );

    let store = match &args.database {
        Some(path) => match persist::Store::open(path) {
            Ok(store) => {
                tracing::info!(?path, "persistence enabled");
                Some(store)
            }
            Err(err) => {
                tracing::warn!(%err, "failed to open database, persistence disabled");
                None
            }
        },
        None => None,
    };

    let io = net_io::spawn(&args.bind_host, args.tcp_port, args.udp_port)
        .context("failed to bind listeners")?;

    let clients = Arc::new(ClientManager::new());
    let mut director = SessionDirector::new(
        clients,
        io.sender(),
        store,
        SessionConfig {
            udp_port: args.udp_port,
            default_difficulty: args.difficulty,
        },
    );

    tracing::info!(
        bind = %args.bind_host,
        tcp = args.tcp_port,
        udp = args.udp_port,
        difficulty = args.difficulty,
        "server running"
    );

    loop {
        match io.events.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => {
                director.handle_event(event);
                // Drain whatever else arrived in the same window.
                while let Ok(event) = io.events.try_recv() {
                    director.handle_event(event);
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                tracing::error!("io thread gone, shutting down");
                break;
            }
        }
        director.pump();
    }

    Ok(())
}
