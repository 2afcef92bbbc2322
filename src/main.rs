//! lazykv server binary
//!
//! Parses flags, sets up logging, binds the listener and serves until Ctrl+C.

use lazykv::config::{Action, Config, USAGE};
use lazykv::server::Server;
use lazykv::storage::ExpiringStore;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::from_args(std::env::args().skip(1)) {
        Ok(Action::Serve(config)) => config,
        Ok(Action::PrintHelp) => {
            println!("{}", USAGE);
            return Ok(());
        }
        Ok(Action::PrintVersion) => {
            println!("lazykv version {}", lazykv::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let store = Arc::new(ExpiringStore::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(
        version = lazykv::VERSION,
        "Listening on {}",
        config.bind_address()
    );
    if let Some(timeout) = config.idle_timeout {
        info!("Idle connections close after {:?}", timeout);
    }

    let server = Server::new(listener, Arc::clone(&store), config.connection_settings());
    let stats = server.stats();

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    server.run_until(shutdown).await;

    let store_stats = store.stats();
    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        failed = stats.commands_failed.load(Ordering::Relaxed),
        keys = store_stats.keys,
        expired = store_stats.expired,
        "Server shutdown complete"
    );
    Ok(())
}
