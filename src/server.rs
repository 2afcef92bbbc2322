//! TCP Server
//!
//! Accepts clients on a listener and spawns one connection task per client.
//! All tasks share one [`ExpiringStore`].

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionSettings, ConnectionStats};
use crate::storage::ExpiringStore;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// A bound listener plus the state its connections share.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    store: Arc<ExpiringStore>,
    stats: Arc<ConnectionStats>,
    settings: ConnectionSettings,
}

impl Server {
    /// Creates a server over an already bound listener.
    pub fn new(listener: TcpListener, store: Arc<ExpiringStore>, settings: ConnectionSettings) -> Self {
        Self {
            listener,
            store,
            stats: Arc::new(ConnectionStats::new()),
            settings,
        }
    }

    /// Binds `addr` and creates a server with an empty store.
    pub async fn bind(addr: &str, settings: ConnectionSettings) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::new(listener, Arc::new(ExpiringStore::new()), settings))
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared connection statistics.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// The store every connection reads and writes.
    pub fn store(&self) -> Arc<ExpiringStore> {
        Arc::clone(&self.store)
    }

    /// Serves clients until `shutdown` completes.
    ///
    /// Connection tasks already running are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = self.accept_loop() => {}
            _ = shutdown => {
                info!("Shutdown signal received, no longer accepting connections");
            }
        }
    }

    /// Main loop that accepts incoming connections
    async fn accept_loop(&self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let handler = CommandHandler::new(Arc::clone(&self.store));
                    let stats = Arc::clone(&self.stats);
                    let settings = self.settings;

                    tokio::spawn(async move {
                        handle_connection(stream, addr, handler, stats, settings).await;
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
