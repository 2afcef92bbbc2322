//! # lazykv - An In-Memory Key-Value Server with Lazy TTL Expiry
//!
//! lazykv keeps string keys and values in memory and serves them over TCP
//! using a subset of the Redis protocol (RESP). Any key can carry a
//! time-to-live in milliseconds.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             lazykv                               │
//! │                                                                  │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐           │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │           │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │           │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘           │
//! │                            │                  │                  │
//! │                            ▼                  ▼                  │
//! │                     ┌─────────────┐    ┌─────────────────────┐   │
//! │                     │  Command    │    │   ExpiringStore     │   │
//! │                     │  Parser     │    │ RwLock<HashMap> +   │   │
//! │                     └─────────────┘    │ Clock (lazy expiry) │   │
//! │                                        └─────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use lazykv::connection::ConnectionSettings;
//! use lazykv::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = Server::bind("127.0.0.1:6379", ConnectionSettings::default()).await?;
//!     server.run_until(std::future::pending()).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`
//! - `ECHO message`
//! - `GET key`
//! - `SET key value [PX milliseconds]`
//! - `COMMAND`
//!
//! ## Module Overview
//!
//! - [`protocol`]: Command decoding and reply encoding
//! - [`storage`]: The expiring store and its clocks
//! - [`commands`]: Command lookup and execution
//! - [`connection`]: Per-client read/execute/reply loop
//! - [`server`]: Accept loop
//! - [`config`]: Command-line flags
//!
//! ## Lazy Expiry
//!
//! Nothing runs in the background. A key past its expiry is reported as
//! missing the next time it is read, and dropped from memory at that point.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionSettings, ConnectionStats};
pub use protocol::{CommandParser, ParseError, Reply};
pub use server::Server;
pub use storage::{Clock, ExpiringStore, ManualClock, SystemClock};

/// The default port lazykv listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host lazykv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of lazykv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
