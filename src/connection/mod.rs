//! Connection Handler Module
//!
//! This module manages individual client connections. Each accepted client
//! is served by its own async task, which reads one command at a time,
//! executes it and writes exactly one reply before reading the next.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                     (server.rs)                             │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ accept() + spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Read bytes  │───>│ Parse cmd   │───>│ Execute cmd │      │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘      │
//! │         ▲                                     ▼             │
//! │         │                             ┌─────────────┐       │
//! │         └─────────────────────────────│ Send reply  │       │
//! │                                       └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use lazykv::connection::{handle_connection, ConnectionSettings, ConnectionStats};
//! use lazykv::commands::CommandHandler;
//! use lazykv::storage::ExpiringStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(ExpiringStore::new());
//! let stats = Arc::new(ConnectionStats::new());
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! let handler = CommandHandler::new(Arc::clone(&store));
//! tokio::spawn(handle_connection(stream, addr, handler, stats, ConnectionSettings::default()));
//! ```

pub mod handler;

pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionSettings, ConnectionStats,
    DEFAULT_MAX_BUFFER_SIZE,
};
