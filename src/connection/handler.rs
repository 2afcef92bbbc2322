//! Connection Handler Module
//!
//! This module handles individual client connections. Each client gets its
//! own task that loops reading commands and sending replies.
//!
//! ## Connection Lifecycle
//!
//! ```text
//!            ┌───────────────────────┐
//!   ┌───────>│   AWAITING_COMMAND    │──── EOF / empty command ───┐
//!   │        └───────────┬───────────┘                            │
//!   │                    │ command decoded                        │
//!   │                    ▼                                        ▼
//!   │        ┌───────────────────────┐                   ┌────────────────┐
//!   │        │      PROCESSING       │                   │     CLOSED     │
//!   │        └───────────┬───────────┘                   └────────────────┘
//!   │                    │ one reply written                      ▲
//!   └────────────────────┘                                        │
//!                          protocol violation / I/O error ────────┘
//! ```
//!
//! ## Buffer Management
//!
//! Incoming bytes accumulate in a `BytesMut`. TCP is a stream protocol, so a
//! read may hold half a command or several pipelined ones; the parser takes
//! whole commands off the front and leaves the rest for the next round.
//! The parser also enforces `max_buffer_size` on each command, so the
//! buffer never holds much more than one maximal command.

use crate::commands::CommandHandler;
use crate::protocol::{Command, CommandParser, ParseError, Reply};
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace, warn};

/// Default limit for the encoded size of one command (1 MiB)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Close the connection if a read waits longer than this
    pub idle_timeout: Option<Duration>,
    /// Largest accepted command, header and elements included. Anything
    /// longer is a protocol violation.
    pub max_buffer_size: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            idle_timeout: None,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }
}

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Commands answered with an error reply
    pub commands_failed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_failed(&self) {
        self.commands_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// Generic over the byte stream so the same loop serves TCP sockets and
/// in-memory pipes.
pub struct ConnectionHandler<S> {
    /// The client's byte stream
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Runs decoded commands against the shared store
    command_handler: CommandHandler,

    parser: CommandParser,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    settings: ConnectionSettings,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The client's byte stream
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    /// * `settings` - Timeouts and buffer limits
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        settings: ConnectionSettings,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            parser: CommandParser::new().with_max_frame_size(settings.max_buffer_size),
            stats,
            settings,
        }
    }

    /// Runs the connection until the client leaves or misbehaves.
    ///
    /// A client closing between commands, or sending an empty command, is a
    /// normal end and yields `Ok(())`.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = match self.main_loop().await {
            Err(ConnectionError::ClientDisconnected) => Ok(()),
            other => other,
        };

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::IoError(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e @ ConnectionError::UnexpectedEof) => {
                debug!(client = %self.addr, error = %e, "Client left mid-command")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let command = match self.try_parse_command() {
                Ok(Some(command)) => command,
                Ok(None) => {
                    self.read_more_data().await?;
                    continue;
                }
                Err(e) => {
                    self.reject_frame(&e).await;
                    return Err(e.into());
                }
            };

            if command.is_empty() {
                debug!(client = %self.addr, "Empty command, closing connection");
                return Ok(());
            }

            let response = self.process(&command);
            self.send_response(&response).await?;
        }
    }

    /// Attempts to parse a command from the buffer.
    fn try_parse_command(&mut self) -> Result<Option<Command>, ParseError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&self.buffer)? {
            Some((command, consumed)) => {
                self.buffer.advance(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Parsed command"
                );
                Ok(Some(command))
            }
            None => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete command, need more data"
                );
                Ok(None)
            }
        }
    }

    /// Dispatches one command and produces exactly one reply.
    fn process(&self, command: &[String]) -> Reply {
        self.stats.command_processed();
        let name = command.first().map(String::as_str).unwrap_or_default();

        match self.command_handler.dispatch(command) {
            Ok(reply) => {
                debug!(client = %self.addr, command = name, "Command executed");
                reply
            }
            Err(e) => {
                self.stats.command_failed();
                debug!(client = %self.addr, command = name, error = %e, "Command rejected");
                e.to_reply()
            }
        }
    }

    /// Tells the client why its connection is about to close. Write failures
    /// are ignored since the connection is closing anyway.
    async fn reject_frame(&mut self, error: &ParseError) {
        debug!(client = %self.addr, error = %error, "Protocol violation");
        let reply = Reply::error(format!("ERR Protocol error: {}", error));
        if let Err(e) = self.send_response(&reply).await {
            trace!(client = %self.addr, error = %e, "Could not send protocol error");
        }
    }

    /// Reads more data from the stream into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let idle_timeout = self.settings.idle_timeout;
        let read = self.stream.get_mut().read_buf(&mut self.buffer);

        let n = match idle_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| ConnectionError::IdleTimeout(limit))??,
            None => read.await?,
        };

        if n == 0 {
            return if self.buffer.is_empty() {
                Err(ConnectionError::ClientDisconnected)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Writes a reply and waits for it to drain.
    async fn send_response(&mut self, response: &Reply) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            bytes = bytes.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The client sent bytes that are not a valid command
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    /// Client disconnected between commands
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial command)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// No data arrived within the idle timeout
    #[error("Idle for longer than {0:?}")]
    IdleTimeout(Duration),
}

/// Handles a client connection.
///
/// Creates a `ConnectionHandler` and runs it to completion. Errors are
/// logged by the handler and stay local to this connection.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    settings: ConnectionSettings,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats, settings);
    if let Err(e) = handler.run().await {
        debug!(client = %addr, error = %e, "Connection ended with error");
    }
}
