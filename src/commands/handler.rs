//! Command Dispatch
//!
//! Resolves a decoded command to one of a fixed set of [`CommandKind`]s and
//! runs its [`CommandExec`] implementation against the store.
//!
//! ## Supported Commands
//!
//! | Command                 | Reply                                   |
//! |-------------------------|-----------------------------------------|
//! | `COMMAND`               | empty simple string                     |
//! | `PING`                  | `PONG`                                  |
//! | `ECHO message`          | the message                             |
//! | `GET key`               | the value, or null if absent or expired |
//! | `SET key value [PX ms]` | `OK`                                    |
//!
//! Names are matched case-insensitively. Anything else, and any malformed
//! argument list, yields an error reply while the connection keeps serving.

use crate::protocol::Reply;
use crate::storage::ExpiringStore;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Reasons a command could not be executed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(CommandKind),

    #[error("syntax error")]
    Syntax,

    #[error("invalid expire time in '{0}' command")]
    InvalidExpireTime(CommandKind),
}

impl CommandError {
    /// Renders the error as the reply sent to the client.
    pub fn to_reply(&self) -> Reply {
        Reply::error(format!("ERR {}", self))
    }
}

/// The closed set of commands this server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Command,
    Ping,
    Echo,
    Get,
    Set,
}

impl CommandKind {
    /// All supported commands.
    pub const ALL: [CommandKind; 5] = [
        CommandKind::Command,
        CommandKind::Ping,
        CommandKind::Echo,
        CommandKind::Get,
        CommandKind::Set,
    ];

    /// The lowercase name used on the wire and in error messages.
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Command => "command",
            CommandKind::Ping => "ping",
            CommandKind::Echo => "echo",
            CommandKind::Get => "get",
            CommandKind::Set => "set",
        }
    }

    /// Returns the implementation for this command.
    pub fn command(self) -> &'static dyn CommandExec {
        match self {
            CommandKind::Command => &CommandDocs,
            CommandKind::Ping => &Ping,
            CommandKind::Echo => &Echo,
            CommandKind::Get => &Get,
            CommandKind::Set => &Set,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandKind {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.name() == lowered)
            .ok_or_else(|| CommandError::UnknownCommand(s.to_string()))
    }
}

/// A command implementation.
///
/// `args` is the full command line, name included.
pub trait CommandExec: Send + Sync {
    fn handle(&self, args: &[String], store: &ExpiringStore) -> Result<Reply, CommandError>;
}

/// `COMMAND`: accepted so clients asking for the command table get a reply.
struct CommandDocs;

impl CommandExec for CommandDocs {
    fn handle(&self, _args: &[String], _store: &ExpiringStore) -> Result<Reply, CommandError> {
        Ok(Reply::simple_string(""))
    }
}

/// `PING`
struct Ping;

impl CommandExec for Ping {
    fn handle(&self, _args: &[String], _store: &ExpiringStore) -> Result<Reply, CommandError> {
        Ok(Reply::pong())
    }
}

/// `ECHO message`
struct Echo;

impl CommandExec for Echo {
    fn handle(&self, args: &[String], _store: &ExpiringStore) -> Result<Reply, CommandError> {
        match args {
            [_, message] => Ok(Reply::simple_string(message.as_str())),
            _ => Err(CommandError::WrongArity(CommandKind::Echo)),
        }
    }
}

/// `GET key`
struct Get;

impl CommandExec for Get {
    fn handle(&self, args: &[String], store: &ExpiringStore) -> Result<Reply, CommandError> {
        let [_, key] = args else {
            return Err(CommandError::WrongArity(CommandKind::Get));
        };

        Ok(match store.get(key) {
            Some(value) => Reply::simple_string(value),
            None => Reply::null(),
        })
    }
}

/// `SET key value [PX milliseconds]`
struct Set;

impl Set {
    fn parse_ttl(option: &str, ms: &str) -> Result<Option<Duration>, CommandError> {
        if !option.eq_ignore_ascii_case("px") {
            return Err(CommandError::Syntax);
        }

        let ms: u64 = ms
            .parse()
            .map_err(|_| CommandError::InvalidExpireTime(CommandKind::Set))?;

        Ok(Some(Duration::from_millis(ms)))
    }
}

impl CommandExec for Set {
    fn handle(&self, args: &[String], store: &ExpiringStore) -> Result<Reply, CommandError> {
        let (key, value, ttl) = match args {
            [_, key, value] => (key, value, None),
            [_, key, value, option, ms] => (key, value, Self::parse_ttl(option, ms)?),
            _ => return Err(CommandError::WrongArity(CommandKind::Set)),
        };

        store.put(key.as_str(), value.as_str(), ttl);
        Ok(Reply::ok())
    }
}

/// Executes commands against a shared store.
///
/// Cheap to clone; each connection gets its own handle.
#[derive(Clone, Debug)]
pub struct CommandHandler {
    store: Arc<ExpiringStore>,
}

impl CommandHandler {
    /// Creates a new command handler over the given store.
    pub fn new(store: Arc<ExpiringStore>) -> Self {
        Self { store }
    }

    /// Runs a non-empty command and returns its reply.
    pub fn dispatch(&self, args: &[String]) -> Result<Reply, CommandError> {
        let Some(name) = args.first() else {
            return Err(CommandError::Syntax);
        };

        let kind: CommandKind = name.parse()?;
        kind.command().handle(args, &self.store)
    }

    /// Runs a command, turning failures into error replies.
    pub fn execute(&self, args: &[String]) -> Reply {
        self.dispatch(args).unwrap_or_else(|e| e.to_reply())
    }
}
