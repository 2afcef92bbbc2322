//! Command-Line Configuration
//!
//! Flags are parsed by hand; there is no config file and no environment
//! variable other than `RUST_LOG`, which the logging setup honours.

use crate::connection::{ConnectionSettings, DEFAULT_MAX_BUFFER_SIZE};
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use std::time::Duration;
use thiserror::Error;

/// Errors produced while reading command-line flags.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid value for {flag}: {value}")]
    InvalidValue { flag: String, value: String },

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Drop clients silent for this long (None = never)
    pub idle_timeout: Option<Duration>,
    /// Largest accepted command per client, in encoded bytes
    pub max_frame: usize,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            idle_timeout: None,
            max_frame: DEFAULT_MAX_BUFFER_SIZE,
            log_level: "info".to_string(),
        }
    }
}

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Serve(Config),
    PrintHelp,
    PrintVersion,
}

impl Config {
    /// Parses flags, not including the program name.
    pub fn from_args<I>(args: I) -> Result<Action, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => config.host = required(&arg, args.next())?,
                "--port" | "-p" => config.port = parse_value(&arg, args.next())?,
                "--idle-timeout" => {
                    let secs: u64 = parse_value(&arg, args.next())?;
                    config.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
                }
                "--max-frame" => {
                    config.max_frame = parse_value(&arg, args.next())?;
                    if config.max_frame == 0 {
                        return Err(ConfigError::InvalidValue {
                            flag: arg,
                            value: "0".to_string(),
                        });
                    }
                }
                "--log-level" => config.log_level = required(&arg, args.next())?,
                "--help" => return Ok(Action::PrintHelp),
                "--version" | "-v" => return Ok(Action::PrintVersion),
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        Ok(Action::Serve(config))
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-connection limits derived from this configuration.
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            idle_timeout: self.idle_timeout,
            max_buffer_size: self.max_frame,
        }
    }
}

fn required(flag: &str, value: Option<String>) -> Result<String, ConfigError> {
    value.ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<T, ConfigError> {
    let value = required(flag, value)?;
    value.parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value,
    })
}

/// Usage text printed by `--help` and after argument errors.
pub const USAGE: &str = r#"
lazykv - In-Memory Key-Value Server with Lazy TTL Expiry

USAGE:
    lazykv [OPTIONS]

OPTIONS:
    -h, --host <HOST>           Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>           Port to listen on (default: 6379)
        --idle-timeout <SECS>   Close clients idle this long (default: never)
        --max-frame <BYTES>     Largest accepted command in bytes (default: 1048576)
        --log-level <LEVEL>     Log filter when RUST_LOG is unset (default: info)
    -v, --version               Print version information
        --help                  Print this help message

COMMANDS:
    PING, ECHO message, GET key, SET key value [PX milliseconds], COMMAND
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Action, ConfigError> {
        Config::from_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_defaults() {
        let action = parse(&[]).unwrap();
        assert_eq!(action, Action::Serve(Config::default()));

        let Action::Serve(config) = action else {
            unreachable!()
        };
        assert_eq!(config.bind_address(), "127.0.0.1:6379");
        assert_eq!(config.connection_settings(), ConnectionSettings::default());
    }

    #[test]
    fn test_all_flags() {
        let action = parse(&[
            "--host",
            "0.0.0.0",
            "-p",
            "6380",
            "--idle-timeout",
            "30",
            "--max-frame",
            "4096",
            "--log-level",
            "debug",
        ])
        .unwrap();

        let Action::Serve(config) = action else {
            panic!("expected Serve, got {:?}", action)
        };
        assert_eq!(config.bind_address(), "0.0.0.0:6380");
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.max_frame, 4096);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_zero_idle_timeout_disables_it() {
        let Ok(Action::Serve(config)) = parse(&["--idle-timeout", "0"]) else {
            panic!("expected Serve")
        };
        assert_eq!(config.idle_timeout, None);
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse(&["--help"]), Ok(Action::PrintHelp));
        assert_eq!(parse(&["-v"]), Ok(Action::PrintVersion));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse(&["--port"]),
            Err(ConfigError::MissingValue("--port".to_string()))
        );
        assert_eq!(
            parse(&["--port", "nope"]),
            Err(ConfigError::InvalidValue {
                flag: "--port".to_string(),
                value: "nope".to_string()
            })
        );
        assert!(matches!(
            parse(&["--max-frame", "0"]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(
            parse(&["--verbose"]),
            Err(ConfigError::UnknownArgument("--verbose".to_string()))
        );
    }
}
