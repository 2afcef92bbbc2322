//! Wire Protocol
//!
//! Commands arrive as RESP arrays of bulk strings; replies go out as simple
//! strings, nulls or errors.
//!
//! ## Modules
//!
//! - `types`: The `Reply` enum, the `Command` alias and their encoders
//! - `parser`: Incremental decoder for incoming commands
//!
//! ## Example
//!
//! ```
//! use lazykv::protocol::{encode_command, parse_command, Reply};
//!
//! let data = encode_command(&["GET", "name"]);
//! let (command, consumed) = parse_command(&data).unwrap().unwrap();
//! assert_eq!(command, vec!["GET", "name"]);
//! assert_eq!(consumed, data.len());
//!
//! assert_eq!(Reply::null().serialize(), b"$-1\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_command, CommandParser, ParseError, ParseResult};
pub use types::{encode_command, Command, Reply};
