//! Incremental Command Parser
//!
//! Decodes client commands (arrays of bulk strings) from a byte buffer that
//! fills up as data arrives from the socket.
//!
//! ## How the Parser Works
//!
//! The parser reads from a buffer and returns either:
//! - `Ok(Some((command, consumed)))` - A whole command was decoded from the
//!   first `consumed` bytes
//! - `Ok(None)` - The command is incomplete, read more data and retry
//! - `Err(ParseError)` - The bytes can never form a valid command
//!
//! ## Strictness
//!
//! - The header line must start with `*`. An empty header line (`\r\n`)
//!   decodes to the empty command.
//! - Every element must be a bulk string `$<len>\r\n<payload>\r\n` whose
//!   payload is exactly `len` bytes of UTF-8.

use crate::protocol::types::{prefix, Command, CRLF};
use std::num::ParseIntError;
use thiserror::Error;

/// Errors that can occur while decoding a command.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// A line started with the wrong type prefix
    #[error("expected '{expected}', got {found:#04x}")]
    UnexpectedPrefix { expected: char, found: u8 },

    /// Invalid integer in a length header
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// A bulk string payload is not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Protocol violation (missing CRLF, length mismatch, etc.)
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The command has more elements than allowed
    #[error("too many arguments: {count} (max: {max})")]
    TooManyArguments { count: usize, max: usize },

    /// The whole command, header and elements included, is longer than allowed
    #[error("command exceeds {max} bytes")]
    FrameTooLarge { max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum encoded size of one command (512 MB, same as Redis)
pub const MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of elements in one command
pub const MAX_ARGUMENTS: usize = 1024 * 1024;

/// Decoder for client commands.
///
/// # Example
///
/// ```
/// use lazykv::protocol::CommandParser;
///
/// let parser = CommandParser::new();
/// let buf = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
///
/// let (command, consumed) = parser.parse(buf).unwrap().unwrap();
/// assert_eq!(command, vec!["GET".to_string(), "name".to_string()]);
/// assert_eq!(consumed, buf.len());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CommandParser {
    max_frame_size: usize,
    max_arguments: usize,
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandParser {
    /// Creates a parser with the default limits.
    pub fn new() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            max_arguments: MAX_ARGUMENTS,
        }
    }

    /// Overrides the largest accepted command, measured in encoded bytes.
    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }

    /// Attempts to decode one command from the front of `buf`.
    ///
    /// A command longer than the frame limit is rejected no matter how its
    /// bytes were split across reads: a complete command is measured
    /// directly, and an incomplete one is rejected once `buf` already holds
    /// the limit's worth of bytes without finishing it.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(Command, usize)>> {
        let Some(&first) = buf.first() else {
            return Ok(None);
        };

        let parsed = match first {
            prefix::ARRAY => self.parse_array(buf)?,
            b'\r' => parse_empty_line(buf)?,
            found => {
                return Err(ParseError::UnexpectedPrefix {
                    expected: prefix::ARRAY as char,
                    found,
                })
            }
        };

        match parsed {
            Some((_, consumed)) if consumed > self.max_frame_size => Err(self.too_large()),
            None if buf.len() >= self.max_frame_size => Err(self.too_large()),
            other => Ok(other),
        }
    }

    fn too_large(&self) -> ParseError {
        ParseError::FrameTooLarge {
            max: self.max_frame_size,
        }
    }

    /// Parses an array header and its elements: `*<count>\r\n<elements...>`
    fn parse_array(&self, buf: &[u8]) -> ParseResult<Option<(Command, usize)>> {
        debug_assert!(buf[0] == prefix::ARRAY);

        let Some((count, header_len)) = parse_length_line(buf)? else {
            return Ok(None);
        };

        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        let count = count as usize;
        if count > self.max_arguments {
            return Err(ParseError::TooManyArguments {
                count,
                max: self.max_arguments,
            });
        }

        let mut elements = Vec::with_capacity(count.min(16));
        let mut consumed = header_len;

        for _ in 0..count {
            if consumed >= buf.len() {
                return Ok(None);
            }

            match self.parse_bulk_string(&buf[consumed..], consumed)? {
                Some((element, element_len)) => {
                    elements.push(element);
                    consumed += element_len;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((elements, consumed)))
    }

    /// Parses a bulk string: `$<length>\r\n<data>\r\n`
    ///
    /// `offset` is where the element starts within the command, so an
    /// announced length that cannot fit the frame limit fails before its
    /// payload arrives.
    fn parse_bulk_string(
        &self,
        buf: &[u8],
        offset: usize,
    ) -> ParseResult<Option<(String, usize)>> {
        if buf[0] != prefix::BULK_STRING {
            return Err(ParseError::UnexpectedPrefix {
                expected: prefix::BULK_STRING as char,
                found: buf[0],
            });
        }

        let Some((length, data_start)) = parse_length_line(buf)? else {
            return Ok(None);
        };

        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = length as usize;
        let total_needed = (data_start + 2).saturating_add(length);
        if offset.saturating_add(total_needed) > self.max_frame_size {
            return Err(self.too_large());
        }

        if buf.len() < total_needed {
            return Ok(None);
        }

        if &buf[data_start + length..total_needed] != CRLF {
            return Err(ParseError::ProtocolError(format!(
                "bulk string payload does not match announced length {}",
                length
            )));
        }

        let data = std::str::from_utf8(&buf[data_start..data_start + length])
            .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;

        Ok(Some((data.to_string(), total_needed)))
    }
}

/// A header line with nothing on it means the peer has nothing more to say.
fn parse_empty_line(buf: &[u8]) -> ParseResult<Option<(Command, usize)>> {
    match buf.get(1) {
        None => Ok(None),
        Some(b'\n') => Ok(Some((Vec::new(), 2))),
        Some(_) => Err(ParseError::ProtocolError(
            "bare CR in header line".to_string(),
        )),
    }
}

/// Parses `<prefix><integer>\r\n`, returning the integer and the line length.
fn parse_length_line(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    let Some(end) = find_crlf(&buf[1..]) else {
        return Ok(None);
    };

    let text = std::str::from_utf8(&buf[1..1 + end])
        .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;

    let n: i64 = text
        .parse()
        .map_err(|e: ParseIntError| ParseError::InvalidInteger(format!("{:?}: {}", text, e)))?;

    Ok(Some((n, 1 + end + 2)))
}

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if found, or None if CRLF is not present.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Decodes a single command with the default limits.
pub fn parse_command(buf: &[u8]) -> ParseResult<Option<(Command, usize)>> {
    CommandParser::new().parse(buf)
}
