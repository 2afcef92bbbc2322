//! Wire Types
//!
//! Requests and replies use a small subset of RESP (the Redis Serialization
//! Protocol). Every line ends with CRLF (`\r\n`).
//!
//! ## Requests
//!
//! A command is an array of bulk strings:
//!
//! ```text
//! *3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n
//! ```
//!
//! ## Replies
//!
//! - Simple String: `+OK\r\n`
//! - Null: `$-1\r\n`
//! - Error: `-ERR unknown command 'foo'\r\n`

use std::fmt;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A decoded request: the command name followed by its arguments.
///
/// An empty command is the signal to stop reading from a connection.
pub type Command = Vec<String>;

/// A reply sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Single-line text.
    /// Format: `+<string>\r\n`
    SimpleString(String),

    /// No value.
    /// Format: `$-1\r\n`
    Null,

    /// An error the client caused; the connection stays open.
    /// Format: `-<error message>\r\n`
    Error(String),
}

impl Reply {
    /// Creates a new simple string reply.
    ///
    /// # Example
    /// ```
    /// use lazykv::protocol::Reply;
    /// let ok = Reply::simple_string("OK");
    /// assert_eq!(ok.serialize(), b"+OK\r\n");
    /// ```
    pub fn simple_string(s: impl Into<String>) -> Self {
        Reply::SimpleString(s.into())
    }

    /// Creates a new error reply.
    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    /// Creates a null reply.
    pub fn null() -> Self {
        Reply::Null
    }

    /// Common reply for successful writes
    pub fn ok() -> Self {
        Reply::SimpleString("OK".to_string())
    }

    /// Common reply for PING
    pub fn pong() -> Self {
        Reply::SimpleString("PONG".to_string())
    }

    /// Serializes the reply to its wire format.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    ///
    /// Line-based replies cannot carry CR or LF, so those bytes are written as
    /// spaces.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Reply::SimpleString(s) => {
                buf.push(prefix::SIMPLE_STRING);
                push_line_safe(buf, s);
                buf.extend_from_slice(CRLF);
            }
            Reply::Null => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
            Reply::Error(s) => {
                buf.push(prefix::ERROR);
                push_line_safe(buf, s);
                buf.extend_from_slice(CRLF);
            }
        }
    }

    /// Returns true if this reply is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

fn push_line_safe(buf: &mut Vec<u8>, s: &str) {
    buf.extend(
        s.bytes()
            .map(|b| if b == b'\r' || b == b'\n' { b' ' } else { b }),
    );
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::SimpleString(s) => write!(f, "\"{}\"", s),
            Reply::Null => write!(f, "(nil)"),
            Reply::Error(s) => write!(f, "(error) {}", s),
        }
    }
}

/// Encodes a command as an array of bulk strings, the way clients send it.
///
/// # Example
/// ```
/// use lazykv::protocol::encode_command;
/// assert_eq!(encode_command(&["GET", "a"]), b"*2\r\n$3\r\nGET\r\n$1\r\na\r\n");
/// ```
pub fn encode_command<S: AsRef<str>>(args: &[S]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(prefix::ARRAY);
    buf.extend_from_slice(args.len().to_string().as_bytes());
    buf.extend_from_slice(CRLF);
    for arg in args {
        let arg = arg.as_ref();
        buf.push(prefix::BULK_STRING);
        buf.extend_from_slice(arg.len().to_string().as_bytes());
        buf.extend_from_slice(CRLF);
        buf.extend_from_slice(arg.as_bytes());
        buf.extend_from_slice(CRLF);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_string_serialize() {
        let value = Reply::simple_string("OK");
        assert_eq!(value.serialize(), b"+OK\r\n");
    }

    #[test]
    fn test_empty_simple_string_serialize() {
        assert_eq!(Reply::simple_string("").serialize(), b"+\r\n");
    }

    #[test]
    fn test_null_serialize() {
        assert_eq!(Reply::null().serialize(), b"$-1\r\n");
    }

    #[test]
    fn test_error_serialize() {
        let value = Reply::error("ERR unknown command 'foo'");
        assert_eq!(value.serialize(), b"-ERR unknown command 'foo'\r\n");
    }

    #[test]
    fn test_ok_and_pong() {
        assert_eq!(Reply::ok().serialize(), b"+OK\r\n");
        assert_eq!(Reply::pong().serialize(), b"+PONG\r\n");
    }

    #[test]
    fn test_line_breaks_are_blanked() {
        let value = Reply::simple_string("a\r\nb\nc");
        assert_eq!(value.serialize(), b"+a  b c\r\n");
    }

    #[test]
    fn test_encode_command() {
        assert_eq!(
            encode_command(&["SET", "a", "1"]),
            b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n"
        );
        assert_eq!(encode_command::<&str>(&[]), b"*0\r\n");
    }

    #[test]
    fn test_encode_counts_bytes_not_chars() {
        assert_eq!(encode_command(&["é"]), "*1\r\n$2\r\né\r\n".as_bytes());
    }

    #[test]
    fn test_display() {
        assert_eq!(Reply::ok().to_string(), "\"OK\"");
        assert_eq!(Reply::null().to_string(), "(nil)");
        assert_eq!(Reply::error("ERR x").to_string(), "(error) ERR x");
    }
}
