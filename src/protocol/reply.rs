//! Replies
//!
//! Every command produces exactly one [`Reply`]. The shapes map onto the RESP
//! wire format:
//!
//! - `+` Status
//! - `-` Error
//! - `:` Integer
//! - `$` Bulk string (`$-1` for null)
//! - `*` Multi-bulk sequence
//!
//! All lines are terminated with CRLF (`\r\n`).

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const STATUS: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK: u8 = b'$';
    pub const MULTI_BULK: u8 = b'*';
}

/// A reply emitted by a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Short non-binary status line, e.g. `OK`
    Status(String),

    /// Error line; the text starts with an error code such as `ERR`
    Error(String),

    Integer(i64),

    /// Binary-safe string
    Bulk(Bytes),

    /// Absent value (`$-1`)
    Null,

    Multi(Vec<Reply>),
}

impl Reply {
    pub fn status(s: impl Into<String>) -> Self {
        Reply::Status(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        Reply::Integer(n)
    }

    /// Integer reply for a length or count.
    pub fn from_len(n: usize) -> Self {
        Reply::Integer(i64::try_from(n).unwrap_or(i64::MAX))
    }

    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Reply::Bulk(data.into())
    }

    pub fn null() -> Self {
        Reply::Null
    }

    pub fn multi(values: Vec<Reply>) -> Self {
        Reply::Multi(values)
    }

    /// `+OK`
    pub fn ok() -> Self {
        Reply::Status("OK".to_string())
    }

    /// Bulk reply for a present value, null otherwise.
    pub fn optional(value: Option<Bytes>) -> Self {
        value.map_or(Reply::Null, Reply::Bulk)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Encodes the reply into a fresh buffer.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Appends the wire form of the reply to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Reply::Status(s) => text_line(buf, prefix::STATUS, s),
            Reply::Error(s) => text_line(buf, prefix::ERROR, s),
            Reply::Integer(n) => line(buf, prefix::INTEGER, n.to_string().as_bytes()),
            Reply::Bulk(data) => {
                line(buf, prefix::BULK, data.len().to_string().as_bytes());
                buf.put_slice(data);
                buf.put_slice(CRLF);
            }
            Reply::Null => line(buf, prefix::BULK, b"-1"),
            Reply::Multi(values) => {
                line(buf, prefix::MULTI_BULK, values.len().to_string().as_bytes());
                for value in values {
                    value.encode_into(buf);
                }
            }
        }
    }
}

fn line(buf: &mut BytesMut, prefix: u8, body: &[u8]) {
    buf.reserve(body.len() + 3);
    buf.put_u8(prefix);
    buf.put_slice(body);
    buf.put_slice(CRLF);
}

/// Writes a status or error line. Embedded CR and LF become spaces so the
/// text stays a single frame.
fn text_line(buf: &mut BytesMut, prefix: u8, text: &str) {
    buf.reserve(text.len() + 3);
    buf.put_u8(prefix);
    buf.extend(
        text.bytes()
            .map(|b| if b == b'\r' || b == b'\n' { b' ' } else { b }),
    );
    buf.put_slice(CRLF);
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(s) => write!(f, "{}", s),
            Reply::Error(s) => write!(f, "(error) {}", s),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::Bulk(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
            },
            Reply::Null => write!(f, "(nil)"),
            Reply::Multi(values) if values.is_empty() => write!(f, "(empty array)"),
            Reply::Multi(values) => {
                for (i, v) in values.iter().enumerate() {
                    writeln!(f, "{}) {}", i + 1, v)?;
                }
                Ok(())
            }
        }
    }
}
