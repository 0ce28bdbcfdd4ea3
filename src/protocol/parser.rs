//! Incremental Request Parser
//!
//! Clients send commands either as a multi-bulk array of bulk strings
//! (`*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n`) or as a single inline line
//! (`GET key\r\n`). Both are turned into an argument vector.
//!
//! The parser reads from a buffer and returns either:
//! - `Ok(Some((argv, consumed)))` - a full request was parsed from `consumed` bytes
//! - `Ok(None)` - the request is incomplete, read more data and retry
//! - `Err(ParseError)` - the bytes are not a valid request
//!
//! The caller advances its buffer by `consumed` only on success, so a
//! partially received request is simply parsed again once more bytes arrive.

use crate::protocol::reply::prefix;
use crate::storage::MAX_STRING_LEN;
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while parsing a request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("invalid multibulk length")]
    InvalidMultibulkLength,

    #[error("invalid bulk length")]
    InvalidBulkLength,

    #[error("expected '$', got '{0}'")]
    ExpectedBulk(char),

    #[error("bulk string missing trailing CRLF")]
    MissingCrlf,

    #[error("unbalanced quotes in inline request")]
    UnbalancedQuotes,

    #[error("too big inline request")]
    InlineTooLong,
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Upper bound on the number of arguments in one request.
pub const MAX_MULTIBULK_LEN: usize = 1024 * 1024;

/// Upper bound on an inline request line.
pub const MAX_INLINE_LEN: usize = 64 * 1024;

/// Upper bound on a `*count` or `$len` header line still waiting for its CRLF.
pub const MAX_HEADER_LEN: usize = 64 * 1024;

/// A parsed request: the command name followed by its arguments.
pub type Argv = Vec<Bytes>;

/// Stateless request parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestParser;

impl RequestParser {
    pub fn new() -> Self {
        Self
    }

    /// Attempts to parse one request from the front of `buf`.
    ///
    /// Empty inline lines are skipped: they produce an empty `argv` that the
    /// caller should ignore.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(Argv, usize)>> {
        match buf.first() {
            None => Ok(None),
            Some(&prefix::MULTI_BULK) => parse_multibulk(buf),
            Some(_) => parse_inline(buf),
        }
    }
}

fn parse_multibulk(buf: &[u8]) -> ParseResult<Option<(Argv, usize)>> {
    let Some((count, mut pos)) = read_number(buf, 1)? else {
        return Ok(None);
    };
    if count > MAX_MULTIBULK_LEN as i64 {
        return Err(ParseError::InvalidMultibulkLength);
    }
    if count <= 0 {
        return Ok(Some((Vec::new(), pos)));
    }

    let mut argv = Vec::with_capacity(count as usize);
    for _ in 0..count {
        match buf.get(pos) {
            None => return Ok(None),
            Some(&prefix::BULK) => {}
            Some(&other) => return Err(ParseError::ExpectedBulk(other as char)),
        }

        let Some((len, data_start)) = read_number(buf, pos + 1)? else {
            return Ok(None);
        };
        if len < 0 || len as u64 > MAX_STRING_LEN {
            return Err(ParseError::InvalidBulkLength);
        }
        let data_end = data_start + len as usize;
        if buf.len() < data_end + 2 {
            return Ok(None);
        }
        if &buf[data_end..data_end + 2] != b"\r\n" {
            return Err(ParseError::MissingCrlf);
        }

        argv.push(Bytes::copy_from_slice(&buf[data_start..data_end]));
        pos = data_end + 2;
    }

    Ok(Some((argv, pos)))
}

/// Reads a CRLF-terminated decimal starting at `start`.
///
/// Returns the number and the offset just past the CRLF.
fn read_number(buf: &[u8], start: usize) -> ParseResult<Option<(i64, usize)>> {
    let invalid = match buf.get(start.wrapping_sub(1)) {
        Some(&prefix::BULK) => ParseError::InvalidBulkLength,
        _ => ParseError::InvalidMultibulkLength,
    };

    let rest = &buf[start.min(buf.len())..];
    let Some(end) = find_crlf(rest) else {
        if rest.len() > MAX_HEADER_LEN {
            return Err(invalid);
        }
        return Ok(None);
    };
    let n = std::str::from_utf8(&rest[..end])
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(invalid)?;
    Ok(Some((n, start + end + 2)))
}

fn parse_inline(buf: &[u8]) -> ParseResult<Option<(Argv, usize)>> {
    let Some(end) = buf.iter().position(|&b| b == b'\n') else {
        if buf.len() > MAX_INLINE_LEN {
            return Err(ParseError::InlineTooLong);
        }
        return Ok(None);
    };

    let mut line = &buf[..end];
    if line.last() == Some(&b'\r') {
        line = &line[..line.len() - 1];
    }

    Ok(Some((split_inline(line)?, end + 1)))
}

/// Splits an inline line on whitespace, honouring double and single quotes.
fn split_inline(line: &[u8]) -> ParseResult<Argv> {
    let mut argv = Vec::new();
    let mut i = 0;

    while i < line.len() {
        if line[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let mut arg = Vec::new();
        match line[i] {
            quote @ (b'"' | b'\'') => {
                i += 1;
                loop {
                    match line.get(i) {
                        None => return Err(ParseError::UnbalancedQuotes),
                        Some(&c) if c == quote => {
                            i += 1;
                            break;
                        }
                        Some(b'\\') if quote == b'"' && i + 1 < line.len() => {
                            arg.push(unescape(line[i + 1]));
                            i += 2;
                        }
                        Some(&c) => {
                            arg.push(c);
                            i += 1;
                        }
                    }
                }
                if line.get(i).is_some_and(|c| !c.is_ascii_whitespace()) {
                    return Err(ParseError::UnbalancedQuotes);
                }
            }
            _ => {
                while i < line.len() && !line[i].is_ascii_whitespace() {
                    arg.push(line[i]);
                    i += 1;
                }
            }
        }
        argv.push(Bytes::from(arg));
    }

    Ok(argv)
}

fn unescape(c: u8) -> u8 {
    match c {
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'0' => 0,
        other => other,
    }
}

/// Finds the position of `\r` in the first CRLF of `buf`.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Convenience wrapper for parsing a single request.
pub fn parse_request(buf: &[u8]) -> ParseResult<Option<(Argv, usize)>> {
    RequestParser::new().parse(buf)
}
