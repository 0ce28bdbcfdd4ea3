//! Command Errors
//!
//! Every failure a command can surface to a client. The `Display` text of each
//! variant is exactly what goes out on the wire as an error reply, so handlers
//! never format error strings themselves.

use thiserror::Error;

/// Result type returned by the command engines.
pub type CommandResult<T> = Result<T, CommandError>;

/// Errors produced while executing a command.
///
/// All of these are detected before the keyspace is mutated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    // -------------------------------------------------------------------------
    // Invalid arguments
    // -------------------------------------------------------------------------
    /// Malformed option list (e.g. `SET k v NX XX`)
    #[error("ERR syntax error")]
    Syntax,

    /// Expire amount is not positive or does not fit in milliseconds
    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpireTime(&'static str),

    /// Negative SETRANGE offset
    #[error("ERR offset is out of range")]
    OffsetOutOfRange,

    // -------------------------------------------------------------------------
    // Type and arity
    // -------------------------------------------------------------------------
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    // -------------------------------------------------------------------------
    // Numeric
    // -------------------------------------------------------------------------
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    #[error("ERR value is not a valid float")]
    NotAFloat,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    #[error("ERR increment would produce NaN or Infinity")]
    InvalidArithmetic,

    // -------------------------------------------------------------------------
    // Size
    // -------------------------------------------------------------------------
    #[error("ERR string exceeds maximum allowed size (512MB)")]
    TooLarge,
}
