//! Wire Protocol
//!
//! Requests arrive as RESP multi-bulk arrays or inline lines and are parsed
//! into an argument vector. Replies are serialized back as RESP.
//!
//! ## Modules
//!
//! - `parser`: incremental request parser producing `Vec<Bytes>`
//! - `reply`: the `Reply` enum and its wire encoding
//!
//! ## Example
//!
//! ```ignore
//! use strandkv::protocol::{parse_request, Reply};
//!
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (argv, consumed) = parse_request(data).unwrap().unwrap();
//!
//! let bytes = Reply::bulk("value").encode();
//! ```

pub mod parser;
pub mod reply;

pub use parser::{parse_request, Argv, ParseError, ParseResult, RequestParser};
pub use reply::Reply;
