//! # strandkv
//!
//! An in-memory key-value server that speaks the Redis protocol, built around
//! a complete implementation of the Redis string commands.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                              strandkv                                │
//! │                                                                      │
//! │  ┌─────────────┐   ┌─────────────┐        ┌──────────────────────┐   │
//! │  │ TCP Server  │──>│ Connection  │──argv─>│   Executor task      │   │
//! │  │ (Listener)  │   │  tasks      │<─reply─│   CommandHandler     │   │
//! │  └─────────────┘   └─────────────┘        │     │                │   │
//! │                                           │     ▼                │   │
//! │                                           │   Db (Keyspace)      │   │
//! │                                           │   + expiry sweep     │   │
//! │                                           └─────────┬────────────┘   │
//! │                                                     │ writes         │
//! │                                                     ▼                │
//! │                                           propagation feed           │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Commands execute one at a time on a single task, so every command is
//! atomic with respect to every other one without any locking.
//!
//! ## Quick Start
//!
//! ```no_run
//! use strandkv::{handle_connection, CommandHandler, ConnectionStats, Executor, ExpiryConfig};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (executor, _task) = Executor::spawn(CommandHandler::new(), ExpiryConfig::default(), 1024);
//!     let stats = Arc::new(ConnectionStats::new());
//!     let listener = TcpListener::bind("127.0.0.1:6379").await?;
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await?;
//!         tokio::spawn(handle_connection(stream, addr, executor.clone(), Arc::clone(&stats)));
//!     }
//! }
//! ```
//!
//! ## Supported Commands
//!
//! ### String Commands
//! - `SET key value [NX|XX] [EX seconds|PX milliseconds]`
//! - `SETNX key value`, `SETEX key seconds value`, `PSETEX key milliseconds value`
//! - `GET key`, `GETSET key value`
//! - `MGET key [key ...]`, `MSET key value [key value ...]`, `MSETNX key value [key value ...]`
//! - `SETRANGE key offset value`, `GETRANGE key start end` (alias `SUBSTR`)
//! - `APPEND key value`, `STRLEN key`
//! - `INCR key`, `DECR key`, `INCRBY key increment`, `DECRBY key decrement`
//! - `INCRBYFLOAT key increment`
//!
//! ### List Commands
//! - `LPUSH`, `RPUSH`, `LPOP`, `RPOP`, `LLEN`, `LRANGE`
//!
//! ### Key Commands
//! - `DEL`, `EXISTS`, `TYPE`, `EXPIRE`, `PEXPIRE`, `PERSIST`, `TTL`, `PTTL`
//!
//! ### Server Commands
//! - `PING [message]`, `ECHO message`, `DBSIZE`, `FLUSHDB`, `QUIT`
//!
//! ## Module Overview
//!
//! - [`protocol`]: request parser and reply encoder
//! - [`storage`]: the keyspace, string value representation and expiry schedule
//! - [`commands`]: command table and the string, list and key engines
//! - [`executor`]: the task that owns the keyspace
//! - [`connection`]: client connection management
//! - [`config`]: command-line configuration

pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod protocol;
pub mod storage;

pub use commands::CommandHandler;
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use error::{CommandError, CommandResult};
pub use executor::{Executor, ExecutorError, ExecutorHandle};
pub use protocol::{ParseError, Reply, RequestParser};
pub use storage::{Db, ExpiryConfig, Keyspace, StringValue, Value};

/// The default port strandkv listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host strandkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
