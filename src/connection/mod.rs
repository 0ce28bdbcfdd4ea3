//! Client Connections
//!
//! Every accepted TCP connection runs in its own task. The task only moves
//! bytes: it parses requests, hands them to the command executor and writes
//! the replies back. It never touches the keyspace itself.
//!
//! ```text
//!   TcpListener (main.rs)
//!          │ accept()
//!          ▼
//!   ConnectionHandler task ──argv──> ExecutorHandle ──> executor task
//!          ▲                                                  │
//!          └──────────────────────── Reply ───────────────────┘
//! ```
//!
//! Pipelined requests are executed in order and their replies are flushed
//! together.

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
