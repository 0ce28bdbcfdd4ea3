//! Connection Handler
//!
//! Each client gets its own task that runs in a loop, reading requests,
//! forwarding them to the executor and writing back the replies.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ┌──────────────────────────────────┐
//!    │  Main Loop                       │
//!    │                                  │
//!    │  read bytes into buffer          │
//!    │        │                         │
//!    │        ▼                         │
//!    │  parse every complete request ◄┐ │
//!    │        │                       │ │
//!    │        ▼                       │ │
//!    │  executor.execute(argv) ───────┘ │
//!    │        │                         │
//!    │        ▼                         │
//!    │  flush all replies at once       │
//!    └──────────────────────────────────┘
//!        │
//!        ▼
//! 3. Client disconnects, sends QUIT, or breaks the protocol
//! ```
//!
//! ## Buffer Management
//!
//! TCP is a stream protocol: one read may carry half a request or several
//! pipelined ones. Incoming bytes accumulate in a `BytesMut` and a request is
//! only consumed once it is complete.

use crate::executor::{ExecutorError, ExecutorHandle};
use crate::protocol::{ParseError, Reply, RequestParser};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Initial read buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// What the main loop should do after draining the buffer.
enum Next {
    Read,
    Close,
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Unparsed incoming bytes
    buffer: BytesMut,

    /// Encoded replies waiting to be flushed
    out: BytesMut,

    executor: ExecutorHandle,

    parser: RequestParser,

    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The TCP stream for this connection
    /// * `addr` - The client's socket address
    /// * `executor` - Where commands are sent for execution
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        executor: ExecutorHandle,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            out: BytesMut::new(),
            executor,
            parser: RequestParser::new(),
            stats,
        }
    }

    /// Runs the connection until the client leaves or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        debug!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => debug!(client = %self.addr, "Client closed the connection"),
            Err(ConnectionError::ClientDisconnected) => {
                debug!(client = %self.addr, "Client disconnected")
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let next = self.process_buffer().await;
            self.flush().await?;

            match next? {
                Next::Close => return Ok(()),
                Next::Read => self.read_more_data().await?,
            }
        }
    }

    /// Executes every complete request in the buffer, queueing the replies.
    async fn process_buffer(&mut self) -> Result<Next, ConnectionError> {
        loop {
            let (argv, consumed) = match self.parser.parse(&self.buffer) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => return Ok(Next::Read),
                Err(e) => {
                    warn!(client = %self.addr, error = %e, "Protocol error");
                    Reply::error(format!("ERR Protocol error: {}", e)).encode_into(&mut self.out);
                    return Err(ConnectionError::Parse(e));
                }
            };
            let _ = self.buffer.split_to(consumed);

            if argv.is_empty() {
                continue;
            }
            trace!(
                client = %self.addr,
                argc = argv.len(),
                remaining = self.buffer.len(),
                "Parsed request"
            );

            if argv[0].eq_ignore_ascii_case(b"QUIT") {
                Reply::ok().encode_into(&mut self.out);
                return Ok(Next::Close);
            }

            let reply = self.executor.execute(argv).await?;
            self.stats.command_processed();
            reply.encode_into(&mut self.out);
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
        if n == 0 {
            return if self.buffer.is_empty() {
                Err(ConnectionError::ClientDisconnected)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");
        Ok(())
    }

    /// Writes out every queued reply.
    async fn flush(&mut self) -> Result<(), ConnectionError> {
        if self.out.is_empty() {
            return Ok(());
        }
        let pending = self.out.split();
        self.stream.write_all(&pending).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(pending.len());
        trace!(client = %self.addr, bytes = pending.len(), "Sent replies");
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed request
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Executor unavailable: {0}")]
    Executor(#[from] ExecutorError),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial request)
    #[error("Unexpected end of stream")]
    UnexpectedEof,
}

/// Creates a [`ConnectionHandler`] and runs it to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    executor: ExecutorHandle,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, executor, stats);
    if let Err(e) = handler.run().await {
        if let ConnectionError::Executor(_) = e {
            info!(client = %addr, "Dropping client, server is shutting down");
        }
    }
}
