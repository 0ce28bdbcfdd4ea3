//! Single-Stream Command Executor
//!
//! All commands run on one task that owns the [`CommandHandler`]. Connection
//! tasks never touch the keyspace; they send the parsed argument vector over
//! a bounded channel together with a oneshot slot for the reply.
//!
//! ```text
//!  connection ──┐
//!  connection ──┼──> mpsc<Request> ──> ┌──────────────────────────┐
//!  connection ──┘                      │ executor task            │
//!                                      │  select! {               │
//!        <── oneshot<Reply> ────────── │    request => execute    │
//!                                      │    timer   => sweep      │
//!                                      │  }                       │
//!                                      └──────────────────────────┘
//! ```
//!
//! Each command runs to completion before the next one is received, so no
//! command ever observes another one half-applied. The active-expiry sweep
//! runs on the same task, between commands.

use crate::commands::CommandHandler;
use crate::protocol::Reply;
use crate::storage::{ExpiryConfig, SweepSchedule};
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Default number of requests that may wait for the executor.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Errors returned to a connection submitting a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("command executor has shut down")]
    Closed,
}

/// A command waiting to be executed.
struct Request {
    argv: Vec<Bytes>,
    reply: oneshot::Sender<Reply>,
}

/// Cloneable submission side of the executor.
#[derive(Debug, Clone)]
pub struct ExecutorHandle {
    tx: mpsc::Sender<Request>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request").field("argc", &self.argv.len()).finish()
    }
}

impl ExecutorHandle {
    /// Submits a command and waits for its reply.
    pub async fn execute(&self, argv: Vec<Bytes>) -> Result<Reply, ExecutorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request { argv, reply })
            .await
            .map_err(|_| ExecutorError::Closed)?;
        rx.await.map_err(|_| ExecutorError::Closed)
    }
}

/// The task that owns the keyspace.
pub struct Executor {
    handler: CommandHandler,
    schedule: SweepSchedule,
    rx: mpsc::Receiver<Request>,
}

impl Executor {
    /// Creates an executor and the handle used to reach it.
    pub fn new(
        handler: CommandHandler,
        expiry: ExpiryConfig,
        queue_depth: usize,
    ) -> (Self, ExecutorHandle) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let executor = Self {
            handler,
            schedule: SweepSchedule::new(expiry),
            rx,
        };
        (executor, ExecutorHandle { tx })
    }

    /// Spawns the executor onto the current tokio runtime.
    ///
    /// The task ends once every [`ExecutorHandle`] is dropped and yields the
    /// handler back.
    pub fn spawn(
        handler: CommandHandler,
        expiry: ExpiryConfig,
        queue_depth: usize,
    ) -> (ExecutorHandle, JoinHandle<CommandHandler>) {
        let (executor, handle) = Self::new(handler, expiry, queue_depth);
        (handle, tokio::spawn(executor.run()))
    }

    /// Processes requests until every handle is gone.
    pub async fn run(mut self) -> CommandHandler {
        info!(
            sweep_interval_ms = self.schedule.interval().as_millis(),
            "Command executor started"
        );

        let sweep = tokio::time::sleep(self.schedule.interval());
        tokio::pin!(sweep);

        loop {
            tokio::select! {
                request = self.rx.recv() => {
                    let Some(Request { argv, reply }) = request else {
                        break;
                    };
                    let result = self.handler.execute(&argv);
                    // The client may have gone away while waiting
                    let _ = reply.send(result);
                }
                () = &mut sweep => {
                    let (scanned, removed) = self.handler.sweep(self.schedule.keys_per_sweep());
                    if removed > 0 {
                        debug!(scanned, removed, "Expired keys reclaimed");
                    }
                    self.schedule.record(scanned, removed);
                    sweep.as_mut().reset(Instant::now() + self.schedule.interval());
                }
            }
        }

        info!(
            commands = self.handler.processed(),
            dirty = self.handler.dirty(),
            "Command executor stopped"
        );
        self.handler
    }
}
