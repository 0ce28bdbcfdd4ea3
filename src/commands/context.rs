//! Command Execution Context
//!
//! Every handler receives a [`CommandContext`] instead of reaching for global
//! state: the keyspace it operates on and the process-wide dirty counter.
//! A handler returns an [`Outcome`], which pairs the client reply with the
//! form under which the command should be propagated to persistence and
//! replicas.

use crate::error::CommandError;
use crate::protocol::Reply;
use crate::storage::Keyspace;
use bytes::Bytes;

/// Count of mutations applied since process start.
///
/// Consumed by whatever persists or replicates the command stream; nothing in
/// the command layer interprets its value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DirtyCounter(u64);

impl DirtyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn incr(&mut self, n: u64) {
        self.0 += n;
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// State a command handler may touch.
pub struct CommandContext<'a> {
    pub keyspace: &'a mut dyn Keyspace,
    pub dirty: &'a mut DirtyCounter,
}

impl<'a> CommandContext<'a> {
    pub fn new(keyspace: &'a mut dyn Keyspace, dirty: &'a mut DirtyCounter) -> Self {
        Self { keyspace, dirty }
    }
}

/// How an executed command is forwarded to persistence and replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Propagation {
    /// Forward the command exactly as received.
    Verbatim,
    /// Forward this argument vector in place of the received one.
    Rewrite(Vec<Bytes>),
}

/// Result of a successfully executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub reply: Reply,
    pub propagation: Propagation,
}

impl Outcome {
    pub fn rewritten(reply: Reply, argv: Vec<Bytes>) -> Self {
        Self {
            reply,
            propagation: Propagation::Rewrite(argv),
        }
    }

    /// Argument vector to propagate, given the one that was received.
    pub fn propagated_argv(&self, received: &[Bytes]) -> Vec<Bytes> {
        match &self.propagation {
            Propagation::Verbatim => received.to_vec(),
            Propagation::Rewrite(argv) => argv.clone(),
        }
    }
}

impl From<Reply> for Outcome {
    fn from(reply: Reply) -> Self {
        Self {
            reply,
            propagation: Propagation::Verbatim,
        }
    }
}

/// Return type of every command handler.
pub type HandlerResult = Result<Outcome, CommandError>;
