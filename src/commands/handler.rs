//! Command Handler
//!
//! [`CommandHandler`] owns the keyspace and the dirty counter and executes one
//! command at a time:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │  lookup()   │───>│   arity     │───>│  handler()  │      │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘      │
//! │                                               │             │
//! │                      dirty increased?  ◄──────┘             │
//! │                             │                               │
//! │                             ▼                               │
//! │                  propagation feed (broadcast)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation
//!
//! A write command that actually changed something (the dirty counter went
//! up) is published on a broadcast feed for persistence and replication
//! consumers. Usually that is the received argument vector; a command may
//! substitute a deterministic equivalent instead (INCRBYFLOAT becomes SET).

use crate::commands::context::{CommandContext, DirtyCounter, Propagation};
use crate::commands::lookup;
use crate::error::CommandError;
use crate::protocol::Reply;
use crate::storage::{Db, DbStats};
use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default capacity of the propagation feed.
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

/// Executes commands against an owned [`Db`].
pub struct CommandHandler {
    db: Db,
    dirty: DirtyCounter,
    feed: broadcast::Sender<Vec<Bytes>>,
    /// Commands executed, including failed ones
    processed: u64,
}

impl CommandHandler {
    /// Creates a handler with an empty keyspace.
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// Creates a handler whose propagation feed buffers up to `capacity`
    /// commands per lagging subscriber.
    pub fn with_feed_capacity(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity.max(1));
        Self {
            db: Db::new(),
            dirty: DirtyCounter::new(),
            feed,
            processed: 0,
        }
    }

    /// Executes a command and returns its reply.
    ///
    /// # Arguments
    ///
    /// * `argv` - The command name followed by its arguments
    ///
    /// # Returns
    ///
    /// The reply to send back to the client. Errors become error replies.
    pub fn execute(&mut self, argv: &[Bytes]) -> Reply {
        self.processed += 1;
        match self.dispatch(argv) {
            Ok(reply) => reply,
            Err(e) => Reply::error(e.to_string()),
        }
    }

    fn dispatch(&mut self, argv: &[Bytes]) -> Result<Reply, CommandError> {
        let Some(name) = argv.first() else {
            return Err(CommandError::UnknownCommand(String::new()));
        };
        let spec = lookup(name)
            .ok_or_else(|| CommandError::UnknownCommand(String::from_utf8_lossy(name).into()))?;
        if !spec.accepts(argv.len()) {
            return Err(CommandError::WrongArity(spec.name.to_string()));
        }

        let dirty_before = self.dirty.get();
        let outcome = {
            let mut ctx = CommandContext::new(&mut self.db, &mut self.dirty);
            (spec.handler)(&mut ctx, argv)?
        };
        trace!(command = spec.name, "Executed command");

        if spec.write && self.dirty.get() > dirty_before {
            if let Propagation::Rewrite(ref rewritten) = outcome.propagation {
                debug!(
                    command = spec.name,
                    rewritten_as = %String::from_utf8_lossy(&rewritten[0]),
                    "Propagating rewritten command"
                );
            }
            // No subscribers is not an error
            let _ = self.feed.send(outcome.propagated_argv(argv));
        }

        Ok(outcome.reply)
    }

    /// Subscribes to the propagation feed.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<Bytes>> {
        self.feed.subscribe()
    }

    /// Total mutations applied so far.
    pub fn dirty(&self) -> u64 {
        self.dirty.get()
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn stats(&self) -> DbStats {
        self.db.stats()
    }

    /// Runs one active-expiry pass over at most `budget` keys.
    ///
    /// # Returns
    ///
    /// `(scanned, removed)`
    pub fn sweep(&mut self, budget: usize) -> (usize, usize) {
        self.db.cleanup_expired(budget)
    }
}

impl Default for CommandHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Keyspace;
    use std::time::Duration;

    fn make_command(args: &[&str]) -> Vec<Bytes> {
        args.iter().map(|s| Bytes::from(s.to_string())).collect()
    }

    fn run(handler: &mut CommandHandler, args: &[&str]) -> Reply {
        handler.execute(&make_command(args))
    }

    #[test]
    fn test_ping() {
        let mut handler = CommandHandler::new();
        assert_eq!(run(&mut handler, &["PING"]), Reply::status("PONG"));
        assert_eq!(run(&mut handler, &["ping", "hello"]), Reply::bulk("hello"));
    }

    #[test]
    fn test_set_get() {
        let mut handler = CommandHandler::new();
        assert_eq!(run(&mut handler, &["SET", "name", "Ariz"]), Reply::ok());
        assert_eq!(run(&mut handler, &["GET", "name"]), Reply::bulk("Ariz"));
        assert_eq!(run(&mut handler, &["GET", "nonexistent"]), Reply::Null);
    }

    #[test]
    fn test_unknown_command() {
        let mut handler = CommandHandler::new();
        assert_eq!(
            run(&mut handler, &["FOOBAR", "x"]),
            Reply::error("ERR unknown command 'FOOBAR'")
        );
    }

    #[test]
    fn test_unknown_command_name_cannot_split_reply() {
        let mut handler = CommandHandler::new();
        let reply = run(&mut handler, &["FOO\r\n+OK"]);
        assert_eq!(&reply.encode()[..], b"-ERR unknown command 'FOO  +OK'\r\n");
    }

    #[test]
    fn test_wrong_arity() {
        let mut handler = CommandHandler::new();
        assert_eq!(
            run(&mut handler, &["GET"]),
            Reply::error("ERR wrong number of arguments for 'get' command")
        );
        assert_eq!(
            run(&mut handler, &["SETNX", "k", "v", "extra"]),
            Reply::error("ERR wrong number of arguments for 'setnx' command")
        );
        assert_eq!(handler.dirty(), 0);
    }

    #[test]
    fn test_errors_become_replies() {
        let mut handler = CommandHandler::new();
        run(&mut handler, &["RPUSH", "l", "x"]);
        assert_eq!(
            run(&mut handler, &["GET", "l"]),
            Reply::error("WRONGTYPE Operation against a key holding the wrong kind of value")
        );
        assert_eq!(
            run(&mut handler, &["SET", "k", "v", "NX", "XX"]),
            Reply::error("ERR syntax error")
        );
    }

    #[test]
    fn test_dirty_counts_mutations() {
        let mut handler = CommandHandler::new();
        run(&mut handler, &["SET", "a", "1"]);
        run(&mut handler, &["MSET", "b", "2", "c", "3"]);
        run(&mut handler, &["GET", "a"]);
        run(&mut handler, &["SETNX", "a", "9"]);
        assert_eq!(handler.dirty(), 3);
        assert_eq!(handler.processed(), 4);
    }

    #[test]
    fn test_propagates_writes_verbatim() {
        let mut handler = CommandHandler::new();
        let mut feed = handler.subscribe();

        run(&mut handler, &["SET", "k", "v"]);
        run(&mut handler, &["GET", "k"]);
        run(&mut handler, &["SET", "k", "w", "NX"]);
        run(&mut handler, &["APPEND", "k", "!"]);

        assert_eq!(feed.try_recv().unwrap(), make_command(&["SET", "k", "v"]));
        assert_eq!(feed.try_recv().unwrap(), make_command(&["APPEND", "k", "!"]));
        assert!(feed.try_recv().is_err());
    }

    #[test]
    fn test_incrbyfloat_propagates_as_set() {
        let mut handler = CommandHandler::new();
        let mut feed = handler.subscribe();

        run(&mut handler, &["INCRBYFLOAT", "f", "0.1"]);
        assert_eq!(run(&mut handler, &["INCRBYFLOAT", "f", "0.1"]), Reply::bulk("0.2"));

        assert_eq!(feed.try_recv().unwrap(), make_command(&["SET", "f", "0.1"]));
        assert_eq!(feed.try_recv().unwrap(), make_command(&["SET", "f", "0.2"]));
    }

    #[test]
    fn test_failed_write_is_not_propagated() {
        let mut handler = CommandHandler::new();
        let mut feed = handler.subscribe();

        run(&mut handler, &["SET", "n", "9223372036854775807"]);
        feed.try_recv().unwrap();

        assert!(run(&mut handler, &["INCR", "n"]).is_error());
        assert_eq!(run(&mut handler, &["MSETNX", "n", "1"]), Reply::integer(0));
        assert!(feed.try_recv().is_err());
    }

    #[test]
    fn test_set_with_options() {
        let mut handler = CommandHandler::new();
        assert_eq!(run(&mut handler, &["SET", "k", "v", "EX", "100"]), Reply::ok());
        match run(&mut handler, &["TTL", "k"]) {
            Reply::Integer(ttl) => assert!(ttl > 0 && ttl <= 100),
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(run(&mut handler, &["SET", "k", "v2"]), Reply::ok());
        assert_eq!(run(&mut handler, &["TTL", "k"]), Reply::integer(-1));
    }

    #[test]
    fn test_sweep_removes_expired_keys() {
        let mut handler = CommandHandler::new();
        run(&mut handler, &["PSETEX", "a", "10", "x"]);
        run(&mut handler, &["PSETEX", "b", "10", "y"]);
        run(&mut handler, &["SET", "c", "z"]);

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(handler.sweep(100), (2, 2));
        assert_eq!(handler.db().len(), 1);
        assert_eq!(handler.stats().expired, 2);
        assert!(handler.db().expiry(b"c").is_none());
    }
}
