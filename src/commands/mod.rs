//! Command Layer
//!
//! Receives parsed argument vectors, looks the command up in a static table,
//! checks its arity and runs its handler against the keyspace.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Request Parser  │  (protocol module)
//! └────────┬────────┘
//!          │ Vec<Bytes>
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  lookup, arity, dirty tracking, propagation feed
//! └────────┬────────┘
//!          │ CommandContext
//!          ▼
//! ┌─────────────────┐
//! │ strings / keys  │  command engines
//! │ / lists         │
//! └────────┬────────┘
//!          │ &mut dyn Keyspace
//!          ▼
//! ┌─────────────────┐
//! │       Db        │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Arity
//!
//! A positive arity is the exact argument count including the command name;
//! a negative arity `-n` means at least `n` arguments.

pub mod context;
pub mod handler;
pub mod keys;
pub mod lists;
pub mod strings;

pub use context::{CommandContext, DirtyCounter, HandlerResult, Outcome, Propagation};
pub use handler::CommandHandler;

use bytes::Bytes;

/// Signature shared by every command implementation.
pub type CommandFn = fn(&mut CommandContext<'_>, &[Bytes]) -> HandlerResult;

/// One row of the command table.
#[derive(Clone, Copy)]
pub struct CommandSpec {
    /// Lowercase command name
    pub name: &'static str,
    pub arity: i32,
    /// Whether the command may modify the keyspace (and so be propagated)
    pub write: bool,
    pub handler: CommandFn,
}

impl CommandSpec {
    const fn new(name: &'static str, arity: i32, write: bool, handler: CommandFn) -> Self {
        Self {
            name,
            arity,
            write,
            handler,
        }
    }

    /// Whether `argc` arguments (including the name) satisfy the arity.
    pub fn accepts(&self, argc: usize) -> bool {
        let argc = argc as i64;
        let arity = self.arity as i64;
        if arity >= 0 {
            argc == arity
        } else {
            argc >= -arity
        }
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("write", &self.write)
            .finish()
    }
}

const READ: bool = false;
const WRITE: bool = true;

/// Every command the server understands.
pub static COMMAND_TABLE: &[CommandSpec] = &[
    // String commands
    CommandSpec::new("get", 2, READ, strings::get_command),
    CommandSpec::new("set", -3, WRITE, strings::set_command),
    CommandSpec::new("setnx", 3, WRITE, strings::setnx_command),
    CommandSpec::new("setex", 4, WRITE, strings::setex_command),
    CommandSpec::new("psetex", 4, WRITE, strings::psetex_command),
    CommandSpec::new("getset", 3, WRITE, strings::getset_command),
    CommandSpec::new("mget", -2, READ, strings::mget_command),
    CommandSpec::new("mset", -3, WRITE, strings::mset_command),
    CommandSpec::new("msetnx", -3, WRITE, strings::msetnx_command),
    CommandSpec::new("setrange", 4, WRITE, strings::setrange_command),
    CommandSpec::new("getrange", 4, READ, strings::getrange_command),
    CommandSpec::new("substr", 4, READ, strings::getrange_command),
    CommandSpec::new("append", 3, WRITE, strings::append_command),
    CommandSpec::new("strlen", 2, READ, strings::strlen_command),
    CommandSpec::new("incr", 2, WRITE, strings::incr_command),
    CommandSpec::new("decr", 2, WRITE, strings::decr_command),
    CommandSpec::new("incrby", 3, WRITE, strings::incrby_command),
    CommandSpec::new("decrby", 3, WRITE, strings::decrby_command),
    CommandSpec::new("incrbyfloat", 3, WRITE, strings::incrbyfloat_command),
    // List commands
    CommandSpec::new("lpush", -3, WRITE, lists::lpush_command),
    CommandSpec::new("rpush", -3, WRITE, lists::rpush_command),
    CommandSpec::new("lpop", 2, WRITE, lists::lpop_command),
    CommandSpec::new("rpop", 2, WRITE, lists::rpop_command),
    CommandSpec::new("llen", 2, READ, lists::llen_command),
    CommandSpec::new("lrange", 4, READ, lists::lrange_command),
    // Key commands
    CommandSpec::new("del", -2, WRITE, keys::del_command),
    CommandSpec::new("exists", -2, READ, keys::exists_command),
    CommandSpec::new("type", 2, READ, keys::type_command),
    CommandSpec::new("expire", 3, WRITE, keys::expire_command),
    CommandSpec::new("pexpire", 3, WRITE, keys::pexpire_command),
    CommandSpec::new("persist", 2, WRITE, keys::persist_command),
    CommandSpec::new("ttl", 2, READ, keys::ttl_command),
    CommandSpec::new("pttl", 2, READ, keys::pttl_command),
    // Server commands
    CommandSpec::new("dbsize", 1, READ, keys::dbsize_command),
    CommandSpec::new("flushdb", 1, WRITE, keys::flushdb_command),
    CommandSpec::new("ping", -1, READ, keys::ping_command),
    CommandSpec::new("echo", 2, READ, keys::echo_command),
];

/// Finds a command by name, ignoring ASCII case.
pub fn lookup(name: &[u8]) -> Option<&'static CommandSpec> {
    COMMAND_TABLE
        .iter()
        .find(|spec| spec.name.as_bytes().eq_ignore_ascii_case(name))
}
