//! Keyspace and Connection Commands
//!
//! Commands that act on keys regardless of the type they hold, plus the
//! trivial connection commands:
//!
//! - `DEL key [key ...]`, `EXISTS key [key ...]`, `TYPE key`
//! - `EXPIRE key seconds`, `PEXPIRE key milliseconds`, `PERSIST key`
//! - `TTL key`, `PTTL key`
//! - `DBSIZE`, `FLUSHDB`
//! - `PING [message]`, `ECHO message`

use crate::commands::context::{CommandContext, HandlerResult};
use crate::commands::strings::Expiry;
use crate::error::CommandError;
use crate::protocol::Reply;
use crate::storage::value::parse_i64;
use crate::storage::now_ms;
use bytes::Bytes;

/// DEL key [key ...]
pub fn del_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let mut deleted = 0;
    for key in &argv[1..] {
        if ctx.keyspace.remove(key) {
            ctx.keyspace.notify_modified(key);
            deleted += 1;
        }
    }
    ctx.dirty.incr(deleted);
    Ok(Reply::integer(deleted as i64).into())
}

/// EXISTS key [key ...]
///
/// A key named more than once is counted more than once.
pub fn exists_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let count = argv[1..]
        .iter()
        .filter(|key| ctx.keyspace.lookup_read(key).is_some())
        .count();
    Ok(Reply::from_len(count).into())
}

/// TYPE key
pub fn type_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let name = ctx
        .keyspace
        .lookup_read(&argv[1])
        .map_or("none", |value| value.type_name());
    Ok(Reply::status(name).into())
}

/// EXPIRE key seconds
pub fn expire_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let amount = parse_i64(&argv[2])?;
    expire_generic(ctx, &argv[1], Expiry::seconds(amount, "expire"))
}

/// PEXPIRE key milliseconds
pub fn pexpire_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let amount = parse_i64(&argv[2])?;
    expire_generic(ctx, &argv[1], Expiry::milliseconds(amount, "pexpire"))
}

/// Attaches a relative deadline. A non-positive amount deletes the key.
fn expire_generic(ctx: &mut CommandContext<'_>, key: &Bytes, expiry: Expiry) -> HandlerResult {
    if ctx.keyspace.lookup_write(key).is_none() {
        return Ok(Reply::integer(0).into());
    }

    if expiry.amount <= 0 {
        ctx.keyspace.remove(key);
    } else {
        let ms = expiry.to_millis()?;
        ctx.keyspace.set_expiry(key, now_ms().saturating_add(ms));
    }
    ctx.keyspace.notify_modified(key);
    ctx.dirty.incr(1);
    Ok(Reply::integer(1).into())
}

/// PERSIST key
pub fn persist_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let key = &argv[1];
    if ctx.keyspace.lookup_write(key).is_none() || !ctx.keyspace.clear_expiry(key) {
        return Ok(Reply::integer(0).into());
    }
    ctx.dirty.incr(1);
    Ok(Reply::integer(1).into())
}

/// TTL key
pub fn ttl_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let reply = match remaining_ms(ctx, &argv[1]) {
        Some(ms) if ms >= 0 => (ms + 500) / 1000,
        other => other.unwrap_or(-2),
    };
    Ok(Reply::integer(reply).into())
}

/// PTTL key
pub fn pttl_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    Ok(Reply::integer(remaining_ms(ctx, &argv[1]).unwrap_or(-2)).into())
}

/// Milliseconds left on a key: `None` if absent, `-1` if it never expires.
fn remaining_ms(ctx: &mut CommandContext<'_>, key: &[u8]) -> Option<i64> {
    ctx.keyspace.lookup_read(key)?;
    Some(match ctx.keyspace.expiry(key) {
        None => -1,
        Some(at) => i64::try_from(at.saturating_sub(now_ms())).unwrap_or(i64::MAX),
    })
}

/// DBSIZE
pub fn dbsize_command(ctx: &mut CommandContext<'_>, _argv: &[Bytes]) -> HandlerResult {
    Ok(Reply::from_len(ctx.keyspace.len()).into())
}

/// FLUSHDB
pub fn flushdb_command(ctx: &mut CommandContext<'_>, _argv: &[Bytes]) -> HandlerResult {
    let removed = ctx.keyspace.len();
    ctx.keyspace.flush();
    ctx.dirty.incr(removed as u64);
    Ok(Reply::ok().into())
}

/// PING [message]
pub fn ping_command(_ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    match argv.len() {
        1 => Ok(Reply::status("PONG").into()),
        2 => Ok(Reply::Bulk(argv[1].clone()).into()),
        _ => Err(CommandError::WrongArity("ping".to_string())),
    }
}

/// ECHO message
pub fn echo_command(_ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    Ok(Reply::Bulk(argv[1].clone()).into())
}
