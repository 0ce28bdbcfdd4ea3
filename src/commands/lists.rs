//! List Commands
//!
//! A minimal list type. It exists so that keys can hold something other than
//! a string, which is what the string family's WRONGTYPE checks guard
//! against.
//!
//! - `LPUSH key value [value ...]`, `RPUSH key value [value ...]`
//! - `LPOP key`, `RPOP key`
//! - `LLEN key`, `LRANGE key start stop`
//!
//! A list that becomes empty is removed from the keyspace.

use crate::commands::context::{CommandContext, HandlerResult};
use crate::error::CommandError;
use crate::protocol::Reply;
use crate::storage::value::parse_i64;
use crate::storage::Value;
use bytes::Bytes;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Head,
    Tail,
}

fn push(ctx: &mut CommandContext<'_>, argv: &[Bytes], end: End) -> HandlerResult {
    let key = &argv[1];
    let len = match ctx.keyspace.lookup_write(key) {
        Some(Value::List(list)) => {
            push_all(list, &argv[2..], end);
            list.len()
        }
        Some(_) => return Err(CommandError::WrongType),
        None => {
            let mut list = VecDeque::with_capacity(argv.len() - 2);
            push_all(&mut list, &argv[2..], end);
            let len = list.len();
            ctx.keyspace.add(key.clone(), Value::List(list));
            len
        }
    };

    ctx.keyspace.notify_modified(key);
    ctx.dirty.incr((argv.len() - 2) as u64);
    Ok(Reply::from_len(len).into())
}

fn push_all(list: &mut VecDeque<Bytes>, values: &[Bytes], end: End) {
    for value in values {
        match end {
            End::Head => list.push_front(value.clone()),
            End::Tail => list.push_back(value.clone()),
        }
    }
}

fn pop(ctx: &mut CommandContext<'_>, argv: &[Bytes], end: End) -> HandlerResult {
    let key = &argv[1];
    let (popped, now_empty) = match ctx.keyspace.lookup_write(key) {
        None => return Ok(Reply::null().into()),
        Some(Value::List(list)) => {
            let popped = match end {
                End::Head => list.pop_front(),
                End::Tail => list.pop_back(),
            };
            (popped, list.is_empty())
        }
        Some(_) => return Err(CommandError::WrongType),
    };

    if now_empty {
        ctx.keyspace.remove(key);
    }
    ctx.keyspace.notify_modified(key);
    ctx.dirty.incr(1);
    Ok(Reply::optional(popped).into())
}

/// LPUSH key value [value ...]
pub fn lpush_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    push(ctx, argv, End::Head)
}

/// RPUSH key value [value ...]
pub fn rpush_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    push(ctx, argv, End::Tail)
}

/// LPOP key
pub fn lpop_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    pop(ctx, argv, End::Head)
}

/// RPOP key
pub fn rpop_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    pop(ctx, argv, End::Tail)
}

/// LLEN key
pub fn llen_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let len = match ctx.keyspace.lookup_read(&argv[1]) {
        None => 0,
        Some(Value::List(list)) => list.len(),
        Some(_) => return Err(CommandError::WrongType),
    };
    Ok(Reply::from_len(len).into())
}

/// LRANGE key start stop
///
/// Both bounds are inclusive and may be negative.
pub fn lrange_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let start = parse_i64(&argv[2])?;
    let stop = parse_i64(&argv[3])?;

    let list = match ctx.keyspace.lookup_read(&argv[1]) {
        None => return Ok(Reply::multi(Vec::new()).into()),
        Some(Value::List(list)) => list,
        Some(_) => return Err(CommandError::WrongType),
    };

    let len = list.len() as i64;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return Ok(Reply::multi(Vec::new()).into());
    }

    let items = list
        .range(start as usize..=stop as usize)
        .cloned()
        .map(Reply::Bulk)
        .collect();
    Ok(Reply::multi(items).into())
}
