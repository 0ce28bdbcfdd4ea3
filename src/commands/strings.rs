//! String Commands
//!
//! The string family is built from five engines that operate on typed
//! arguments, and thin command functions that parse an argument vector and
//! bind it onto an engine:
//!
//! | Engine          | Commands                                   |
//! |-----------------|--------------------------------------------|
//! | [`assign`]      | SET, SETNX, SETEX, PSETEX (and GETSET)     |
//! | [`set_range`]   | SETRANGE                                   |
//! | [`get_range`]   | GETRANGE, SUBSTR                           |
//! | [`append`]      | APPEND                                     |
//! | [`incr_by`]     | INCR, DECR, INCRBY, DECRBY                 |
//! | [`incr_by_float`] | INCRBYFLOAT                              |
//! | [`mset`]        | MSET, MSETNX                               |
//!
//! Every engine validates before it mutates: an error return means the
//! keyspace and the dirty counter are untouched.
//!
//! ## Copy-on-Write
//!
//! SETRANGE and APPEND write bytes in place. They only ever do so on an
//! exclusively owned raw buffer; integer-encoded and shared values are first
//! replaced by a private copy (see [`StringValue::make_exclusive`]). Bytes
//! already handed out in a reply are therefore never changed underneath
//! their holder.

use crate::commands::context::{CommandContext, HandlerResult, Outcome};
use crate::error::{CommandError, CommandResult};
use crate::protocol::Reply;
use crate::storage::value::{format_decimal, parse_float, parse_i64, Float};
use crate::storage::{check_string_length, now_ms, StringValue, Value};
use bytes::{Bytes, BytesMut};

/// Precondition of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    Always,
    /// NX
    IfNotExists,
    /// XX
    IfExists,
}

/// Whether an assignment happened. A failed precondition is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assigned {
    Performed,
    NotPerformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Milliseconds,
}

/// A relative expiry requested together with an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    pub amount: i64,
    pub unit: TimeUnit,
    /// Command name reported if the amount is rejected
    pub command: &'static str,
}

impl Expiry {
    pub fn seconds(amount: i64, command: &'static str) -> Self {
        Self {
            amount,
            unit: TimeUnit::Seconds,
            command,
        }
    }

    pub fn milliseconds(amount: i64, command: &'static str) -> Self {
        Self {
            amount,
            unit: TimeUnit::Milliseconds,
            command,
        }
    }

    /// The amount in milliseconds. Must be positive and must not overflow.
    pub fn to_millis(&self) -> CommandResult<u64> {
        let ms = match self.unit {
            TimeUnit::Seconds => self.amount.checked_mul(1000),
            TimeUnit::Milliseconds => Some(self.amount),
        };
        match ms {
            Some(ms) if ms > 0 => Ok(ms as u64),
            _ => Err(CommandError::InvalidExpireTime(self.command)),
        }
    }
}

// ============================================================================
// Engines
// ============================================================================

/// Stores `value` at `key` if `condition` holds.
///
/// The stored value replaces any previous one and drops its expiry. If
/// `expiry` is given, the new deadline is `now + expiry`.
pub fn assign(
    ctx: &mut CommandContext<'_>,
    key: &Bytes,
    value: StringValue,
    condition: SetCondition,
    expiry: Option<Expiry>,
) -> CommandResult<Assigned> {
    let ttl_ms = expiry.map(|e| e.to_millis()).transpose()?;

    let exists = ctx.keyspace.lookup_write(key).is_some();
    let blocked = match condition {
        SetCondition::Always => false,
        SetCondition::IfNotExists => exists,
        SetCondition::IfExists => !exists,
    };
    if blocked {
        return Ok(Assigned::NotPerformed);
    }

    ctx.keyspace.set_key(key.clone(), Value::String(value));
    ctx.dirty.incr(1);

    if let Some(ms) = ttl_ms {
        ctx.keyspace.set_expiry(key, now_ms().saturating_add(ms));
    }
    Ok(Assigned::Performed)
}

/// Writes `bytes` at `offset`, zero-padding any gap. Returns the final length.
pub fn set_range(
    ctx: &mut CommandContext<'_>,
    key: &Bytes,
    offset: i64,
    bytes: &[u8],
) -> CommandResult<usize> {
    if offset < 0 {
        return Err(CommandError::OffsetOutOfRange);
    }
    let offset = offset as u64;
    let required = offset
        .checked_add(bytes.len() as u64)
        .ok_or(CommandError::TooLarge)?;

    let len = match ctx.keyspace.lookup_write(key) {
        None => {
            if bytes.is_empty() {
                return Ok(0);
            }
            check_string_length(required)?;

            let mut buf = BytesMut::new();
            write_at(&mut buf, offset as usize, bytes);
            let len = buf.len();
            ctx.keyspace
                .add(key.clone(), Value::String(StringValue::Raw(buf)));
            len
        }
        Some(value) => {
            let current = value.as_string_mut()?;
            if bytes.is_empty() {
                return Ok(current.len());
            }
            check_string_length(required)?;

            let buf = current.make_exclusive();
            write_at(buf, offset as usize, bytes);
            buf.len()
        }
    };

    ctx.keyspace.notify_modified(key);
    ctx.dirty.incr(1);
    Ok(len)
}

fn write_at(buf: &mut BytesMut, offset: usize, bytes: &[u8]) {
    let end = offset + bytes.len();
    if buf.len() < end {
        buf.resize(end, 0);
    }
    buf[offset..end].copy_from_slice(bytes);
}

/// Returns the inclusive byte range `[start, end]`.
///
/// Negative indexes count from the end. Out of range bounds are clamped, and
/// an inverted range yields an empty result.
pub fn get_range(
    ctx: &mut CommandContext<'_>,
    key: &[u8],
    start: i64,
    end: i64,
) -> CommandResult<Bytes> {
    let Some(value) = ctx.keyspace.lookup_read(key) else {
        return Ok(Bytes::new());
    };
    let current = value.as_string_mut()?;

    let len = current.len() as i64;
    if len == 0 {
        return Ok(Bytes::new());
    }

    let mut start = if start < 0 { start + len } else { start };
    let mut end = if end < 0 { end + len } else { end };
    start = start.max(0);
    end = end.max(0);
    if end >= len {
        end = len - 1;
    }

    if start > end {
        return Ok(Bytes::new());
    }
    let range = start as usize..=end as usize;
    Ok(match current {
        StringValue::Raw(buf) => Bytes::copy_from_slice(&buf[range]),
        StringValue::Shared(bytes) => bytes.slice(range),
        StringValue::Int(n) => Bytes::from(n.to_string()).slice(range),
    })
}

/// Appends `bytes` to the string at `key`, creating it if absent.
pub fn append(ctx: &mut CommandContext<'_>, key: &Bytes, bytes: &Bytes) -> CommandResult<usize> {
    let len = match ctx.keyspace.lookup_write(key) {
        None => {
            let value = StringValue::auto_encode(bytes.clone());
            let len = value.len();
            ctx.keyspace.add(key.clone(), Value::String(value));
            len
        }
        Some(value) => {
            let current = value.as_string_mut()?;
            let total = (current.len() as u64)
                .checked_add(bytes.len() as u64)
                .ok_or(CommandError::TooLarge)?;
            check_string_length(total)?;

            let buf = current.make_exclusive();
            buf.extend_from_slice(bytes);
            buf.len()
        }
    };

    ctx.keyspace.notify_modified(key);
    ctx.dirty.incr(1);
    Ok(len)
}

/// Adds `delta` to the integer at `key` (0 if absent). The expiry is kept.
pub fn incr_by(ctx: &mut CommandContext<'_>, key: &Bytes, delta: i64) -> CommandResult<i64> {
    let current = match ctx.keyspace.lookup_write(key) {
        None => None,
        Some(value) => Some(value.as_string_mut()?.to_i64()?),
    };

    let next = current
        .unwrap_or(0)
        .checked_add(delta)
        .ok_or(CommandError::Overflow)?;

    store_number(ctx, key, current.is_some(), StringValue::from_i64(next));
    Ok(next)
}

/// Adds the decimal `delta` to the number at `key` (0 if absent).
///
/// Returns the formatted result. The caller must propagate the command as an
/// assignment of that exact text.
pub fn incr_by_float(
    ctx: &mut CommandContext<'_>,
    key: &Bytes,
    delta: &[u8],
) -> CommandResult<Bytes> {
    let current = match ctx.keyspace.lookup_write(key) {
        None => None,
        Some(value) => Some(value.as_string_mut()?.to_float()?),
    };
    let delta = parse_float(delta)?;

    let exists = current.is_some();
    let next = current.unwrap_or_else(Float::zero).checked_add(&delta)?;

    let formatted = Bytes::from(format_decimal(&next));
    store_number(ctx, key, exists, StringValue::Shared(formatted.clone()));
    Ok(formatted)
}

fn store_number(ctx: &mut CommandContext<'_>, key: &Bytes, exists: bool, value: StringValue) {
    if exists {
        ctx.keyspace.overwrite(key, Value::String(value));
    } else {
        ctx.keyspace.add(key.clone(), Value::String(value));
    }
    ctx.keyspace.notify_modified(key);
    ctx.dirty.incr(1);
}

/// Assigns every `(key, value)` pair of a flat `pairs` slice.
///
/// With `only_if_absent`, nothing at all is written unless every key is
/// absent.
pub fn mset(
    ctx: &mut CommandContext<'_>,
    pairs: &[Bytes],
    only_if_absent: bool,
) -> CommandResult<Assigned> {
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        let name = if only_if_absent { "msetnx" } else { "mset" };
        return Err(CommandError::WrongArity(name.to_string()));
    }

    if only_if_absent {
        let busy = pairs
            .chunks_exact(2)
            .filter(|pair| ctx.keyspace.lookup_write(&pair[0]).is_some())
            .count();
        if busy > 0 {
            return Ok(Assigned::NotPerformed);
        }
    }

    for pair in pairs.chunks_exact(2) {
        let value = StringValue::auto_encode(pair[1].clone());
        ctx.keyspace.set_key(pair[0].clone(), Value::String(value));
    }
    ctx.dirty.incr((pairs.len() / 2) as u64);
    Ok(Assigned::Performed)
}

/// Reads a string value, aliasing its bytes for the reply.
pub fn get(ctx: &mut CommandContext<'_>, key: &[u8]) -> CommandResult<Option<Bytes>> {
    match ctx.keyspace.lookup_read(key) {
        None => Ok(None),
        Some(value) => Ok(Some(value.as_string_mut()?.share())),
    }
}

// ============================================================================
// Commands
// ============================================================================
//
// Arity has already been checked against the command table, so positional
// arguments can be indexed directly.

/// SET key value [NX|XX] [EX seconds|PX milliseconds]
pub fn set_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let (condition, expiry) = parse_set_options(&argv[3..])?;
    let value = StringValue::auto_encode(argv[2].clone());

    let reply = match assign(ctx, &argv[1], value, condition, expiry)? {
        Assigned::Performed => Reply::ok(),
        Assigned::NotPerformed => Reply::null(),
    };
    Ok(reply.into())
}

fn parse_set_options(options: &[Bytes]) -> CommandResult<(SetCondition, Option<Expiry>)> {
    let mut condition = SetCondition::Always;
    let mut expiry: Option<(TimeUnit, &Bytes)> = None;

    let mut iter = options.iter();
    while let Some(option) = iter.next() {
        if option.eq_ignore_ascii_case(b"NX") {
            if condition == SetCondition::IfExists {
                return Err(CommandError::Syntax);
            }
            condition = SetCondition::IfNotExists;
        } else if option.eq_ignore_ascii_case(b"XX") {
            if condition == SetCondition::IfNotExists {
                return Err(CommandError::Syntax);
            }
            condition = SetCondition::IfExists;
        } else if option.eq_ignore_ascii_case(b"EX") || option.eq_ignore_ascii_case(b"PX") {
            let unit = if option.eq_ignore_ascii_case(b"EX") {
                TimeUnit::Seconds
            } else {
                TimeUnit::Milliseconds
            };
            if expiry.is_some_and(|(previous, _)| previous != unit) {
                return Err(CommandError::Syntax);
            }
            let amount = iter.next().ok_or(CommandError::Syntax)?;
            expiry = Some((unit, amount));
        } else {
            return Err(CommandError::Syntax);
        }
    }

    let expiry = match expiry {
        None => None,
        Some((unit, amount)) => Some(Expiry {
            amount: parse_i64(amount)?,
            unit,
            command: "set",
        }),
    };
    Ok((condition, expiry))
}

/// SETNX key value
pub fn setnx_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let value = StringValue::auto_encode(argv[2].clone());
    let assigned = assign(ctx, &argv[1], value, SetCondition::IfNotExists, None)?;
    Ok(Reply::integer((assigned == Assigned::Performed) as i64).into())
}

/// SETEX key seconds value
pub fn setex_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let expiry = Expiry::seconds(parse_i64(&argv[2])?, "setex");
    let value = StringValue::auto_encode(argv[3].clone());
    assign(ctx, &argv[1], value, SetCondition::Always, Some(expiry))?;
    Ok(Reply::ok().into())
}

/// PSETEX key milliseconds value
pub fn psetex_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let expiry = Expiry::milliseconds(parse_i64(&argv[2])?, "psetex");
    let value = StringValue::auto_encode(argv[3].clone());
    assign(ctx, &argv[1], value, SetCondition::Always, Some(expiry))?;
    Ok(Reply::ok().into())
}

/// GET key
pub fn get_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    Ok(Reply::optional(get(ctx, &argv[1])?).into())
}

/// GETSET key value
pub fn getset_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let old = get(ctx, &argv[1])?;

    let value = StringValue::auto_encode(argv[2].clone());
    ctx.keyspace.set_key(argv[1].clone(), Value::String(value));
    ctx.dirty.incr(1);

    Ok(Reply::optional(old).into())
}

/// MGET key [key ...]
///
/// Keys that are absent or hold another type both come back as null.
pub fn mget_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let values = argv[1..]
        .iter()
        .map(|key| match ctx.keyspace.lookup_read(key) {
            Some(Value::String(s)) => Reply::Bulk(s.share()),
            _ => Reply::null(),
        })
        .collect();
    Ok(Reply::multi(values).into())
}

/// MSET key value [key value ...]
pub fn mset_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    mset(ctx, &argv[1..], false)?;
    Ok(Reply::ok().into())
}

/// MSETNX key value [key value ...]
pub fn msetnx_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let assigned = mset(ctx, &argv[1..], true)?;
    Ok(Reply::integer((assigned == Assigned::Performed) as i64).into())
}

/// SETRANGE key offset value
pub fn setrange_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let offset = parse_i64(&argv[2])?;
    let len = set_range(ctx, &argv[1], offset, &argv[3])?;
    Ok(Reply::from_len(len).into())
}

/// GETRANGE key start end (also SUBSTR)
pub fn getrange_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let start = parse_i64(&argv[2])?;
    let end = parse_i64(&argv[3])?;
    Ok(Reply::Bulk(get_range(ctx, &argv[1], start, end)?).into())
}

/// APPEND key value
pub fn append_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let len = append(ctx, &argv[1], &argv[2])?;
    Ok(Reply::from_len(len).into())
}

/// STRLEN key
pub fn strlen_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let len = match ctx.keyspace.lookup_read(&argv[1]) {
        None => 0,
        Some(value) => value.as_string_mut()?.len(),
    };
    Ok(Reply::from_len(len).into())
}

/// INCR key
pub fn incr_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    Ok(Reply::integer(incr_by(ctx, &argv[1], 1)?).into())
}

/// DECR key
pub fn decr_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    Ok(Reply::integer(incr_by(ctx, &argv[1], -1)?).into())
}

/// INCRBY key increment
pub fn incrby_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let delta = parse_i64(&argv[2])?;
    Ok(Reply::integer(incr_by(ctx, &argv[1], delta)?).into())
}

/// DECRBY key decrement
pub fn decrby_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let delta = parse_i64(&argv[2])?
        .checked_neg()
        .ok_or(CommandError::Overflow)?;
    Ok(Reply::integer(incr_by(ctx, &argv[1], delta)?).into())
}

/// INCRBYFLOAT key increment
///
/// Propagated as `SET key <result>` so that replaying the stream never
/// depends on how another process rounds or formats the sum.
pub fn incrbyfloat_command(ctx: &mut CommandContext<'_>, argv: &[Bytes]) -> HandlerResult {
    let value = incr_by_float(ctx, &argv[1], &argv[2])?;
    let rewrite = vec![Bytes::from_static(b"SET"), argv[1].clone(), value.clone()];
    Ok(Outcome::rewritten(Reply::Bulk(value), rewrite))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::context::Propagation;
    use crate::commands::testing::Fixture;
    use crate::commands::CommandFn;
    use crate::storage::{Encoding, Keyspace, MAX_STRING_LEN};

    fn bulk(s: &str) -> Reply {
        Reply::bulk(s.to_string())
    }

    #[test]
    fn test_absent_key_reads() {
        let mut f = Fixture::default();
        assert_eq!(f.call(get_command, &["GET", "k"]), Ok(Reply::Null));
        assert_eq!(f.call(strlen_command, &["STRLEN", "k"]), Ok(Reply::integer(0)));
        assert_eq!(
            f.call(getrange_command, &["GETRANGE", "k", "0", "-1"]),
            Ok(bulk(""))
        );
        assert_eq!(f.dirty.get(), 0);
    }

    #[test]
    fn test_append_creates_key() {
        let mut f = Fixture::default();
        assert_eq!(f.call(append_command, &["APPEND", "k", "hello"]), Ok(Reply::integer(5)));
        assert_eq!(f.call(append_command, &["APPEND", "k", " world"]), Ok(Reply::integer(11)));
        assert_eq!(f.call(get_command, &["GET", "k"]), Ok(bulk("hello world")));
        assert_eq!(f.dirty.get(), 2);
    }

    #[test]
    fn test_append_to_integer_value() {
        let mut f = Fixture::default();
        f.call(set_command, &["SET", "k", "12"]).unwrap();
        assert_eq!(f.string("k").map(|s| s.encoding()), Some(Encoding::Int));

        assert_eq!(f.call(append_command, &["APPEND", "k", "34"]), Ok(Reply::integer(4)));
        assert_eq!(f.string("k").map(|s| s.encoding()), Some(Encoding::Raw));
        assert_eq!(f.call(get_command, &["GET", "k"]), Ok(bulk("1234")));
    }

    #[test]
    fn test_append_length_limit() {
        let mut f = Fixture::default();
        // Zeroed allocation, so the pages are never touched
        let full = Bytes::from(vec![0u8; MAX_STRING_LEN as usize]);
        f.db.add(Bytes::from("k"), Value::String(StringValue::Shared(full.clone())));

        assert_eq!(
            f.call(append_command, &["APPEND", "k", "x"]),
            Err(CommandError::TooLarge)
        );
        assert_eq!(f.dirty.get(), 0);
        let kept = f.string("k").unwrap();
        assert!(kept.is_shared());
        assert_eq!(kept.len(), MAX_STRING_LEN as usize);
    }

    #[test]
    fn test_set_nx_keeps_first_value() {
        let mut f = Fixture::default();
        assert_eq!(f.call(set_command, &["SET", "k", "v1"]), Ok(Reply::ok()));
        assert_eq!(f.call(set_command, &["SET", "k", "v2", "NX"]), Ok(Reply::Null));
        assert_eq!(f.call(get_command, &["GET", "k"]), Ok(bulk("v1")));
        assert_eq!(f.dirty.get(), 1);
    }

    #[test]
    fn test_set_xx_requires_existing_key() {
        let mut f = Fixture::default();
        assert_eq!(f.call(set_command, &["SET", "k", "v", "xx"]), Ok(Reply::Null));
        assert_eq!(f.call(get_command, &["GET", "k"]), Ok(Reply::Null));

        f.call(set_command, &["SET", "k", "v"]).unwrap();
        assert_eq!(f.call(set_command, &["SET", "k", "w", "XX"]), Ok(Reply::ok()));
        assert_eq!(f.call(get_command, &["GET", "k"]), Ok(bulk("w")));
    }

    #[test]
    fn test_set_with_expiry_then_plain_set_clears_it() {
        let mut f = Fixture::default();
        let before = now_ms();
        f.call(set_command, &["SET", "k", "v", "EX", "10"]).unwrap();

        let at = f.db.expiry(b"k").unwrap();
        assert!(at >= before + 10_000 && at <= now_ms() + 10_000);

        f.call(set_command, &["SET", "k", "v2"]).unwrap();
        assert_eq!(f.db.expiry(b"k"), None);
    }

    #[test]
    fn test_setex_and_psetex() {
        let mut f = Fixture::default();
        f.call(setex_command, &["SETEX", "a", "100", "x"]).unwrap();
        f.call(psetex_command, &["PSETEX", "b", "1500", "y"]).unwrap();

        let now = now_ms();
        assert!(f.db.expiry(b"a").unwrap() > now + 99_000);
        assert!(f.db.expiry(b"b").unwrap() <= now + 1500);
        assert_eq!(f.dirty.get(), 2);
    }

    #[test]
    fn test_set_option_errors() {
        let mut f = Fixture::default();
        let cases: [&[&str]; 4] = [
            &["SET", "k", "v", "NX", "XX"],
            &["SET", "k", "v", "EX", "10", "PX", "100"],
            &["SET", "k", "v", "EX"],
            &["SET", "k", "v", "KEEPTTL"],
        ];
        for args in cases {
            assert_eq!(f.call(set_command, args), Err(CommandError::Syntax), "{args:?}");
        }

        assert_eq!(
            f.call(set_command, &["SET", "k", "v", "EX", "ten"]),
            Err(CommandError::NotAnInteger)
        );
        assert_eq!(
            f.call(set_command, &["SET", "k", "v", "PX", "0"]),
            Err(CommandError::InvalidExpireTime("set"))
        );
        assert_eq!(
            f.call(setex_command, &["SETEX", "k", "-5", "v"]),
            Err(CommandError::InvalidExpireTime("setex"))
        );
        assert_eq!(
            f.call(set_command, &["SET", "k", "v", "EX", "9223372036854775807"]),
            Err(CommandError::InvalidExpireTime("set"))
        );

        assert_eq!(f.db.len(), 0);
        assert_eq!(f.dirty.get(), 0);
    }

    #[test]
    fn test_setnx_replies() {
        let mut f = Fixture::default();
        assert_eq!(f.call(setnx_command, &["SETNX", "k", "a"]), Ok(Reply::integer(1)));
        assert_eq!(f.call(setnx_command, &["SETNX", "k", "b"]), Ok(Reply::integer(0)));
        assert_eq!(f.call(get_command, &["GET", "k"]), Ok(bulk("a")));
    }

    #[test]
    fn test_set_is_idempotent() {
        let mut f = Fixture::default();
        f.call(set_command, &["SET", "k", "v"]).unwrap();
        let first = f.string("k");
        f.call(set_command, &["SET", "k", "v"]).unwrap();
        assert_eq!(f.string("k"), first);
        assert_eq!(f.db.len(), 1);
    }

    #[test]
    fn test_setrange_pads_absent_key() {
        let mut f = Fixture::default();
        assert_eq!(
            f.call(setrange_command, &["SETRANGE", "k", "5", "hi"]),
            Ok(Reply::integer(7))
        );
        assert_eq!(
            f.string("k").map(|s| s.to_bytes()),
            Some(Bytes::from_static(b"\0\0\0\0\0hi"))
        );
    }

    #[test]
    fn test_setrange_overwrites_in_place() {
        let mut f = Fixture::default();
        f.call(set_command, &["SET", "k", "Hello World"]).unwrap();
        assert_eq!(
            f.call(setrange_command, &["SETRANGE", "k", "6", "Redis"]),
            Ok(Reply::integer(11))
        );
        assert_eq!(f.call(get_command, &["GET", "k"]), Ok(bulk("Hello Redis")));
    }

    #[test]
    fn test_setrange_empty_value_does_not_mutate() {
        let mut f = Fixture::default();
        assert_eq!(
            f.call(setrange_command, &["SETRANGE", "k", "3", ""]),
            Ok(Reply::integer(0))
        );
        assert_eq!(f.db.len(), 0);

        f.call(set_command, &["SET", "k", "abc"]).unwrap();
        let version = f.db.key_version(b"k");
        assert_eq!(
            f.call(setrange_command, &["SETRANGE", "k", "10", ""]),
            Ok(Reply::integer(3))
        );
        assert_eq!(f.db.key_version(b"k"), version);
        assert_eq!(f.dirty.get(), 1);
    }

    #[test]
    fn test_setrange_errors() {
        let mut f = Fixture::default();
        assert_eq!(
            f.call(setrange_command, &["SETRANGE", "k", "-1", "x"]),
            Err(CommandError::OffsetOutOfRange)
        );
        assert_eq!(
            f.call(setrange_command, &["SETRANGE", "k", "536870912", "x"]),
            Err(CommandError::TooLarge)
        );
        assert_eq!(f.db.len(), 0);
    }

    #[test]
    fn test_setrange_copies_shared_value() {
        let mut f = Fixture::default();
        let alias = Bytes::from("shared bytes");
        f.db.add(
            Bytes::from("k"),
            Value::String(StringValue::Shared(alias.clone())),
        );

        f.call(setrange_command, &["SETRANGE", "k", "0", "SHARED"]).unwrap();

        assert_eq!(alias, Bytes::from("shared bytes"));
        assert_eq!(f.call(get_command, &["GET", "k"]), Ok(bulk("SHARED bytes")));
    }

    #[test]
    fn test_reply_alias_survives_append() {
        let mut f = Fixture::default();
        f.call(append_command, &["APPEND", "k", "abc"]).unwrap();
        f.call(append_command, &["APPEND", "k", "def"]).unwrap();

        let before = f.call(get_command, &["GET", "k"]).unwrap();
        f.call(append_command, &["APPEND", "k", "ghi"]).unwrap();
        f.call(setrange_command, &["SETRANGE", "k", "0", "X"]).unwrap();

        assert_eq!(before, bulk("abcdef"));
        assert_eq!(f.call(get_command, &["GET", "k"]), Ok(bulk("Xbcdefghi")));
    }

    #[test]
    fn test_getrange_indexes() {
        let mut f = Fixture::default();
        f.call(set_command, &["SET", "k", "Hello World"]).unwrap();

        let mut range = |start: &str, end: &str| {
            f.call(getrange_command, &["GETRANGE", "k", start, end]).unwrap()
        };
        assert_eq!(range("0", "-1"), bulk("Hello World"));
        assert_eq!(range("-5", "-1"), bulk("World"));
        assert_eq!(range("5", "2"), bulk(""));
        assert_eq!(range("0", "4"), bulk("Hello"));
        assert_eq!(range("-100", "100"), bulk("Hello World"));
        assert_eq!(range("20", "30"), bulk(""));
        assert_eq!(
            range("-9223372036854775808", "-9223372036854775808"),
            bulk("H")
        );
    }

    #[test]
    fn test_getrange_slices_without_copying_the_value() {
        let mut f = Fixture::default();
        let stored = Bytes::from("shared buffer");
        f.db.add(
            Bytes::from("shared"),
            Value::String(StringValue::Shared(stored.clone())),
        );
        let got = get_range(&mut f.ctx(), b"shared", 7, 12).unwrap();
        assert_eq!(got, Bytes::from("buffer"));
        assert_eq!(got.as_ptr(), stored[7..].as_ptr());

        f.call(append_command, &["APPEND", "raw", "abc"]).unwrap();
        f.call(append_command, &["APPEND", "raw", "def"]).unwrap();
        assert_eq!(get_range(&mut f.ctx(), b"raw", 2, 3), Ok(Bytes::from("cd")));
        assert!(f.string("raw").is_some_and(|s| s.is_mutable_in_place()));
    }

    #[test]
    fn test_getrange_on_integer_encoding() {
        let mut f = Fixture::default();
        f.call(set_command, &["SET", "k", "-12345"]).unwrap();
        assert_eq!(
            f.call(getrange_command, &["GETRANGE", "k", "1", "2"]),
            Ok(bulk("12"))
        );
    }

    #[test]
    fn test_wrong_type() {
        let mut f = Fixture::default();
        f.db.add(Bytes::from("list"), Value::List(Default::default()));

        let cases: [(CommandFn, &[&str]); 8] = [
            (get_command, &["GET", "list"]),
            (getset_command, &["GETSET", "list", "v"]),
            (append_command, &["APPEND", "list", "v"]),
            (strlen_command, &["STRLEN", "list"]),
            (setrange_command, &["SETRANGE", "list", "0", "v"]),
            (getrange_command, &["GETRANGE", "list", "0", "1"]),
            (incr_command, &["INCR", "list"]),
            (incrbyfloat_command, &["INCRBYFLOAT", "list", "1"]),
        ];
        for (command, args) in cases {
            assert_eq!(f.call(command, args), Err(CommandError::WrongType), "{args:?}");
        }

        assert!(matches!(f.db.lookup_write(b"list"), Some(Value::List(_))));
        assert_eq!(f.dirty.get(), 0);
    }

    #[test]
    fn test_getset() {
        let mut f = Fixture::default();
        assert_eq!(f.call(getset_command, &["GETSET", "k", "1"]), Ok(Reply::Null));
        f.db.set_expiry(b"k", now_ms() + 60_000);

        assert_eq!(f.call(getset_command, &["GETSET", "k", "2"]), Ok(bulk("1")));
        assert_eq!(f.string("k"), Some(StringValue::Int(2)));
        assert_eq!(f.db.expiry(b"k"), None);
        assert_eq!(f.dirty.get(), 2);
    }

    #[test]
    fn test_incr_family() {
        let mut f = Fixture::default();
        assert_eq!(f.call(incr_command, &["INCR", "n"]), Ok(Reply::integer(1)));
        assert_eq!(f.call(incrby_command, &["INCRBY", "n", "10"]), Ok(Reply::integer(11)));
        assert_eq!(f.call(decr_command, &["DECR", "n"]), Ok(Reply::integer(10)));
        assert_eq!(f.call(decrby_command, &["DECRBY", "n", "15"]), Ok(Reply::integer(-5)));
        assert_eq!(f.string("n"), Some(StringValue::Int(-5)));
        assert_eq!(f.dirty.get(), 4);
    }

    #[test]
    fn test_incr_keeps_expiry() {
        let mut f = Fixture::default();
        f.call(setex_command, &["SETEX", "n", "100", "5"]).unwrap();
        f.call(incr_command, &["INCR", "n"]).unwrap();
        assert!(f.db.expiry(b"n").is_some());
        assert_eq!(f.call(get_command, &["GET", "n"]), Ok(bulk("6")));
    }

    #[test]
    fn test_incr_overflow_leaves_value() {
        let mut f = Fixture::default();
        f.call(set_command, &["SET", "n", "9223372036854775807"]).unwrap();
        assert_eq!(f.call(incr_command, &["INCR", "n"]), Err(CommandError::Overflow));
        assert_eq!(
            f.call(get_command, &["GET", "n"]),
            Ok(bulk("9223372036854775807"))
        );

        f.call(set_command, &["SET", "m", "-9223372036854775808"]).unwrap();
        assert_eq!(f.call(decr_command, &["DECR", "m"]), Err(CommandError::Overflow));
        assert_eq!(
            f.call(decrby_command, &["DECRBY", "x", "-9223372036854775808"]),
            Err(CommandError::Overflow)
        );
        assert_eq!(f.dirty.get(), 2);
    }

    #[test]
    fn test_incr_rejects_non_integers() {
        let mut f = Fixture::default();
        f.call(set_command, &["SET", "s", "abc"]).unwrap();
        assert_eq!(f.call(incr_command, &["INCR", "s"]), Err(CommandError::NotAnInteger));
        assert_eq!(
            f.call(incrby_command, &["INCRBY", "n", "1.5"]),
            Err(CommandError::NotAnInteger)
        );
        assert_eq!(f.db.lookup_write(b"n"), None);
    }

    #[test]
    fn test_incrbyfloat_formats_and_rewrites() {
        let mut f = Fixture::default();
        f.call(incrbyfloat_command, &["INCRBYFLOAT", "f", "0.1"]).unwrap();
        let outcome = f
            .outcome(incrbyfloat_command, &["INCRBYFLOAT", "f", "0.1"])
            .unwrap();

        assert_eq!(outcome.reply, bulk("0.2"));
        assert_eq!(
            outcome.propagation,
            Propagation::Rewrite(vec![
                Bytes::from("SET"),
                Bytes::from("f"),
                Bytes::from("0.2"),
            ])
        );
        assert_eq!(f.call(get_command, &["GET", "f"]), Ok(bulk("0.2")));
    }

    #[test]
    fn test_incrbyfloat_on_integer() {
        let mut f = Fixture::default();
        f.call(set_command, &["SET", "f", "10"]).unwrap();
        assert_eq!(
            f.call(incrbyfloat_command, &["INCRBYFLOAT", "f", "5.0e3"]),
            Ok(bulk("5010"))
        );
        assert_eq!(f.string("f").map(|s| s.encoding()), Some(Encoding::Raw));
    }

    #[test]
    fn test_incrbyfloat_adds_exact_decimals() {
        let mut f = Fixture::default();
        f.call(set_command, &["SET", "a", "0.1"]).unwrap();
        f.call(set_command, &["SET", "b", "1.1"]).unwrap();
        f.call(set_command, &["SET", "c", "-0.5"]).unwrap();

        assert_eq!(
            f.call(incrbyfloat_command, &["INCRBYFLOAT", "a", "0.2"]),
            Ok(bulk("0.3"))
        );
        assert_eq!(
            f.call(incrbyfloat_command, &["INCRBYFLOAT", "b", "2.2"]),
            Ok(bulk("3.3"))
        );
        assert_eq!(
            f.call(incrbyfloat_command, &["INCRBYFLOAT", "c", "0.5"]),
            Ok(bulk("0"))
        );
        assert_eq!(
            f.call(incrbyfloat_command, &["INCRBYFLOAT", "d", "1e5000"]),
            Err(CommandError::NotAFloat)
        );
        assert_eq!(f.call(get_command, &["GET", "a"]), Ok(bulk("0.3")));
    }

    #[test]
    fn test_incrbyfloat_errors() {
        let mut f = Fixture::default();
        f.call(set_command, &["SET", "s", "abc"]).unwrap();
        assert_eq!(
            f.call(incrbyfloat_command, &["INCRBYFLOAT", "s", "1"]),
            Err(CommandError::NotAFloat)
        );
        assert_eq!(
            f.call(incrbyfloat_command, &["INCRBYFLOAT", "f", "nan"]),
            Err(CommandError::NotAFloat)
        );
        assert_eq!(
            f.call(incrbyfloat_command, &["INCRBYFLOAT", "f", "inf"]),
            Err(CommandError::InvalidArithmetic)
        );
        assert_eq!(f.db.lookup_write(b"f"), None);
        assert_eq!(f.dirty.get(), 1);
    }

    #[test]
    fn test_mset_and_mget() {
        let mut f = Fixture::default();
        f.db.add(Bytes::from("list"), Value::List(Default::default()));

        assert_eq!(
            f.call(mset_command, &["MSET", "a", "1", "b", "two"]),
            Ok(Reply::ok())
        );
        assert_eq!(f.dirty.get(), 2);

        assert_eq!(
            f.call(mget_command, &["MGET", "a", "missing", "b", "list"]),
            Ok(Reply::multi(vec![bulk("1"), Reply::Null, bulk("two"), Reply::Null]))
        );
    }

    #[test]
    fn test_mset_odd_arguments() {
        let mut f = Fixture::default();
        assert_eq!(
            f.call(mset_command, &["MSET", "a", "1", "b"]),
            Err(CommandError::WrongArity("mset".into()))
        );
        assert_eq!(f.db.len(), 0);
    }

    #[test]
    fn test_msetnx_is_all_or_nothing() {
        let mut f = Fixture::default();
        f.call(set_command, &["SET", "a", "old"]).unwrap();

        assert_eq!(
            f.call(msetnx_command, &["MSETNX", "a", "1", "b", "2"]),
            Ok(Reply::integer(0))
        );
        assert_eq!(f.call(get_command, &["GET", "b"]), Ok(Reply::Null));
        assert_eq!(f.call(get_command, &["GET", "a"]), Ok(bulk("old")));
        assert_eq!(f.dirty.get(), 1);

        assert_eq!(
            f.call(msetnx_command, &["MSETNX", "b", "2", "c", "3"]),
            Ok(Reply::integer(1))
        );
        assert_eq!(f.dirty.get(), 3);
    }

    #[test]
    fn test_engine_assign_directly() {
        let mut f = Fixture::default();
        let key = Bytes::from("k");
        let mut ctx = f.ctx();

        let done = assign(
            &mut ctx,
            &key,
            StringValue::raw(b"v"),
            SetCondition::IfExists,
            None,
        );
        assert_eq!(done, Ok(Assigned::NotPerformed));

        let done = assign(
            &mut ctx,
            &key,
            StringValue::raw(b"v"),
            SetCondition::Always,
            Some(Expiry::milliseconds(500, "set")),
        );
        assert_eq!(done, Ok(Assigned::Performed));
        assert!(ctx.keyspace.expiry(b"k").is_some());
        assert_eq!(ctx.dirty.get(), 1);
    }
}
