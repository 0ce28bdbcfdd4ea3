//! Stored Values
//!
//! A key maps to a [`Value`]. String values carry one of three representations:
//!
//! ```text
//! ┌──────────────┬────────────┬──────────────────────────────────────────┐
//! │ variant      │ encoding   │ ownership                                │
//! ├──────────────┼────────────┼──────────────────────────────────────────┤
//! │ Int(i64)     │ integer    │ immutable scalar                         │
//! │ Raw(BytesMut)│ raw bytes  │ exclusively owned, may be written in place│
//! │ Shared(Bytes)│ raw bytes  │ possibly aliased by argument buffers or  │
//! │              │            │ replies handed out to clients            │
//! └──────────────┴────────────┴──────────────────────────────────────────┘
//! ```
//!
//! Only `Raw` may be mutated byte-by-byte. Any other representation is first
//! replaced by a fresh `Raw` copy ([`StringValue::make_exclusive`]), so a holder
//! of a `Bytes` alias never observes a write.

use crate::error::{CommandError, CommandResult};
use bigdecimal::BigDecimal;
use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;
use std::str::FromStr;

/// Largest length a string value may reach (512 MiB).
pub const MAX_STRING_LEN: u64 = 512 * 1024 * 1024;

/// Longest decimal form of an i64 ("-9223372036854775808").
const MAX_INT_DIGITS: usize = 20;

/// Decimal exponent range a float operand may have (that of an x87 long double).
const MAX_FLOAT_EXP: i64 = 4932;
const MIN_FLOAT_EXP: i64 = -4950;

/// Rejects prospective string lengths above [`MAX_STRING_LEN`].
///
/// Callers compute `len` with checked arithmetic and map an overflowing sum
/// to [`CommandError::TooLarge`] as well.
pub fn check_string_length(len: u64) -> CommandResult<()> {
    if len > MAX_STRING_LEN {
        return Err(CommandError::TooLarge);
    }
    Ok(())
}

/// A value stored under a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(StringValue),
    List(VecDeque<Bytes>),
}

impl Value {
    /// Name reported by the TYPE command.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::List(_) => "list",
        }
    }

    /// Returns the string payload, or `WrongType` for any other kind.
    pub fn as_string_mut(&mut self) -> CommandResult<&mut StringValue> {
        match self {
            Value::String(s) => Ok(s),
            _ => Err(CommandError::WrongType),
        }
    }
}

/// Physical encoding of a string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Int,
    Raw,
}

/// A string value in one of its representations.
#[derive(Debug, Clone, PartialEq)]
pub enum StringValue {
    Int(i64),
    Raw(BytesMut),
    Shared(Bytes),
}

impl StringValue {
    /// Picks the most compact representation for freshly received bytes.
    ///
    /// Canonical decimal integers become `Int`; everything else keeps the
    /// caller's buffer as a `Shared` value without copying.
    pub fn auto_encode(bytes: Bytes) -> Self {
        match parse_canonical_i64(&bytes) {
            Some(n) => StringValue::Int(n),
            None => StringValue::Shared(bytes),
        }
    }

    pub fn from_i64(n: i64) -> Self {
        StringValue::Int(n)
    }

    /// An exclusively owned raw copy of `bytes`.
    pub fn raw(bytes: &[u8]) -> Self {
        StringValue::Raw(BytesMut::from(bytes))
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            StringValue::Int(_) => Encoding::Int,
            StringValue::Raw(_) | StringValue::Shared(_) => Encoding::Raw,
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, StringValue::Shared(_))
    }

    /// True only for exclusively owned raw bytes.
    pub fn is_mutable_in_place(&self) -> bool {
        matches!(self, StringValue::Raw(_))
    }

    /// Length in bytes of the string form.
    pub fn len(&self) -> usize {
        match self {
            StringValue::Int(n) => decimal_len(*n),
            StringValue::Raw(buf) => buf.len(),
            StringValue::Shared(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decoded bytes of the value.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            StringValue::Int(n) => Bytes::from(n.to_string()),
            StringValue::Raw(buf) => Bytes::copy_from_slice(buf),
            StringValue::Shared(b) => b.clone(),
        }
    }

    /// Hands out an alias of the value for a reply.
    ///
    /// An owned buffer is frozen into `Shared` first, so the next in-place
    /// write has to copy instead of touching bytes the alias can still see.
    pub fn share(&mut self) -> Bytes {
        match self {
            StringValue::Int(n) => Bytes::from(n.to_string()),
            StringValue::Shared(b) => b.clone(),
            StringValue::Raw(buf) => {
                let frozen = std::mem::take(buf).freeze();
                *self = StringValue::Shared(frozen.clone());
                frozen
            }
        }
    }

    pub fn to_i64(&self) -> CommandResult<i64> {
        match self {
            StringValue::Int(n) => Ok(*n),
            StringValue::Raw(buf) => parse_i64(buf),
            StringValue::Shared(b) => parse_i64(b),
        }
    }

    pub fn to_float(&self) -> CommandResult<Float> {
        match self {
            StringValue::Int(n) => Ok(Float::Finite(BigDecimal::from(*n))),
            StringValue::Raw(buf) => parse_float(buf),
            StringValue::Shared(b) => parse_float(b),
        }
    }

    /// Returns the value's buffer for in-place writes.
    ///
    /// `Int` and `Shared` values are replaced by a fresh raw copy first.
    pub fn make_exclusive(&mut self) -> &mut BytesMut {
        if !self.is_mutable_in_place() {
            *self = StringValue::Raw(BytesMut::from(self.to_bytes().as_ref()));
        }
        match self {
            StringValue::Raw(buf) => buf,
            StringValue::Int(_) | StringValue::Shared(_) => {
                unreachable!("materialized value is always raw")
            }
        }
    }
}

/// Parses a signed 64-bit integer argument or stored value.
pub fn parse_i64(bytes: &[u8]) -> CommandResult<i64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(CommandError::NotAnInteger)
}

/// An exact decimal operand of INCRBYFLOAT.
#[derive(Debug, Clone, PartialEq)]
pub enum Float {
    Finite(BigDecimal),
    /// `inf` or `infinity` with either sign. It parses, but no arithmetic
    /// on it succeeds.
    Infinite,
}

impl Float {
    pub fn zero() -> Self {
        Float::Finite(BigDecimal::from(0))
    }

    /// Exact sum of two operands.
    ///
    /// Infinite operands and sums beyond the exponent range fail with
    /// `InvalidArithmetic`.
    pub fn checked_add(&self, other: &Float) -> CommandResult<BigDecimal> {
        match (self, other) {
            (Float::Finite(a), Float::Finite(b)) => {
                let sum = a + b;
                if leading_exponent(&sum).is_some_and(|exp| exp > MAX_FLOAT_EXP) {
                    return Err(CommandError::InvalidArithmetic);
                }
                Ok(sum)
            }
            _ => Err(CommandError::InvalidArithmetic),
        }
    }
}

/// Parses a decimal argument or stored value.
///
/// Accepts an optional sign, digits with at most one point and an optional
/// exponent, or an infinity. NaN, whitespace and magnitudes outside the
/// exponent range are refused.
pub fn parse_float(bytes: &[u8]) -> CommandResult<Float> {
    let text = std::str::from_utf8(bytes).map_err(|_| CommandError::NotAFloat)?;
    let unsigned = text
        .strip_prefix(|c: char| c == '+' || c == '-')
        .unwrap_or(text);
    if unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity") {
        return Ok(Float::Infinite);
    }

    let well_formed = !unsigned.is_empty()
        && unsigned
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !well_formed {
        return Err(CommandError::NotAFloat);
    }
    let value = BigDecimal::from_str(text).map_err(|_| CommandError::NotAFloat)?;

    match leading_exponent(&value) {
        None => Ok(Float::zero()),
        Some(exp) if (MIN_FLOAT_EXP..=MAX_FLOAT_EXP).contains(&exp) => Ok(Float::Finite(value)),
        Some(_) => Err(CommandError::NotAFloat),
    }
}

/// Power of ten of the most significant digit, None for zero.
fn leading_exponent(value: &BigDecimal) -> Option<i64> {
    let (digits, scale) = value.as_bigint_and_exponent();
    let digits = digits.to_string();
    let digits = digits.trim_start_matches('-');
    if digits == "0" {
        return None;
    }
    Some(digits.len() as i64 - 1 - scale)
}

/// Formats a decimal in plain notation with no trailing zeros. Zero is "0".
pub fn format_decimal(value: &BigDecimal) -> String {
    let (digits, scale) = value.normalized().as_bigint_and_exponent();
    let digits = digits.to_string();
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(magnitude) => ("-", magnitude),
        None => ("", digits.as_str()),
    };
    if digits == "0" {
        return "0".to_string();
    }

    if scale <= 0 {
        return format!("{}{}{}", sign, digits, "0".repeat(scale.unsigned_abs() as usize));
    }
    let scale = scale as usize;
    if digits.len() > scale {
        let (whole, fraction) = digits.split_at(digits.len() - scale);
        format!("{}{}.{}", sign, whole, fraction)
    } else {
        format!("{}0.{}{}", sign, "0".repeat(scale - digits.len()), digits)
    }
}

/// Accepts only the exact form `n.to_string()` would produce.
fn parse_canonical_i64(bytes: &[u8]) -> Option<i64> {
    if bytes.is_empty() || bytes.len() > MAX_INT_DIGITS {
        return None;
    }
    let n = parse_i64(bytes).ok()?;
    (n.to_string().as_bytes() == bytes).then_some(n)
}

fn decimal_len(n: i64) -> usize {
    let mut len = if n < 0 { 2 } else { 1 };
    let mut rest = n.unsigned_abs() / 10;
    while rest > 0 {
        len += 1;
        rest /= 10;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_encode_integers() {
        assert_eq!(
            StringValue::auto_encode(Bytes::from("12345")),
            StringValue::Int(12345)
        );
        assert_eq!(
            StringValue::auto_encode(Bytes::from("-9223372036854775808")),
            StringValue::Int(i64::MIN)
        );

        // Non-canonical forms stay raw so their bytes survive unchanged
        for s in ["007", "+5", " 5", "-0", "9223372036854775808", "", "1.5"] {
            let v = StringValue::auto_encode(Bytes::from(s));
            assert_eq!(v.encoding(), Encoding::Raw, "{s:?}");
            assert_eq!(v.to_bytes(), Bytes::from(s));
        }
    }

    #[test]
    fn test_len_of_integer_encoding() {
        assert_eq!(StringValue::Int(0).len(), 1);
        assert_eq!(StringValue::Int(-7).len(), 2);
        assert_eq!(StringValue::Int(1000).len(), 4);
        assert_eq!(StringValue::Int(i64::MAX).len(), 19);
        assert_eq!(StringValue::Int(i64::MIN).len(), 20);
    }

    #[test]
    fn test_make_exclusive_copies_shared() {
        let alias = Bytes::from("hello");
        let mut value = StringValue::Shared(alias.clone());
        assert!(value.is_shared());

        value.make_exclusive()[0] = b'J';

        assert!(value.is_mutable_in_place());
        assert_eq!(value.to_bytes(), Bytes::from("Jello"));
        assert_eq!(alias, Bytes::from("hello"));
    }

    #[test]
    fn test_make_exclusive_decodes_integer() {
        let mut value = StringValue::Int(42);
        value.make_exclusive().extend_from_slice(b"!");
        assert_eq!(value.encoding(), Encoding::Raw);
        assert_eq!(value.to_bytes(), Bytes::from("42!"));
    }

    #[test]
    fn test_share_freezes_owned_buffer() {
        let mut value = StringValue::raw(b"abc");
        let alias = value.share();
        assert!(value.is_shared());

        value.make_exclusive()[0] = b'x';
        assert_eq!(alias, Bytes::from("abc"));
        assert_eq!(value.to_bytes(), Bytes::from("xbc"));
    }

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(StringValue::raw(b"-12").to_i64(), Ok(-12));
        assert_eq!(
            StringValue::raw(b"12a").to_i64(),
            Err(CommandError::NotAnInteger)
        );
        assert_eq!(
            StringValue::raw(b"1.5").to_float(),
            Ok(Float::Finite(BigDecimal::from_str("1.5").unwrap()))
        );
        assert_eq!(
            StringValue::raw(b"nan").to_float(),
            Err(CommandError::NotAFloat)
        );
        assert_eq!(
            StringValue::Int(3).to_float(),
            Ok(Float::Finite(BigDecimal::from(3)))
        );
    }

    #[test]
    fn test_parse_float() {
        assert!(matches!(parse_float(b"-.5"), Ok(Float::Finite(_))));
        assert!(matches!(parse_float(b"+1e-3"), Ok(Float::Finite(_))));
        assert_eq!(parse_float(b"-0.000"), Ok(Float::zero()));
        assert_eq!(parse_float(b"-Infinity"), Ok(Float::Infinite));
        assert_eq!(parse_float(b"1e4932"), parse_float(b"10e4931"));

        for bad in ["", "-", ".", "1e", " 1", "1 ", "1_0", "0x10", "NaN", "1e5000", "1e-5000"] {
            assert_eq!(
                parse_float(bad.as_bytes()),
                Err(CommandError::NotAFloat),
                "{:?}",
                bad
            );
        }
    }

    #[test]
    fn test_decimal_addition_is_exact() {
        let sum = |a: &str, b: &str| {
            let a = parse_float(a.as_bytes()).unwrap();
            let b = parse_float(b.as_bytes()).unwrap();
            a.checked_add(&b).map(|d| format_decimal(&d))
        };
        assert_eq!(sum("0.1", "0.2"), Ok("0.3".to_string()));
        assert_eq!(sum("1.1", "2.2"), Ok("3.3".to_string()));
        assert_eq!(sum("-0.5", "0.5"), Ok("0".to_string()));
        assert_eq!(
            sum("9e4932", "9e4932"),
            Err(CommandError::InvalidArithmetic)
        );
        assert_eq!(sum("inf", "1"), Err(CommandError::InvalidArithmetic));
    }

    #[test]
    fn test_format_decimal() {
        let format = |s: &str| format_decimal(&BigDecimal::from_str(s).unwrap());
        assert_eq!(format("0.20"), "0.2");
        assert_eq!(format("5.01e3"), "5010");
        assert_eq!(format("-0.0"), "0");
        assert_eq!(format("-2.5"), "-2.5");
        assert_eq!(format("1.5e-3"), "0.0015");
        assert_eq!(format("-12.000"), "-12");
    }

    #[test]
    fn test_length_guard() {
        assert!(check_string_length(MAX_STRING_LEN).is_ok());
        assert_eq!(
            check_string_length(MAX_STRING_LEN + 1),
            Err(CommandError::TooLarge)
        );
    }
}
