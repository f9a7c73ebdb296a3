//! Binary encoding for a single primitive leaf.
//!
//! The wire format follows MessagePack's grammar (spec §4.2): single-byte
//! nil/true/false, fixint/int/float numbers, fixstr/str8/str16/str32
//! strings. Writers always emit float64 for numbers; readers accept any of
//! the integer or float encodings so leaves written by other MessagePack
//! producers still decode. This module only ever sees primitives — the
//! engine, not the codec, is responsible for decomposing arrays and objects
//! into per-leaf entries.

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::value::Value;

const NIL: u8 = 0xc0;
const FALSE: u8 = 0xc2;
const TRUE: u8 = 0xc3;
const FLOAT32: u8 = 0xca;
const FLOAT64: u8 = 0xcb;
const UINT8: u8 = 0xcc;
const UINT16: u8 = 0xcd;
const UINT32: u8 = 0xce;
const UINT64: u8 = 0xcf;
const INT8: u8 = 0xd0;
const INT16: u8 = 0xd1;
const INT32: u8 = 0xd2;
const INT64: u8 = 0xd3;
const STR8: u8 = 0xd9;
const STR16: u8 = 0xda;
const STR32: u8 = 0xdb;
const FIXSTR_MASK: u8 = 0xa0;
const FIXSTR_MAX: u8 = 0xbf;
const POSFIXINT_MAX: u8 = 0x7f;
const NEGFIXINT_MIN: u8 = 0xe0;

/// Why a leaf's bytes could not be encoded or decoded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// The leading byte does not name any MessagePack primitive format this
    /// codec understands (or names a compound format: arrays and maps are
    /// the engine's concern, not the codec's).
    #[error("unsupported format byte 0x{0:02x}")]
    UnsupportedFormat(u8),
    /// The buffer ended before a complete value could be read.
    #[error("unexpected end of input")]
    UnexpectedEnd,
    /// A string was not valid UTF-8.
    #[error("invalid utf-8 in string payload")]
    InvalidUtf8,
}

impl From<std::io::Error> for CodecError {
    fn from(_: std::io::Error) -> Self {
        CodecError::UnexpectedEnd
    }
}

/// Encode a primitive [`Value`] (null, bool, number, or string) to its
/// MessagePack byte representation.
///
/// # Panics
///
/// Panics if given a compound `Value::Array`/`Value::Object`; the engine
/// never calls this on compound values (it decomposes them first).
#[must_use]
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    match value {
        Value::Null => out.push(NIL),
        Value::Boolean(false) => out.push(FALSE),
        Value::Boolean(true) => out.push(TRUE),
        Value::Number(n) => {
            out.push(FLOAT64);
            out.write_f64::<BigEndian>(*n).expect("writing to Vec cannot fail");
        }
        Value::String(s) => encode_str(s, &mut out),
        Value::Array(_) | Value::Object(_) => {
            panic!("codec::encode only accepts primitive leaves; the engine decomposes compounds")
        }
    }
    out
}

fn encode_str(s: &str, out: &mut Vec<u8>) {
    let bytes = s.as_bytes();
    let len = bytes.len();
    if len <= 31 {
        out.push(FIXSTR_MASK | len as u8);
    } else if len <= u8::MAX as usize {
        out.push(STR8);
        out.push(len as u8);
    } else if len <= u16::MAX as usize {
        out.push(STR16);
        out.write_u16::<BigEndian>(len as u16).expect("writing to Vec cannot fail");
    } else {
        out.push(STR32);
        out.write_u32::<BigEndian>(len as u32).expect("writing to Vec cannot fail");
    }
    out.extend_from_slice(bytes);
}

/// Decode a single primitive [`Value`] from its MessagePack byte
/// representation.
///
/// # Errors
///
/// Returns [`CodecError::UnsupportedFormat`] on a leading byte this codec
/// doesn't recognize as a primitive, [`CodecError::UnexpectedEnd`] on
/// truncated input, or [`CodecError::InvalidUtf8`] on a non-UTF-8 string
/// payload.
pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    let mut cur = Cursor::new(bytes);
    let v = decode_from(&mut cur)?;
    Ok(v)
}

fn decode_from(cur: &mut Cursor<&[u8]>) -> Result<Value, CodecError> {
    let tag = cur.read_u8()?;
    match tag {
        NIL => Ok(Value::Null),
        FALSE => Ok(Value::Boolean(false)),
        TRUE => Ok(Value::Boolean(true)),
        0x00..=POSFIXINT_MAX => Ok(Value::Number(f64::from(tag))),
        NEGFIXINT_MIN..=0xff => Ok(Value::Number(f64::from(tag as i8))),
        UINT8 => Ok(Value::Number(f64::from(cur.read_u8()?))),
        UINT16 => Ok(Value::Number(f64::from(cur.read_u16::<BigEndian>()?))),
        UINT32 => Ok(Value::Number(f64::from(cur.read_u32::<BigEndian>()?))),
        UINT64 => Ok(Value::Number(cur.read_u64::<BigEndian>()? as f64)),
        INT8 => Ok(Value::Number(f64::from(cur.read_i8()?))),
        INT16 => Ok(Value::Number(f64::from(cur.read_i16::<BigEndian>()?))),
        INT32 => Ok(Value::Number(f64::from(cur.read_i32::<BigEndian>()?))),
        INT64 => Ok(Value::Number(cur.read_i64::<BigEndian>()? as f64)),
        FLOAT32 => Ok(Value::Number(f64::from(cur.read_f32::<BigEndian>()?))),
        FLOAT64 => Ok(Value::Number(cur.read_f64::<BigEndian>()?)),
        STR8 => {
            let len = cur.read_u8()? as usize;
            decode_str(cur, len)
        }
        STR16 => {
            let len = cur.read_u16::<BigEndian>()? as usize;
            decode_str(cur, len)
        }
        STR32 => {
            let len = cur.read_u32::<BigEndian>()? as usize;
            decode_str(cur, len)
        }
        tag if (FIXSTR_MASK..=FIXSTR_MAX).contains(&tag) => {
            let len = (tag & 0x1f) as usize;
            decode_str(cur, len)
        }
        other => Err(CodecError::UnsupportedFormat(other)),
    }
}

fn decode_str(cur: &mut Cursor<&[u8]>, len: usize) -> Result<Value, CodecError> {
    let mut buf = vec![0u8; len];
    cur.read_exact(&mut buf).map_err(|_| CodecError::UnexpectedEnd)?;
    String::from_utf8(buf)
        .map(Value::String)
        .map_err(|_| CodecError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Value::Null)]
    #[case(Value::Boolean(true))]
    #[case(Value::Boolean(false))]
    #[case(Value::Number(0.0))]
    #[case(Value::Number(-42.0))]
    #[case(Value::Number(3.5))]
    #[case(Value::Number(9_007_199_254_740_992.0))]
    #[case(Value::String(String::new()))]
    #[case(Value::String("hello".into()))]
    fn round_trips_primitives(#[case] v: Value) {
        let bytes = encode(&v);
        assert_eq!(decode(&bytes).unwrap(), v);
    }

    #[test]
    fn long_string_uses_str16() {
        let s = "x".repeat(1000);
        let bytes = encode(&Value::String(s.clone()));
        assert_eq!(bytes[0], STR16);
        assert_eq!(decode(&bytes).unwrap(), Value::String(s));
    }

    #[test]
    fn unsupported_leading_byte_is_reported() {
        // 0x90 is a fixarray tag: a compound, not a primitive this codec decodes.
        assert_eq!(decode(&[0x90]), Err(CodecError::UnsupportedFormat(0x90)));
    }

    #[test]
    fn truncated_string_is_unexpected_end() {
        // STR8 claims 5 bytes but supplies none.
        assert_eq!(decode(&[STR8, 5]), Err(CodecError::UnexpectedEnd));
    }

    #[test]
    fn empty_input_is_unexpected_end() {
        assert_eq!(decode(&[]), Err(CodecError::UnexpectedEnd));
    }

    #[quickcheck]
    fn string_round_trip(s: String) -> bool {
        decode(&encode(&Value::String(s.clone()))) == Ok(Value::String(s))
    }

    #[quickcheck]
    fn number_round_trip(n: f64) -> bool {
        if n.is_nan() {
            return true;
        }
        decode(&encode(&Value::Number(n))) == Ok(Value::Number(n))
    }
}
