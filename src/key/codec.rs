//! Key codec
//!
//! Encoding and decoding between typed keys and the store's native byte keys.
//! Byte-wise comparison of encoded keys reproduces the domain order of
//! [`Key`](super::Key).
//!
//! ## Part Format
//! ```text
//! Boolean:  ┌──────────┐
//!           │0x10/0x11 │                       (false / true)
//!           └──────────┘
//! Number:   ┌──────────┬──────────────────────┐
//!           │  0x20    │ sortable f64 (8, BE) │
//!           └──────────┴──────────────────────┘
//! String:   ┌──────────┬──────────────────────┬──────┐
//!           │  0x30    │ escaped UTF-8 bytes  │ 0x00 │
//!           └──────────┴──────────────────────┴──────┘
//! ```
//!
//! Inside a string, `0x00` is written as `0x00 0xFF`. A lone `0x00` ends the
//! string, so a shorter string sorts before any longer string it prefixes,
//! and a string part never bleeds into the part after it.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{KvError, Result};

use super::{Key, KeyPart};

/// The store's native key representation
pub type NativeKey = Bytes;

pub(crate) const TAG_FALSE: u8 = 0x10;
pub(crate) const TAG_TRUE: u8 = 0x11;
pub(crate) const TAG_NUMBER: u8 = 0x20;
pub(crate) const TAG_STRING: u8 = 0x30;

const TERMINATOR: u8 = 0x00;
const ESCAPE: u8 = 0xFF;

const SIGN_BIT: u64 = 0x8000_0000_0000_0000;

// =============================================================================
// Key Encoding/Decoding
// =============================================================================

/// Encode a key into its native byte form
pub fn encode(key: &Key) -> NativeKey {
    let mut buf = BytesMut::with_capacity(key.len() * 9);
    for part in key.parts() {
        part.encode_into(&mut buf);
    }
    buf.freeze()
}

/// Decode a native key back into a typed key
pub fn decode(bytes: &[u8]) -> Result<Key> {
    let mut parts = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let (part, consumed) = KeyPart::decode_from(&bytes[pos..])?;
        parts.push(part);
        pos += consumed;
    }

    Ok(Key::from(parts))
}

/// Exclusive upper bound of the native keys that extend `prefix` by whole parts.
///
/// Every part starts with a tag below `0xFF`. A string that only continues
/// past an escaped NUL continues with `0x00 0xFF` instead, so it sorts at or
/// after `prefix ++ 0xFF` and stays out of the range.
pub(crate) fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = Vec::with_capacity(prefix.len() + 1);
    end.extend_from_slice(prefix);
    end.push(ESCAPE);
    end
}

// =============================================================================
// Per-Part Mapping
// =============================================================================

impl KeyPart {
    /// Append this part's native encoding to `buf`
    pub(crate) fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            KeyPart::Boolean(false) => buf.put_u8(TAG_FALSE),
            KeyPart::Boolean(true) => buf.put_u8(TAG_TRUE),
            KeyPart::Number(n) => {
                buf.put_u8(TAG_NUMBER);
                buf.put_u64(encode_f64_sortable(*n));
            }
            KeyPart::String(s) => {
                buf.put_u8(TAG_STRING);
                for &byte in s.as_bytes() {
                    buf.put_u8(byte);
                    if byte == TERMINATOR {
                        buf.put_u8(ESCAPE);
                    }
                }
                buf.put_u8(TERMINATOR);
            }
        }
    }

    /// Decode one part from the front of `bytes`
    ///
    /// Returns the part and the number of bytes consumed.
    pub(crate) fn decode_from(bytes: &[u8]) -> Result<(KeyPart, usize)> {
        let tag = bytes
            .first()
            .copied()
            .ok_or_else(|| KvError::Decode("empty key part".to_string()))?;

        match tag {
            TAG_FALSE => Ok((KeyPart::Boolean(false), 1)),
            TAG_TRUE => Ok((KeyPart::Boolean(true), 1)),
            TAG_NUMBER => {
                let raw: [u8; 8] = bytes
                    .get(1..9)
                    .and_then(|b| b.try_into().ok())
                    .ok_or_else(|| {
                        KvError::Decode(format!(
                            "truncated number part: expected 8 bytes, got {}",
                            bytes.len() - 1
                        ))
                    })?;
                let n = decode_f64_sortable(u64::from_be_bytes(raw));
                Ok((KeyPart::Number(n), 9))
            }
            TAG_STRING => decode_string(&bytes[1..]).map(|(s, used)| (KeyPart::String(s), used + 1)),
            other => Err(KvError::Decode(format!(
                "unsupported key part type tag: 0x{:02x}",
                other
            ))),
        }
    }
}

/// Unescape a terminated string body, returning it and the bytes consumed
fn decode_string(bytes: &[u8]) -> Result<(String, usize)> {
    let mut raw = Vec::with_capacity(bytes.len());
    let mut pos = 0;

    while pos < bytes.len() {
        let byte = bytes[pos];
        if byte == TERMINATOR {
            if bytes.get(pos + 1) == Some(&ESCAPE) {
                raw.push(TERMINATOR);
                pos += 2;
                continue;
            }
            let s = String::from_utf8(raw)
                .map_err(|e| KvError::Decode(format!("string part is not UTF-8: {}", e)))?;
            return Ok((s, pos + 1));
        }
        raw.push(byte);
        pos += 1;
    }

    Err(KvError::Decode("unterminated string part".to_string()))
}

// =============================================================================
// Sortable f64
// =============================================================================

/// Negative floats flip every bit, positive floats flip the sign bit.
/// The big-endian result orders exactly like `f64::total_cmp`.
#[inline]
fn encode_f64_sortable(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits & SIGN_BIT != 0 {
        !bits
    } else {
        bits ^ SIGN_BIT
    }
}

#[inline]
fn decode_f64_sortable(sortable: u64) -> f64 {
    let bits = if sortable & SIGN_BIT != 0 {
        sortable ^ SIGN_BIT
    } else {
        !sortable
    };
    f64::from_bits(bits)
}
