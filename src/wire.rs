//! Wire-level conventions of the Smile byte format.
//!
//! This module holds the pieces shared by the writer and the decoder: the
//! header magic and its flags byte, token type bytes, variable-length
//! integer coding, and the 7-bit-safe binary packing. The decoding state
//! machine itself lives in [`crate::read`]; the emit side in
//! [`crate::write`].
//!
//! A document is the 4-byte header (when written), followed by a token
//! stream, optionally terminated by the `0xFF` end marker. The flags byte
//! of the header declares which shared-reference and binary conventions
//! the content uses, which is why a writer configured without a header must
//! stay on the conventions a reader can assume unconditionally.

use std::sync::Arc;

use num_bigint::BigInt;

use crate::error::{Error, Result};

/// Leading magic bytes of a Smile document: `:)` and a linefeed.
pub const HEADER_MAGIC: [u8; 3] = [0x3A, 0x29, 0x0A];

/// Format version carried in the high nibble of the header flags byte.
pub const FORMAT_VERSION: u8 = 0;

// Flags-byte bits (low nibble).
pub(crate) const FLAG_SHARED_NAMES: u8 = 0x01;
pub(crate) const FLAG_SHARED_STRING_VALUES: u8 = 0x02;
pub(crate) const FLAG_RAW_BINARY: u8 = 0x04;

// Token type bytes.
pub(crate) const TOKEN_NULL: u8 = 0x21;
pub(crate) const TOKEN_FALSE: u8 = 0x22;
pub(crate) const TOKEN_TRUE: u8 = 0x23;
pub(crate) const TOKEN_INT: u8 = 0x24;
pub(crate) const TOKEN_BIGINT: u8 = 0x26;
pub(crate) const TOKEN_FLOAT64: u8 = 0x28;
pub(crate) const TOKEN_FIELD_NAME: u8 = 0x34;
pub(crate) const TOKEN_FIELD_NAME_REF: u8 = 0x35;
pub(crate) const TOKEN_STRING: u8 = 0x40;
pub(crate) const TOKEN_STRING_REF: u8 = 0x41;
pub(crate) const TOKEN_BINARY_RAW: u8 = 0xE0;
pub(crate) const TOKEN_BINARY_7BIT: u8 = 0xE8;
pub(crate) const TOKEN_START_ARRAY: u8 = 0xF8;
pub(crate) const TOKEN_END_ARRAY: u8 = 0xF9;
pub(crate) const TOKEN_START_OBJECT: u8 = 0xFA;
pub(crate) const TOKEN_END_OBJECT: u8 = 0xFB;
pub(crate) const TOKEN_END_OF_STREAM: u8 = 0xFF;

/// Back-reference tables hold at most this many entries; once full, new
/// candidates are simply no longer added (writer and reader apply the same
/// rule so indices stay aligned).
pub(crate) const MAX_SHARED_ENTRIES: usize = 1024;

/// Only values this short are eligible for shared back-references.
pub(crate) const MAX_SHARED_LEN: usize = 64;

/// One decoded token of a Smile stream.
///
/// Field names carry the canonical interned reference produced by the
/// session's symbol scope, so repeated names compare by pointer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    FieldName(Arc<str>),
    Null,
    Bool(bool),
    Int(i64),
    BigInt(BigInt),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
}

/// Encoding conventions declared by a document header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderFlags {
    pub shared_names: bool,
    pub shared_string_values: bool,
    pub raw_binary: bool,
}

impl Default for HeaderFlags {
    /// Conventions a reader may assume when no header is present: shared
    /// names but no shared values, 7-bit binary only.
    fn default() -> Self {
        HeaderFlags {
            shared_names: true,
            shared_string_values: false,
            raw_binary: false,
        }
    }
}

impl HeaderFlags {
    /// Builds the 4-byte header for these conventions.
    pub(crate) fn encode(&self) -> [u8; 4] {
        let mut flags = FORMAT_VERSION << 4;
        if self.shared_names {
            flags |= FLAG_SHARED_NAMES;
        }
        if self.shared_string_values {
            flags |= FLAG_SHARED_STRING_VALUES;
        }
        if self.raw_binary {
            flags |= FLAG_RAW_BINARY;
        }
        [HEADER_MAGIC[0], HEADER_MAGIC[1], HEADER_MAGIC[2], flags]
    }

    /// Decodes the flags byte of a header, validating the format version.
    pub(crate) fn decode(flags: u8, at: usize) -> Result<Self> {
        let version = flags >> 4;
        if version != FORMAT_VERSION {
            return Err(Error::decode(
                at,
                &format!("unsupported format version {version}"),
            ));
        }
        Ok(HeaderFlags {
            shared_names: flags & FLAG_SHARED_NAMES != 0,
            shared_string_values: flags & FLAG_SHARED_STRING_VALUES != 0,
            raw_binary: flags & FLAG_RAW_BINARY != 0,
        })
    }
}

/// Appends an unsigned variable-length integer (7 bits per byte, high bit
/// set on continuation bytes).
pub(crate) fn write_vint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Reads a variable-length integer from the front of `buf`.
///
/// Returns `Ok(None)` when the buffer ends mid-integer (the caller suspends
/// and retries once more bytes arrive); `Ok(Some((value, consumed)))` on a
/// complete read. `at` is the absolute offset of `buf[0]`, used for error
/// reporting on overlong encodings.
pub(crate) fn read_vint(buf: &[u8], at: usize) -> Result<Option<(u64, usize)>> {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if i >= 10 {
            return Err(Error::decode(at, "overlong variable-length integer"));
        }
        value |= u64::from(byte & 0x7F) << (i * 7);
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }
    if buf.len() >= 10 {
        return Err(Error::decode(at, "overlong variable-length integer"));
    }
    Ok(None)
}

pub(crate) fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub(crate) fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Packs bytes into 7-bit-safe groups: every 7 input bytes become 8 output
/// bytes with the high bit clear, a trailing group of `k` bytes becomes
/// `k + 1` output bytes.
pub(crate) fn encode_7bit(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_7bit_len(data.len()));
    for chunk in data.chunks(7) {
        let mut acc: u64 = 0;
        for &b in chunk {
            acc = (acc << 8) | u64::from(b);
        }
        let in_bits = chunk.len() * 8;
        let out_bytes = (in_bits + 6) / 7;
        acc <<= out_bytes * 7 - in_bits;
        for i in (0..out_bytes).rev() {
            out.push(((acc >> (i * 7)) & 0x7F) as u8);
        }
    }
    out
}

/// Number of encoded bytes a 7-bit packing of `decoded_len` bytes occupies.
pub(crate) fn encoded_7bit_len(decoded_len: usize) -> usize {
    (decoded_len / 7) * 8 + (decoded_len % 7 * 8 + 6) / 7
}

/// Reverses [`encode_7bit`]. `encoded` must be exactly
/// `encoded_7bit_len(decoded_len)` bytes; `at` is the absolute offset of
/// `encoded[0]` for error reporting.
pub(crate) fn decode_7bit(encoded: &[u8], decoded_len: usize, at: usize) -> Result<Vec<u8>> {
    if encoded.len() != encoded_7bit_len(decoded_len) {
        return Err(Error::decode(at, "7-bit payload length mismatch"));
    }
    let mut out = Vec::with_capacity(decoded_len);
    for (chunk_idx, chunk) in encoded.chunks(8).enumerate() {
        let mut acc: u64 = 0;
        for (i, &b) in chunk.iter().enumerate() {
            if b & 0x80 != 0 {
                return Err(Error::decode(
                    at + chunk_idx * 8 + i,
                    "high bit set inside 7-bit payload",
                ));
            }
            acc = (acc << 7) | u64::from(b);
        }
        let out_bytes = chunk.len() * 7 / 8;
        acc >>= chunk.len() * 7 - out_bytes * 8;
        for i in (0..out_bytes).rev() {
            out.push(((acc >> (i * 8)) & 0xFF) as u8);
        }
    }
    Ok(out)
}

/// Serializes a big integer to its two's-complement big-endian byte form.
pub(crate) fn bigint_to_bytes(value: &BigInt) -> Vec<u8> {
    value.to_signed_bytes_be()
}

/// Reconstructs a big integer from its two's-complement big-endian bytes.
pub(crate) fn bigint_from_bytes(bytes: &[u8]) -> BigInt {
    BigInt::from_signed_bytes_be(bytes)
}
