//! Smile decoding: the incremental decoder core and the blocking readers.
//!
//! All decoding in this crate runs through one state machine, [`Decoder`]:
//! it consumes bytes from an internal buffer and yields one token per step,
//! suspending with [`Event::NeedMoreInput`] whenever the buffered bytes end
//! mid-token. A token is only ever consumed whole, so suspension never eats
//! a byte twice and never reports a completed token as partial.
//!
//! [`SmileReader`] is the blocking driver over that core: the stream entry
//! point refills the buffer from an [`io::Read`] whenever the decoder
//! suspends, and the byte-array entry points pre-feed the whole region. The
//! non-blocking reader in [`crate::nonblocking`] exposes the same core with
//! caller-controlled feeding.
//!
//! Readers are created through [`SmileFactory`](crate::SmileFactory), which
//! binds each one to a freshly derived symbol scope.

use std::io;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::features::ReadFeatures;
use crate::symbols::SymbolScope;
use crate::wire::{
    self, read_vint, zigzag_decode, HeaderFlags, Token, HEADER_MAGIC, MAX_SHARED_ENTRIES,
    MAX_SHARED_LEN, TOKEN_BIGINT, TOKEN_BINARY_7BIT, TOKEN_BINARY_RAW, TOKEN_END_ARRAY,
    TOKEN_END_OBJECT, TOKEN_END_OF_STREAM, TOKEN_FALSE, TOKEN_FIELD_NAME, TOKEN_FIELD_NAME_REF,
    TOKEN_FLOAT64, TOKEN_INT, TOKEN_NULL, TOKEN_START_ARRAY, TOKEN_START_OBJECT, TOKEN_STRING,
    TOKEN_STRING_REF, TOKEN_TRUE,
};

/// Refuse single values longer than this rather than buffering without
/// bound on a hostile length prefix.
const MAX_VALUE_LEN: usize = 1 << 28;

const STREAM_CHUNK: usize = 8 * 1024;

/// One step of incremental decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A complete token was decoded.
    Token(Token),
    /// The buffered bytes end mid-token; feed more input and step again.
    NeedMoreInput,
    /// The document is complete (end marker seen, or input ended cleanly at
    /// a token boundary with all structure closed).
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ctx {
    Array,
    Object { at_key: bool },
}

/// Incremental Smile decoder. The sole suspension point in the system.
#[derive(Debug)]
pub(crate) struct Decoder {
    buf: Vec<u8>,
    /// Next unconsumed byte within `buf`.
    pos: usize,
    /// Absolute stream offset of `buf[0]`.
    base: usize,
    header_done: bool,
    flags: HeaderFlags,
    features: ReadFeatures,
    scope: SymbolScope,
    shared_names: Vec<Arc<str>>,
    shared_strings: Vec<String>,
    depth: Vec<Ctx>,
    input_ended: bool,
    finished: bool,
}

impl Decoder {
    pub(crate) fn new(features: ReadFeatures, scope: SymbolScope) -> Self {
        Decoder {
            buf: Vec::new(),
            pos: 0,
            base: 0,
            header_done: false,
            flags: HeaderFlags::default(),
            features,
            scope,
            shared_names: Vec::new(),
            shared_strings: Vec::new(),
            depth: Vec::new(),
            input_ended: false,
            finished: false,
        }
    }

    /// Appends bytes to the internal cursor. Consumed prefix bytes are
    /// reclaimed here so the buffer does not grow with the stream.
    pub(crate) fn feed(&mut self, bytes: &[u8]) {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.base += self.pos;
            self.pos = 0;
        }
        self.buf.extend_from_slice(bytes);
    }

    /// Marks the input as complete; no further feeds will arrive.
    pub(crate) fn end_of_input(&mut self) {
        self.input_ended = true;
    }

    /// Absolute offset of the next unconsumed byte.
    pub(crate) fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Decodes at most one token from the buffered bytes.
    pub(crate) fn next_event(&mut self) -> Result<Event> {
        if self.finished {
            return Ok(Event::End);
        }
        if !self.header_done {
            match self.try_read_header()? {
                Some(()) => {}
                None => return self.suspend(),
            }
        }
        match self.try_read_token()? {
            Some(Some(token)) => Ok(Event::Token(token)),
            Some(None) => {
                self.finished = true;
                Ok(Event::End)
            }
            None => self.suspend(),
        }
    }

    /// The buffered bytes end mid-token (or before one started). With more
    /// input possibly coming this is a suspension; on ended input it is
    /// either a clean end or an error.
    fn suspend(&mut self) -> Result<Event> {
        if !self.input_ended {
            return Ok(Event::NeedMoreInput);
        }
        if self.pos == self.buf.len() {
            if let Some(ctx) = self.depth.last() {
                let expected = match ctx {
                    Ctx::Array => "array to be closed",
                    Ctx::Object { .. } => "object to be closed",
                };
                return Err(Error::unexpected_end_of_input(self.offset(), expected));
            }
            self.finished = true;
            return Ok(Event::End);
        }
        Err(Error::unexpected_end_of_input(
            self.base + self.buf.len(),
            "rest of token",
        ))
    }

    fn try_read_header(&mut self) -> Result<Option<()>> {
        let buf = &self.buf[self.pos..];
        if buf.is_empty() {
            return Ok(None);
        }
        let at = self.offset();
        if buf[0] != HEADER_MAGIC[0] {
            if self.features.require_header {
                return Err(Error::decode(
                    at,
                    "input does not start with Smile header (and header is required)",
                ));
            }
            // Headerless content: assume the default conventions.
            self.flags = HeaderFlags::default();
            self.header_done = true;
            return Ok(Some(()));
        }
        if buf.len() < 4 {
            return Ok(None);
        }
        if buf[1] != HEADER_MAGIC[1] || buf[2] != HEADER_MAGIC[2] {
            return Err(Error::decode(at, "malformed Smile header magic"));
        }
        self.flags = HeaderFlags::decode(buf[3], at + 3)?;
        self.header_done = true;
        self.pos += 4;
        Ok(Some(()))
    }

    /// Attempts to decode one token starting at `pos`. Returns
    /// `Ok(None)` when the buffer ends mid-token (nothing consumed),
    /// `Ok(Some(None))` on the end-of-stream marker, and
    /// `Ok(Some(Some(token)))` otherwise.
    #[allow(clippy::option_option)]
    fn try_read_token(&mut self) -> Result<Option<Option<Token>>> {
        let at = self.offset();
        let buf = &self.buf[self.pos..];
        if buf.is_empty() {
            return Ok(None);
        }
        let ty = buf[0];
        match ty {
            TOKEN_NULL => {
                self.begin_scalar(at)?;
                self.pos += 1;
                Ok(Some(Some(Token::Null)))
            }
            TOKEN_TRUE | TOKEN_FALSE => {
                self.begin_scalar(at)?;
                self.pos += 1;
                Ok(Some(Some(Token::Bool(ty == TOKEN_TRUE))))
            }
            TOKEN_INT => {
                let Some((raw, n)) = read_vint(&buf[1..], at + 1)? else {
                    return Ok(None);
                };
                self.begin_scalar(at)?;
                self.pos += 1 + n;
                Ok(Some(Some(Token::Int(zigzag_decode(raw)))))
            }
            TOKEN_FLOAT64 => {
                if buf.len() < 9 {
                    return Ok(None);
                }
                let mut bits = [0u8; 8];
                bits.copy_from_slice(&buf[1..9]);
                self.begin_scalar(at)?;
                self.pos += 9;
                Ok(Some(Some(Token::Float(f64::from_be_bytes(bits)))))
            }
            TOKEN_BIGINT => {
                let Some((payload, consumed)) = self.try_read_lenprefixed_binary(at)? else {
                    return Ok(None);
                };
                self.begin_scalar(at)?;
                self.pos += consumed;
                Ok(Some(Some(Token::BigInt(wire::bigint_from_bytes(&payload)))))
            }
            TOKEN_STRING => {
                let Some((text, consumed)) = try_read_string(buf, at)? else {
                    return Ok(None);
                };
                self.begin_scalar(at)?;
                self.pos += consumed;
                if self.flags.shared_string_values {
                    self.register_shared_string(&text);
                }
                Ok(Some(Some(Token::String(text))))
            }
            TOKEN_STRING_REF => {
                if !self.flags.shared_string_values {
                    return Err(Error::decode(
                        at,
                        "shared string reference, but the header did not declare shared string values",
                    ));
                }
                let Some((index, n)) = read_vint(&buf[1..], at + 1)? else {
                    return Ok(None);
                };
                let text = self
                    .shared_strings
                    .get(index as usize)
                    .cloned()
                    .ok_or_else(|| Error::decode(at, "shared string index out of range"))?;
                self.begin_scalar(at)?;
                self.pos += 1 + n;
                Ok(Some(Some(Token::String(text))))
            }
            TOKEN_FIELD_NAME => {
                let Some((text, consumed)) = try_read_string(buf, at)? else {
                    return Ok(None);
                };
                self.begin_field_name(at)?;
                self.pos += consumed;
                let sym = self.scope.intern(&text);
                if self.flags.shared_names {
                    self.register_shared_name(&sym);
                }
                Ok(Some(Some(Token::FieldName(sym))))
            }
            TOKEN_FIELD_NAME_REF => {
                if !self.flags.shared_names {
                    return Err(Error::decode(
                        at,
                        "shared name reference, but the header did not declare shared names",
                    ));
                }
                let Some((index, n)) = read_vint(&buf[1..], at + 1)? else {
                    return Ok(None);
                };
                let sym = self
                    .shared_names
                    .get(index as usize)
                    .cloned()
                    .ok_or_else(|| Error::decode(at, "shared name index out of range"))?;
                self.begin_field_name(at)?;
                self.pos += 1 + n;
                Ok(Some(Some(Token::FieldName(sym))))
            }
            TOKEN_BINARY_RAW => {
                if !self.flags.raw_binary {
                    return Err(Error::decode(
                        at,
                        "raw binary value, but the header did not declare raw binary",
                    ));
                }
                let Some((data, consumed)) = try_read_raw_binary(buf, at)? else {
                    return Ok(None);
                };
                self.begin_scalar(at)?;
                self.pos += consumed;
                Ok(Some(Some(Token::Binary(data))))
            }
            TOKEN_BINARY_7BIT => {
                let Some((data, consumed)) = try_read_7bit_binary(buf, at)? else {
                    return Ok(None);
                };
                self.begin_scalar(at)?;
                self.pos += consumed;
                Ok(Some(Some(Token::Binary(data))))
            }
            TOKEN_START_OBJECT => {
                self.begin_value(at)?;
                self.depth.push(Ctx::Object { at_key: true });
                self.pos += 1;
                Ok(Some(Some(Token::StartObject)))
            }
            TOKEN_START_ARRAY => {
                self.begin_value(at)?;
                self.depth.push(Ctx::Array);
                self.pos += 1;
                Ok(Some(Some(Token::StartArray)))
            }
            TOKEN_END_OBJECT => {
                match self.depth.last() {
                    Some(Ctx::Object { at_key: true }) => {}
                    Some(Ctx::Object { at_key: false }) => {
                        return Err(Error::decode(at, "end of object where a value was expected"));
                    }
                    _ => return Err(Error::decode(at, "end of object outside an object")),
                }
                self.depth.pop();
                self.end_value();
                self.pos += 1;
                Ok(Some(Some(Token::EndObject)))
            }
            TOKEN_END_ARRAY => {
                if self.depth.last() != Some(&Ctx::Array) {
                    return Err(Error::decode(at, "end of array outside an array"));
                }
                self.depth.pop();
                self.end_value();
                self.pos += 1;
                Ok(Some(Some(Token::EndArray)))
            }
            TOKEN_END_OF_STREAM => {
                if !self.depth.is_empty() {
                    return Err(Error::decode(at, "end marker inside an open structure"));
                }
                self.pos += 1;
                Ok(Some(None))
            }
            other => Err(Error::decode(
                at,
                &format!("unrecognized token byte 0x{other:02X}"),
            )),
        }
    }

    /// Reads a vint length followed by a payload whose mode (raw or 7-bit)
    /// follows the header's binary convention. Used for big integers.
    fn try_read_lenprefixed_binary(&self, at: usize) -> Result<Option<(Vec<u8>, usize)>> {
        let buf = &self.buf[self.pos..];
        if self.flags.raw_binary {
            try_read_raw_binary(buf, at)
        } else {
            try_read_7bit_binary(buf, at)
        }
    }

    fn register_shared_name(&mut self, sym: &Arc<str>) {
        if sym.len() <= MAX_SHARED_LEN && self.shared_names.len() < MAX_SHARED_ENTRIES {
            self.shared_names.push(Arc::clone(sym));
        }
    }

    fn register_shared_string(&mut self, text: &str) {
        if text.len() <= MAX_SHARED_LEN && self.shared_strings.len() < MAX_SHARED_ENTRIES {
            self.shared_strings.push(text.to_string());
        }
    }

    /// Structural check for a value token, without completing it.
    fn begin_value(&mut self, at: usize) -> Result<()> {
        if let Some(Ctx::Object { at_key: true }) = self.depth.last() {
            return Err(Error::decode(at, "expected field name, found value"));
        }
        Ok(())
    }

    /// Structural check plus completion for a scalar value.
    fn begin_scalar(&mut self, at: usize) -> Result<()> {
        self.begin_value(at)?;
        self.end_value();
        Ok(())
    }

    /// Marks the current object pair (if any) complete.
    fn end_value(&mut self) {
        if let Some(Ctx::Object { at_key }) = self.depth.last_mut() {
            *at_key = true;
        }
    }

    fn begin_field_name(&mut self, at: usize) -> Result<()> {
        match self.depth.last_mut() {
            Some(Ctx::Object { at_key }) => {
                if !*at_key {
                    return Err(Error::decode(at, "field name where a value was expected"));
                }
                *at_key = false;
                Ok(())
            }
            _ => Err(Error::decode(at, "field name outside an object")),
        }
    }
}

/// Length-prefixed UTF-8 starting at a type byte. Returns the text and the
/// total consumed length including the type byte, or `None` mid-token.
fn try_read_string(buf: &[u8], at: usize) -> Result<Option<(String, usize)>> {
    let Some((len, n)) = read_vint(&buf[1..], at + 1)? else {
        return Ok(None);
    };
    let len = checked_len(len, at)?;
    let total = 1 + n + len;
    if buf.len() < total {
        return Ok(None);
    }
    let text = std::str::from_utf8(&buf[1 + n..total])
        .map_err(|e| Error::decode(at + 1 + n, &format!("invalid UTF-8: {e}")))?
        .to_string();
    Ok(Some((text, total)))
}

fn try_read_raw_binary(buf: &[u8], at: usize) -> Result<Option<(Vec<u8>, usize)>> {
    let Some((len, n)) = read_vint(&buf[1..], at + 1)? else {
        return Ok(None);
    };
    let len = checked_len(len, at)?;
    let total = 1 + n + len;
    if buf.len() < total {
        return Ok(None);
    }
    Ok(Some((buf[1 + n..total].to_vec(), total)))
}

fn try_read_7bit_binary(buf: &[u8], at: usize) -> Result<Option<(Vec<u8>, usize)>> {
    let Some((len, n)) = read_vint(&buf[1..], at + 1)? else {
        return Ok(None);
    };
    let decoded_len = checked_len(len, at)?;
    let encoded_len = wire::encoded_7bit_len(decoded_len);
    let total = 1 + n + encoded_len;
    if buf.len() < total {
        return Ok(None);
    }
    let data = wire::decode_7bit(&buf[1 + n..total], decoded_len, at + 1 + n)?;
    Ok(Some((data, total)))
}

fn checked_len(len: u64, at: usize) -> Result<usize> {
    if len > MAX_VALUE_LEN as u64 {
        return Err(Error::decode(at, "length prefix exceeds the value size limit"));
    }
    Ok(len as usize)
}

/// Blocking Smile token reader over a byte stream or a byte-array region.
///
/// Created through the factory entry points; owns the decoder core and a
/// per-session symbol scope. Not for concurrent use: each reader belongs to
/// one in-progress operation, driven sequentially by a single caller. Any
/// blocking behavior comes from the supplied [`io::Read`], never from the
/// reader itself.
///
/// ## Examples
///
/// ```rust
/// use serde_smile_factory::{SmileFactory, Token};
///
/// let factory = SmileFactory::new();
/// let mut writer = factory.writer(Vec::new()).unwrap();
/// writer.write_i64(7).unwrap();
/// let bytes = writer.finish().unwrap();
///
/// let mut reader = factory.reader_from_slice(&bytes).unwrap();
/// assert_eq!(reader.next_token().unwrap(), Some(Token::Int(7)));
/// assert_eq!(reader.next_token().unwrap(), None);
/// ```
#[derive(Debug)]
pub struct SmileReader<R: io::Read> {
    source: Option<R>,
    decoder: Decoder,
}

impl<R: io::Read> SmileReader<R> {
    pub(crate) fn from_stream(source: R, features: ReadFeatures, scope: SymbolScope) -> Self {
        SmileReader {
            source: Some(source),
            decoder: Decoder::new(features, scope),
        }
    }

    /// Returns the next decoded token, or `None` at the end of the
    /// document. Refills from the stream whenever the decoder suspends.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            match self.decoder.next_event()? {
                Event::Token(token) => return Ok(Some(token)),
                Event::End => return Ok(None),
                Event::NeedMoreInput => self.refill()?,
            }
        }
    }

    /// Absolute byte offset of the next unconsumed input byte.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.decoder.offset()
    }

    fn refill(&mut self) -> Result<()> {
        let Some(source) = self.source.as_mut() else {
            // Pre-fed region readers have no stream; the decoder already
            // saw end_of_input, so suspension cannot reach here.
            self.decoder.end_of_input();
            return Ok(());
        };
        let mut chunk = [0u8; STREAM_CHUNK];
        let n = source.read(&mut chunk)?;
        if n == 0 {
            self.decoder.end_of_input();
        } else {
            self.decoder.feed(&chunk[..n]);
        }
        Ok(())
    }
}

/// Region reader: the whole input is known up front.
impl SmileReader<io::Empty> {
    pub(crate) fn from_region(data: &[u8], features: ReadFeatures, scope: SymbolScope) -> Self {
        let mut decoder = Decoder::new(features, scope);
        decoder.feed(data);
        decoder.end_of_input();
        SmileReader {
            source: None,
            decoder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTable;

    fn decoder() -> Decoder {
        let root = SymbolTable::new();
        Decoder::new(ReadFeatures::default(), root.make_child(true))
    }

    #[test]
    fn empty_input_ends_cleanly() {
        let mut d = decoder();
        assert_eq!(d.next_event().unwrap(), Event::NeedMoreInput);
        d.end_of_input();
        assert_eq!(d.next_event().unwrap(), Event::End);
        // Terminal state is sticky.
        assert_eq!(d.next_event().unwrap(), Event::End);
    }

    #[test]
    fn missing_required_header_is_rejected() {
        let mut d = decoder();
        d.feed(&[TOKEN_NULL]);
        assert!(matches!(d.next_event(), Err(Error::Decode { offset: 0, .. })));
    }

    #[test]
    fn headerless_input_is_accepted_when_not_required() {
        let root = SymbolTable::new();
        let features = ReadFeatures::default().with_require_header(false);
        let mut d = Decoder::new(features, root.make_child(true));
        d.feed(&[TOKEN_TRUE]);
        d.end_of_input();
        assert_eq!(d.next_event().unwrap(), Event::Token(Token::Bool(true)));
        assert_eq!(d.next_event().unwrap(), Event::End);
    }

    #[test]
    fn suspends_mid_header_and_resumes() {
        let mut d = decoder();
        let header = HeaderFlags::default().encode();
        d.feed(&header[..2]);
        assert_eq!(d.next_event().unwrap(), Event::NeedMoreInput);
        d.feed(&header[2..]);
        d.feed(&[TOKEN_NULL]);
        assert_eq!(d.next_event().unwrap(), Event::Token(Token::Null));
    }

    #[test]
    fn truncated_input_inside_structure_is_an_error() {
        let mut d = decoder();
        d.feed(&HeaderFlags::default().encode());
        d.feed(&[TOKEN_START_OBJECT]);
        assert_eq!(d.next_event().unwrap(), Event::Token(Token::StartObject));
        d.end_of_input();
        assert!(matches!(
            d.next_event(),
            Err(Error::UnexpectedEndOfInput { .. })
        ));
    }

    #[test]
    fn value_in_key_position_is_rejected() {
        let mut d = decoder();
        d.feed(&HeaderFlags::default().encode());
        d.feed(&[TOKEN_START_OBJECT, TOKEN_NULL]);
        assert_eq!(d.next_event().unwrap(), Event::Token(Token::StartObject));
        assert!(matches!(d.next_event(), Err(Error::Decode { .. })));
    }

    #[test]
    fn field_name_at_root_is_rejected() {
        let mut d = decoder();
        d.feed(&HeaderFlags::default().encode());
        d.feed(&[TOKEN_FIELD_NAME, 1, b'x']);
        assert!(matches!(d.next_event(), Err(Error::Decode { .. })));
    }
}
