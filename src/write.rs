//! Smile encoding: the token writer and its construction guard.
//!
//! A [`SmileWriter`] is created through
//! [`SmileFactory::writer`](crate::SmileFactory::writer), which validates
//! the resolved write features *before* constructing it. The format header
//! declares which encoding conventions the content uses, so two settings
//! are only decodable in its presence; with header writing disabled the
//! guard rejects, in order:
//!
//! 1. shared-string-value checking enabled (back-references would be
//!    undecodable), then
//! 2. 7-bit binary encoding disabled (raw binary framing would be
//!    ambiguous).
//!
//! Rejection returns
//! [`Error::ConfigurationConflict`](crate::Error::ConfigurationConflict)
//! naming the conflicting pair and both remediations; no writer exists and
//! no byte reaches the sink. On success with header writing enabled, the
//! header is emitted immediately.
//!
//! ## Examples
//!
//! ```rust
//! use serde_smile_factory::SmileFactory;
//!
//! let factory = SmileFactory::new();
//! let mut writer = factory.writer(Vec::new()).unwrap();
//! writer.start_object().unwrap();
//! writer.write_field_name("id").unwrap();
//! writer.write_i64(42).unwrap();
//! writer.end_object().unwrap();
//! let bytes = writer.finish().unwrap();
//! assert_eq!(&bytes[..3], b":)\n");
//! ```

use std::collections::HashMap;
use std::io;

use num_bigint::BigInt;

use crate::error::{Error, Result};
use crate::features::WriteFeatures;
use crate::wire::{
    self, write_vint, zigzag_encode, HeaderFlags, MAX_SHARED_ENTRIES, MAX_SHARED_LEN,
    TOKEN_BIGINT, TOKEN_BINARY_7BIT, TOKEN_BINARY_RAW, TOKEN_END_ARRAY, TOKEN_END_OBJECT,
    TOKEN_END_OF_STREAM, TOKEN_FALSE, TOKEN_FIELD_NAME, TOKEN_FIELD_NAME_REF, TOKEN_FLOAT64,
    TOKEN_INT, TOKEN_NULL, TOKEN_START_ARRAY, TOKEN_START_OBJECT, TOKEN_STRING, TOKEN_STRING_REF,
    TOKEN_TRUE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ctx {
    Array,
    Object { at_key: bool },
}

/// Token-level Smile writer over an [`io::Write`] sink.
///
/// Single-owner, sequential: one writer belongs to one in-progress
/// operation. Structural misuse (a value in key position, unbalanced ends)
/// is rejected before anything reaches the sink.
#[derive(Debug)]
pub struct SmileWriter<W: io::Write> {
    sink: W,
    features: WriteFeatures,
    shared_names: HashMap<String, usize>,
    shared_strings: HashMap<String, usize>,
    depth: Vec<Ctx>,
}

impl<W: io::Write> SmileWriter<W> {
    /// Construction guard (see the module docs). Validates `features`
    /// first; only a consistent configuration produces a writer, and only
    /// then is the header (if enabled) emitted.
    pub(crate) fn construct(sink: W, features: WriteFeatures) -> Result<Self> {
        if !features.write_header {
            if features.check_shared_string_values {
                return Err(Error::configuration_conflict(
                    "WRITE_HEADER disabled",
                    "CHECK_SHARED_STRING_VALUES enabled",
                    "either enable WRITE_HEADER, or disable CHECK_SHARED_STRING_VALUES",
                ));
            }
            if !features.encode_binary_as_7bit {
                return Err(Error::configuration_conflict(
                    "WRITE_HEADER disabled",
                    "ENCODE_BINARY_AS_7BIT disabled",
                    "either enable WRITE_HEADER, or enable ENCODE_BINARY_AS_7BIT",
                ));
            }
        }
        let mut writer = SmileWriter {
            sink,
            features,
            shared_names: HashMap::new(),
            shared_strings: HashMap::new(),
            depth: Vec::new(),
        };
        if features.write_header {
            let flags = HeaderFlags {
                shared_names: features.check_shared_names,
                shared_string_values: features.check_shared_string_values,
                raw_binary: !features.encode_binary_as_7bit,
            };
            writer.emit(&flags.encode())?;
        }
        Ok(writer)
    }

    pub fn start_object(&mut self) -> Result<()> {
        self.begin_value()?;
        self.depth.push(Ctx::Object { at_key: true });
        self.emit(&[TOKEN_START_OBJECT])
    }

    pub fn end_object(&mut self) -> Result<()> {
        match self.depth.last() {
            Some(Ctx::Object { at_key: true }) => {}
            Some(Ctx::Object { at_key: false }) => {
                return Err(Error::custom("cannot end object: a value is pending"));
            }
            _ => return Err(Error::custom("cannot end object: not inside an object")),
        }
        self.depth.pop();
        self.end_value();
        self.emit(&[TOKEN_END_OBJECT])
    }

    pub fn start_array(&mut self) -> Result<()> {
        self.begin_value()?;
        self.depth.push(Ctx::Array);
        self.emit(&[TOKEN_START_ARRAY])
    }

    pub fn end_array(&mut self) -> Result<()> {
        if self.depth.last() != Some(&Ctx::Array) {
            return Err(Error::custom("cannot end array: not inside an array"));
        }
        self.depth.pop();
        self.end_value();
        self.emit(&[TOKEN_END_ARRAY])
    }

    /// Writes a field name, as a back-reference when shared-name checking
    /// is enabled and the name was written before.
    pub fn write_field_name(&mut self, name: &str) -> Result<()> {
        self.begin_field_name()?;
        if self.features.check_shared_names {
            if let Some(&index) = self.shared_names.get(name) {
                let mut out = vec![TOKEN_FIELD_NAME_REF];
                write_vint(&mut out, index as u64);
                return self.emit(&out);
            }
        }
        let mut out = vec![TOKEN_FIELD_NAME];
        write_vint(&mut out, name.len() as u64);
        out.extend_from_slice(name.as_bytes());
        // Mirror the reader's table rule exactly so indices stay aligned.
        if self.features.check_shared_names
            && name.len() <= MAX_SHARED_LEN
            && self.shared_names.len() < MAX_SHARED_ENTRIES
        {
            let index = self.shared_names.len();
            self.shared_names.insert(name.to_string(), index);
        }
        self.emit(&out)
    }

    pub fn write_null(&mut self) -> Result<()> {
        self.begin_scalar()?;
        self.emit(&[TOKEN_NULL])
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.begin_scalar()?;
        self.emit(&[if value { TOKEN_TRUE } else { TOKEN_FALSE }])
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.begin_scalar()?;
        let mut out = vec![TOKEN_INT];
        write_vint(&mut out, zigzag_encode(value));
        self.emit(&out)
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.begin_scalar()?;
        let mut out = vec![TOKEN_FLOAT64];
        out.extend_from_slice(&value.to_be_bytes());
        self.emit(&out)
    }

    /// Writes an arbitrary-precision integer. The magnitude bytes follow
    /// the configured binary convention (7-bit-safe or raw).
    pub fn write_bigint(&mut self, value: &BigInt) -> Result<()> {
        self.begin_scalar()?;
        let bytes = wire::bigint_to_bytes(value);
        let mut out = vec![TOKEN_BIGINT];
        self.append_binary_payload(&mut out, &bytes);
        self.emit(&out)
    }

    /// Writes a string value, as a back-reference when shared-string-value
    /// checking is enabled and an equal short string was written before.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.begin_scalar()?;
        let shareable = self.features.check_shared_string_values && value.len() <= MAX_SHARED_LEN;
        if shareable {
            if let Some(&index) = self.shared_strings.get(value) {
                let mut out = vec![TOKEN_STRING_REF];
                write_vint(&mut out, index as u64);
                return self.emit(&out);
            }
        }
        let mut out = vec![TOKEN_STRING];
        write_vint(&mut out, value.len() as u64);
        out.extend_from_slice(value.as_bytes());
        if shareable && self.shared_strings.len() < MAX_SHARED_ENTRIES {
            let index = self.shared_strings.len();
            self.shared_strings.insert(value.to_string(), index);
        }
        self.emit(&out)
    }

    pub fn write_binary(&mut self, data: &[u8]) -> Result<()> {
        self.begin_scalar()?;
        let mut out = vec![if self.features.encode_binary_as_7bit {
            TOKEN_BINARY_7BIT
        } else {
            TOKEN_BINARY_RAW
        }];
        self.append_binary_payload(&mut out, data);
        self.emit(&out)
    }

    /// Flushes buffered bytes through to the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }

    /// Ends the document: writes the end marker when configured, flushes,
    /// and returns the sink. Fails if a structure is still open.
    pub fn finish(mut self) -> Result<W> {
        if !self.depth.is_empty() {
            return Err(Error::custom("cannot finish: a structure is still open"));
        }
        if self.features.write_end_marker {
            self.emit(&[TOKEN_END_OF_STREAM])?;
        }
        self.sink.flush()?;
        Ok(self.sink)
    }

    /// The resolved features this writer was constructed with.
    #[must_use]
    pub fn features(&self) -> &WriteFeatures {
        &self.features
    }

    fn append_binary_payload(&self, out: &mut Vec<u8>, data: &[u8]) {
        write_vint(out, data.len() as u64);
        if self.features.encode_binary_as_7bit {
            out.extend_from_slice(&wire::encode_7bit(data));
        } else {
            out.extend_from_slice(data);
        }
    }

    fn begin_value(&mut self) -> Result<()> {
        if let Some(Ctx::Object { at_key: true }) = self.depth.last() {
            return Err(Error::custom("expected a field name, not a value"));
        }
        Ok(())
    }

    fn begin_scalar(&mut self) -> Result<()> {
        self.begin_value()?;
        self.end_value();
        Ok(())
    }

    fn end_value(&mut self) {
        if let Some(Ctx::Object { at_key }) = self.depth.last_mut() {
            *at_key = true;
        }
    }

    fn begin_field_name(&mut self) -> Result<()> {
        match self.depth.last_mut() {
            Some(Ctx::Object { at_key }) => {
                if !*at_key {
                    return Err(Error::custom("a field name was already written"));
                }
                *at_key = false;
                Ok(())
            }
            _ => Err(Error::custom("field names are only valid inside objects")),
        }
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.write_all(bytes)?;
        Ok(())
    }
}
