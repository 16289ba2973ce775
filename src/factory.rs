//! The factory: composition root for Smile readers and writers.
//!
//! A [`SmileFactory`] holds an immutable pair of feature defaults and the
//! shared field-name symbol root. Creating one is cheap, but reusing a
//! single instance is what makes decoding fast: every reader it constructs
//! derives a child scope from the root, so field names learned by one
//! session accelerate the next.
//!
//! One factory is designed for concurrent reuse by many simultaneous read
//! and write operations; the symbol root is the only shared mutable state
//! and is safe without external locking. The readers and writers it hands
//! out are single-owner.
//!
//! Reader construction is keyed by source kind — byte stream, byte-array
//! region, or sourceless non-blocking — a closed set, since this factory
//! supports exactly one binary format. Character-oriented sources have no
//! byte-addressable representation of Smile content and are rejected with
//! [`Error::UnsupportedSource`](crate::Error::UnsupportedSource); any
//! text-format fallback is the caller's concern.
//!
//! ## Examples
//!
//! ```rust
//! use serde_smile_factory::{SmileFactory, Token};
//!
//! let factory = SmileFactory::builder()
//!     .write_features(Default::default())
//!     .build();
//!
//! let mut writer = factory.writer(Vec::new()).unwrap();
//! writer.write_bool(true).unwrap();
//! let bytes = writer.finish().unwrap();
//!
//! let mut reader = factory.reader_from_slice(&bytes).unwrap();
//! assert_eq!(reader.next_token().unwrap(), Some(Token::Bool(true)));
//! ```

use std::io;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::{ReadFeatures, ReadOverrides, WriteFeatures, WriteOverrides};
use crate::matcher::FieldNameMatcher;
use crate::nonblocking::NonBlockingSmileReader;
use crate::read::SmileReader;
use crate::symbols::SymbolTable;
use crate::write::SmileWriter;

/// Name identifying the Smile format, as reported by
/// [`SmileFactory::format_name`].
pub const FORMAT_NAME_SMILE: &str = "Smile";

/// Factory for Smile readers and writers.
///
/// Immutable once built: the feature defaults never change, and
/// reconfiguring goes through [`SmileFactory::rebuild`], which yields a new
/// factory. Per-operation overrides are layered on at each entry point
/// without touching the stored defaults.
#[derive(Debug)]
pub struct SmileFactory {
    read_features: ReadFeatures,
    write_features: WriteFeatures,
    symbols: SymbolTable,
}

impl Default for SmileFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloning behaves like [`SmileFactory::copy`]: same feature defaults,
/// fresh empty symbol root. Learned symbols stay with the original.
impl Clone for SmileFactory {
    fn clone(&self) -> Self {
        self.copy()
    }
}

impl SmileFactory {
    /// Creates a factory with the built-in feature defaults.
    #[must_use]
    pub fn new() -> Self {
        SmileFactory {
            read_features: ReadFeatures::default(),
            write_features: WriteFeatures::default(),
            symbols: SymbolTable::new(),
        }
    }

    /// Starts building a factory with explicit feature selection.
    #[must_use]
    pub fn builder() -> SmileFactoryBuilder {
        SmileFactoryBuilder::new()
    }

    /// Starts a builder seeded with this factory's feature defaults.
    #[must_use]
    pub fn rebuild(&self) -> SmileFactoryBuilder {
        SmileFactoryBuilder {
            read_features: self.read_features,
            write_features: self.write_features,
        }
    }

    /// Copies this factory: the feature pair is cloned, the symbol root is
    /// fresh and empty. Learned symbols are never carried over.
    #[must_use]
    pub fn copy(&self) -> Self {
        SmileFactory {
            read_features: self.read_features,
            write_features: self.write_features,
            symbols: SymbolTable::new(),
        }
    }

    /// The format this factory constructs readers and writers for.
    #[must_use]
    pub fn format_name(&self) -> &'static str {
        FORMAT_NAME_SMILE
    }

    /// Whether non-blocking incremental parsing is available. It is; see
    /// [`SmileFactory::non_blocking_reader`].
    #[must_use]
    pub fn can_parse_non_blocking(&self) -> bool {
        true
    }

    /// Whether an external schema can drive decoding. Smile is
    /// self-describing; it cannot.
    #[must_use]
    pub fn can_use_schema(&self) -> bool {
        false
    }

    /// This factory's read-side feature defaults.
    #[must_use]
    pub fn read_features(&self) -> &ReadFeatures {
        &self.read_features
    }

    /// This factory's write-side feature defaults.
    #[must_use]
    pub fn write_features(&self) -> &WriteFeatures {
        &self.write_features
    }

    /// The shared symbol root. Exposed mainly for inspection; readers
    /// manage their own scopes.
    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Constructs a reader over a byte stream with the factory defaults.
    pub fn reader_from_reader<R: io::Read>(&self, source: R) -> Result<SmileReader<R>> {
        self.reader_from_reader_with_overrides(source, &ReadOverrides::new())
    }

    /// Constructs a reader over a byte stream, layering `overrides` on the
    /// factory defaults for this operation only.
    pub fn reader_from_reader_with_overrides<R: io::Read>(
        &self,
        source: R,
        overrides: &ReadOverrides,
    ) -> Result<SmileReader<R>> {
        let features = self.read_features.resolve(overrides);
        let scope = self.symbols.make_child(features.canonicalize_field_names);
        Ok(SmileReader::from_stream(source, features, scope))
    }

    /// Constructs a reader over a complete byte slice.
    pub fn reader_from_slice(&self, data: &[u8]) -> Result<SmileReader<io::Empty>> {
        self.reader_from_region(data, 0, data.len())
    }

    /// Constructs a reader over the region `data[offset..offset + len]`.
    pub fn reader_from_region(
        &self,
        data: &[u8],
        offset: usize,
        len: usize,
    ) -> Result<SmileReader<io::Empty>> {
        self.reader_from_region_with_overrides(data, offset, len, &ReadOverrides::new())
    }

    /// Region variant with per-operation overrides.
    pub fn reader_from_region_with_overrides(
        &self,
        data: &[u8],
        offset: usize,
        len: usize,
        overrides: &ReadOverrides,
    ) -> Result<SmileReader<io::Empty>> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                Error::custom(format!(
                    "region {offset}+{len} out of bounds for {} input bytes",
                    data.len()
                ))
            })?;
        let features = self.read_features.resolve(overrides);
        let scope = self.symbols.make_child(features.canonicalize_field_names);
        Ok(SmileReader::from_region(&data[offset..end], features, scope))
    }

    /// Character-oriented sources cannot carry Smile content; this always
    /// fails with [`Error::UnsupportedSource`]. A text-format fallback, if
    /// any, belongs to the caller.
    pub fn reader_from_str(&self, _text: &str) -> Result<SmileReader<io::Empty>> {
        Err(Error::unsupported_source(
            "character-oriented source: Smile is a byte format, decode from bytes instead",
        ))
    }

    /// Constructs a sourceless non-blocking reader; it must be fed before
    /// it produces tokens.
    #[must_use]
    pub fn non_blocking_reader(&self) -> NonBlockingSmileReader {
        self.non_blocking_reader_with_overrides(&ReadOverrides::new())
    }

    /// Non-blocking variant with per-operation overrides.
    #[must_use]
    pub fn non_blocking_reader_with_overrides(
        &self,
        overrides: &ReadOverrides,
    ) -> NonBlockingSmileReader {
        let features = self.read_features.resolve(overrides);
        let scope = self.symbols.make_child(features.canonicalize_field_names);
        NonBlockingSmileReader::new(features, scope)
    }

    /// Constructs a writer over `sink` with the factory defaults. Returns
    /// a ready writer (header already emitted when header writing is
    /// enabled) or a configuration-conflict error, in which case no byte
    /// has been produced.
    pub fn writer<W: io::Write>(&self, sink: W) -> Result<SmileWriter<W>> {
        self.writer_with_overrides(sink, &WriteOverrides::new())
    }

    /// Writer variant layering `overrides` on the factory defaults for
    /// this operation only.
    pub fn writer_with_overrides<W: io::Write>(
        &self,
        sink: W,
        overrides: &WriteOverrides,
    ) -> Result<SmileWriter<W>> {
        let features = self.write_features.resolve(overrides);
        SmileWriter::construct(sink, features)
    }

    /// Builds an exact field-name matcher over `names`. When
    /// `already_interned` is false each name is canonicalized through this
    /// factory's symbol root first, so lookups of reader-interned names hit
    /// the reference-equality fast path.
    pub fn field_name_matcher<I, S>(
        &self,
        names: I,
        already_interned: bool,
    ) -> Result<FieldNameMatcher>
    where
        I: IntoIterator<Item = S>,
        S: Into<std::sync::Arc<str>>,
    {
        FieldNameMatcher::construct(names, already_interned, false, &self.symbols)
    }

    /// Case-insensitive variant of [`SmileFactory::field_name_matcher`].
    pub fn case_insensitive_field_name_matcher<I, S>(
        &self,
        names: I,
        already_interned: bool,
    ) -> Result<FieldNameMatcher>
    where
        I: IntoIterator<Item = S>,
        S: Into<std::sync::Arc<str>>,
    {
        FieldNameMatcher::construct(names, already_interned, true, &self.symbols)
    }
}

/// What a factory persists: its feature pair, nothing else. Learned
/// symbols are process state, never part of configuration identity.
#[derive(Serialize, Deserialize)]
#[serde(rename = "SmileFactory")]
struct FactoryConfig {
    read_features: ReadFeatures,
    write_features: WriteFeatures,
}

impl Serialize for SmileFactory {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        FactoryConfig {
            read_features: self.read_features,
            write_features: self.write_features,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SmileFactory {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let config = FactoryConfig::deserialize(deserializer)?;
        Ok(SmileFactory {
            read_features: config.read_features,
            write_features: config.write_features,
            symbols: SymbolTable::new(),
        })
    }
}

/// Builder for a [`SmileFactory`] with explicit feature selection.
///
/// An explicit mutable configuration value, assembled field by field and
/// consumed once by [`SmileFactoryBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct SmileFactoryBuilder {
    read_features: ReadFeatures,
    write_features: WriteFeatures,
}

impl SmileFactoryBuilder {
    /// Starts from the built-in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the read-side feature defaults.
    #[must_use]
    pub fn read_features(mut self, features: ReadFeatures) -> Self {
        self.read_features = features;
        self
    }

    /// Sets the write-side feature defaults.
    #[must_use]
    pub fn write_features(mut self, features: WriteFeatures) -> Self {
        self.write_features = features;
        self
    }

    /// Produces an immutable factory with a fresh symbol root.
    #[must_use]
    pub fn build(self) -> SmileFactory {
        SmileFactory {
            read_features: self.read_features,
            write_features: self.write_features,
            symbols: SymbolTable::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities() {
        let factory = SmileFactory::new();
        assert_eq!(factory.format_name(), "Smile");
        assert!(factory.can_parse_non_blocking());
        assert!(!factory.can_use_schema());
    }

    #[test]
    fn builder_selects_features() {
        let factory = SmileFactory::builder()
            .read_features(ReadFeatures::default().with_require_header(false))
            .write_features(WriteFeatures::default().with_write_end_marker(true))
            .build();
        assert!(!factory.read_features().require_header);
        assert!(factory.write_features().write_end_marker);
    }

    #[test]
    fn copy_keeps_features_but_not_symbols() {
        let factory = SmileFactory::new();
        factory.symbols().intern("learned");
        let copied = factory.copy();
        assert_eq!(copied.read_features(), factory.read_features());
        assert!(copied.symbols().is_empty());
        assert!(factory.symbols().contains("learned"));
    }

    #[test]
    fn text_sources_are_rejected_at_dispatch() {
        let factory = SmileFactory::new();
        let err = factory.reader_from_str(":)\n").unwrap_err();
        assert!(matches!(err, Error::UnsupportedSource(_)));
    }

    #[test]
    fn out_of_bounds_region_is_rejected() {
        let factory = SmileFactory::new();
        assert!(factory.reader_from_region(&[0u8; 4], 2, 8).is_err());
        assert!(factory.reader_from_region(&[0u8; 4], usize::MAX, 2).is_err());
    }
}
