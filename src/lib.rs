//! # serde_smile_factory
//!
//! A factory for readers and writers of the Smile format: a compact,
//! byte-oriented, self-describing serialization of the JSON document model.
//! Structured data interchanged as Smile is smaller and faster to decode
//! than text, across both streaming and buffered sources.
//!
//! ## Key Features
//!
//! - **One factory, many operations**: a [`SmileFactory`] is built once,
//!   then shared across threads; every reader it constructs reuses a
//!   learned field-name symbol table that makes repeated names compare by
//!   pointer
//! - **Feature negotiation**: read and write behavior is controlled by
//!   named boolean [`ReadFeatures`]/[`WriteFeatures`] with per-operation
//!   overrides, and inconsistent write combinations are rejected before a
//!   single byte is produced
//! - **Source dispatch**: readers are constructed from byte streams,
//!   byte-array regions, or as a sourceless non-blocking variant that is
//!   fed chunks and suspends cleanly mid-token
//! - **Field-name matchers**: exact and case-insensitive name-to-index
//!   lookups with a reference-equality fast path
//! - **No Unsafe Code**: written entirely in safe Rust
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_smile_factory::{SmileFactory, Token};
//!
//! let factory = SmileFactory::new();
//!
//! let mut writer = factory.writer(Vec::new()).unwrap();
//! writer.start_object().unwrap();
//! writer.write_field_name("name").unwrap();
//! writer.write_string("Alice").unwrap();
//! writer.end_object().unwrap();
//! let bytes = writer.finish().unwrap();
//!
//! let mut reader = factory.reader_from_slice(&bytes).unwrap();
//! assert_eq!(reader.next_token().unwrap(), Some(Token::StartObject));
//! ```
//!
//! ## Non-Blocking Parsing
//!
//! The non-blocking reader consumes caller-fed chunks and never blocks:
//!
//! ```rust
//! use serde_smile_factory::{Event, SmileFactory, Token};
//!
//! let factory = SmileFactory::new();
//! let mut writer = factory.writer(Vec::new()).unwrap();
//! writer.write_i64(12345).unwrap();
//! let bytes = writer.finish().unwrap();
//!
//! let mut reader = factory.non_blocking_reader();
//! for chunk in bytes.chunks(3) {
//!     reader.feed(chunk);
//! }
//! reader.end_of_input();
//! assert_eq!(reader.next_event().unwrap(), Event::Token(Token::Int(12345)));
//! assert_eq!(reader.next_event().unwrap(), Event::End);
//! ```
//!
//! ## Configuration
//!
//! Factories are immutable; explicit configuration goes through the
//! builder, and per-operation overrides never touch the stored defaults:
//!
//! ```rust
//! use serde_smile_factory::{ReadFeatures, SmileFactory, WriteOverrides};
//!
//! let factory = SmileFactory::builder()
//!     .read_features(ReadFeatures::default().with_require_header(false))
//!     .build();
//!
//! // This one writer skips the header; the factory defaults are unchanged.
//! let writer = factory
//!     .writer_with_overrides(Vec::new(), &WriteOverrides::new().write_header(false))
//!     .unwrap();
//! # drop(writer);
//! assert!(factory.write_features().write_header);
//! ```
//!
//! ## Safety Guarantees
//!
//! - No `unsafe` code blocks
//! - All decoding is bounds-checked; hostile length prefixes are capped
//! - Symbol-table growth is bounded; overflow degrades to pass-through
//!   interning instead of failing
//! - No panics in the public API

pub mod error;
pub mod factory;
pub mod features;
pub mod matcher;
pub mod nonblocking;
pub mod read;
pub mod symbols;
pub mod wire;
pub mod write;

pub use error::{Error, Result};
pub use factory::{SmileFactory, SmileFactoryBuilder, FORMAT_NAME_SMILE};
pub use features::{ReadFeatures, ReadOverrides, WriteFeatures, WriteOverrides};
pub use matcher::FieldNameMatcher;
pub use nonblocking::NonBlockingSmileReader;
pub use read::{Event, SmileReader};
pub use symbols::{SymbolScope, SymbolTable, MAX_ROOT_SYMBOLS};
pub use wire::{HeaderFlags, Token};
pub use write::SmileWriter;
