//! Error types for Smile reader/writer construction and decoding.
//!
//! ## Error Categories
//!
//! - **Configuration Conflicts**: a resolved write feature set is internally
//!   inconsistent (e.g. shared-string checking without a header)
//! - **Unsupported Sources**: a reader was requested for a source kind the
//!   binary format cannot be parsed from (character-oriented input)
//! - **Duplicate Names**: a field-name matcher was given an ambiguous name set
//! - **Decode Errors**: malformed wire content, with the byte offset at which
//!   decoding failed
//! - **I/O Errors**: failures in the underlying byte source or sink
//!
//! All hard errors surface synchronously at construction time, before any
//! output side effect beyond an already-consistent header write. Symbol-table
//! overflow is handled internally by degrading to pass-through interning and
//! is never reported through this type.
//!
//! ## Examples
//!
//! ```rust
//! use serde_smile_factory::{Error, SmileFactory, WriteOverrides};
//!
//! let factory = SmileFactory::new();
//! let overrides = WriteOverrides::new()
//!     .write_header(false)
//!     .check_shared_string_values(true);
//!
//! let result = factory.writer_with_overrides(Vec::new(), &overrides);
//! assert!(matches!(result, Err(Error::ConfigurationConflict { .. })));
//! ```

use std::fmt;
use thiserror::Error;

/// Represents all possible errors produced by factory construction entry
/// points and by Smile decoding.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// IO error during reading or writing
    #[error("IO error: {0}")]
    Io(String),

    /// A resolved write feature set is internally inconsistent. Construction
    /// is rejected before any byte is written; both remediations are named.
    #[error("inconsistent settings: {first}, but {second}; cannot construct writer ({remediation})")]
    ConfigurationConflict {
        first: String,
        second: String,
        remediation: String,
    },

    /// A reader was requested for a source kind with no byte-addressable
    /// representation of the Smile format.
    #[error("unsupported input source: {0}")]
    UnsupportedSource(String),

    /// A field-name matcher was given two names that collide under its
    /// comparison rule.
    #[error("duplicate field name {name:?} in matcher input")]
    DuplicateName { name: String },

    /// Malformed wire content at a known byte offset
    #[error("decode error at byte {offset}: {msg}")]
    Decode { offset: usize, msg: String },

    /// The input ended mid-token on a source that cannot supply more bytes
    #[error("unexpected end of input at byte {offset}: expected {expected}")]
    UnexpectedEndOfInput { offset: usize, expected: String },

    /// Custom error
    #[error("Error: {0}")]
    Custom(String),
}

impl Error {
    /// Creates a configuration-conflict error naming the conflicting setting
    /// pair and the two possible remediations.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde_smile_factory::Error;
    ///
    /// let err = Error::configuration_conflict(
    ///     "WRITE_HEADER disabled",
    ///     "CHECK_SHARED_STRING_VALUES enabled",
    ///     "either enable WRITE_HEADER, or disable CHECK_SHARED_STRING_VALUES",
    /// );
    /// assert!(err.to_string().contains("WRITE_HEADER"));
    /// ```
    pub fn configuration_conflict(first: &str, second: &str, remediation: &str) -> Self {
        Error::ConfigurationConflict {
            first: first.to_string(),
            second: second.to_string(),
            remediation: remediation.to_string(),
        }
    }

    /// Creates an unsupported-source error for source kinds the dispatcher
    /// rejects.
    pub fn unsupported_source(msg: &str) -> Self {
        Error::UnsupportedSource(msg.to_string())
    }

    /// Creates a duplicate-name error for an ambiguous matcher input.
    pub fn duplicate_name(name: &str) -> Self {
        Error::DuplicateName {
            name: name.to_string(),
        }
    }

    /// Creates a decode error at the given absolute byte offset.
    pub fn decode(offset: usize, msg: &str) -> Self {
        Error::Decode {
            offset,
            msg: msg.to_string(),
        }
    }

    /// Creates an unexpected end-of-input error.
    pub fn unexpected_end_of_input(offset: usize, expected: &str) -> Self {
        Error::UnexpectedEndOfInput {
            offset,
            expected: expected.to_string(),
        }
    }

    /// Creates an I/O error carrying the underlying failure message.
    pub fn io(msg: &str) -> Self {
        Error::Io(msg.to_string())
    }

    /// Creates a custom error with a display message.
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
