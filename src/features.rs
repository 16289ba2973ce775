//! Feature flags controlling Smile readers and writers.
//!
//! This module provides two independent named-boolean option sets:
//!
//! - [`ReadFeatures`]: parser-side behavior (header requirement, field-name
//!   canonicalization)
//! - [`WriteFeatures`]: generator-side behavior (header, end marker, binary
//!   encoding mode, shared back-references)
//!
//! A [`SmileFactory`](crate::SmileFactory) holds one fixed pair of these,
//! set at build time and immutable thereafter. Per-operation resolution
//! layers a caller-supplied [`ReadOverrides`] / [`WriteOverrides`] on top of
//! the factory defaults without mutating them, so a factory can be shared
//! across concurrent operations without locking.
//!
//! ## Examples
//!
//! ```rust
//! use serde_smile_factory::{WriteFeatures, WriteOverrides};
//!
//! let defaults = WriteFeatures::default();
//! assert!(defaults.write_header);
//! assert!(defaults.encode_binary_as_7bit);
//! assert!(!defaults.check_shared_string_values);
//!
//! // Overrides win over defaults; unset fields fall through.
//! let resolved = defaults.resolve(&WriteOverrides::new().write_header(false));
//! assert!(!resolved.write_header);
//! assert!(resolved.encode_binary_as_7bit);
//! ```

use serde::{Deserialize, Serialize};

/// Parser-side feature flags.
///
/// Semantic validity of a resolved combination is checked at the point of
/// use, not here; resolution itself never fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFeatures {
    /// Whether the input must begin with the Smile header (`:)\n` plus a
    /// version/flags byte). Enabled by default: without the header the
    /// decoder cannot know which shared-reference conventions are active.
    pub require_header: bool,

    /// Whether field names seen during decoding are interned into the
    /// session's symbol scope. Enabled by default; disabling turns the
    /// derived scope into a pass-through (names are still decoded, never
    /// cached or merged back).
    pub canonicalize_field_names: bool,
}

impl Default for ReadFeatures {
    fn default() -> Self {
        ReadFeatures {
            require_header: true,
            canonicalize_field_names: true,
        }
    }
}

impl ReadFeatures {
    /// Creates the default read feature set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether a Smile header is required at the start of input.
    #[must_use]
    pub fn with_require_header(mut self, enabled: bool) -> Self {
        self.require_header = enabled;
        self
    }

    /// Sets whether decoded field names are interned.
    #[must_use]
    pub fn with_canonicalize_field_names(mut self, enabled: bool) -> Self {
        self.canonicalize_field_names = enabled;
        self
    }

    /// Layers caller overrides on top of these defaults. Pure function:
    /// `self` is not mutated, override bits take precedence.
    #[must_use]
    pub fn resolve(&self, overrides: &ReadOverrides) -> ReadFeatures {
        ReadFeatures {
            require_header: overrides.require_header.unwrap_or(self.require_header),
            canonicalize_field_names: overrides
                .canonicalize_field_names
                .unwrap_or(self.canonicalize_field_names),
        }
    }
}

/// Per-operation overrides for [`ReadFeatures`]. Unset fields fall through
/// to the factory defaults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadOverrides {
    pub require_header: Option<bool>,
    pub canonicalize_field_names: Option<bool>,
}

impl ReadOverrides {
    /// Creates an empty override set (everything falls through).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn require_header(mut self, enabled: bool) -> Self {
        self.require_header = Some(enabled);
        self
    }

    #[must_use]
    pub fn canonicalize_field_names(mut self, enabled: bool) -> Self {
        self.canonicalize_field_names = Some(enabled);
        self
    }
}

/// Generator-side feature flags.
///
/// The resolved combination must satisfy one invariant, enforced by the
/// writer construction guard before any byte is produced: if `write_header`
/// is false, then `check_shared_string_values` must also be false and
/// `encode_binary_as_7bit` must be true. Back-references and raw binary
/// framing are only safely decodable when a header declared the convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFeatures {
    /// Whether the 4-byte Smile header is written before any content.
    /// Enabled by default.
    pub write_header: bool,

    /// Whether the `0xFF` end-of-stream marker is written when the writer
    /// is finished. Disabled by default.
    pub write_end_marker: bool,

    /// Whether binary values are encoded with 7-bit-safe byte groups rather
    /// than raw bytes. Enabled by default; raw framing is unambiguous only
    /// when the header declared it.
    pub encode_binary_as_7bit: bool,

    /// Whether repeated field names are written as back-references to an
    /// earlier occurrence. Enabled by default.
    pub check_shared_names: bool,

    /// Whether repeated short string values are written as back-references.
    /// Disabled by default; requires the header.
    pub check_shared_string_values: bool,
}

impl Default for WriteFeatures {
    fn default() -> Self {
        WriteFeatures {
            write_header: true,
            write_end_marker: false,
            encode_binary_as_7bit: true,
            check_shared_names: true,
            check_shared_string_values: false,
        }
    }
}

impl WriteFeatures {
    /// Creates the default write feature set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_write_header(mut self, enabled: bool) -> Self {
        self.write_header = enabled;
        self
    }

    #[must_use]
    pub fn with_write_end_marker(mut self, enabled: bool) -> Self {
        self.write_end_marker = enabled;
        self
    }

    #[must_use]
    pub fn with_encode_binary_as_7bit(mut self, enabled: bool) -> Self {
        self.encode_binary_as_7bit = enabled;
        self
    }

    #[must_use]
    pub fn with_check_shared_names(mut self, enabled: bool) -> Self {
        self.check_shared_names = enabled;
        self
    }

    #[must_use]
    pub fn with_check_shared_string_values(mut self, enabled: bool) -> Self {
        self.check_shared_string_values = enabled;
        self
    }

    /// Layers caller overrides on top of these defaults. Pure function:
    /// `self` is not mutated, override bits take precedence. Consistency of
    /// the result is validated by the writer construction guard, not here.
    #[must_use]
    pub fn resolve(&self, overrides: &WriteOverrides) -> WriteFeatures {
        WriteFeatures {
            write_header: overrides.write_header.unwrap_or(self.write_header),
            write_end_marker: overrides.write_end_marker.unwrap_or(self.write_end_marker),
            encode_binary_as_7bit: overrides
                .encode_binary_as_7bit
                .unwrap_or(self.encode_binary_as_7bit),
            check_shared_names: overrides
                .check_shared_names
                .unwrap_or(self.check_shared_names),
            check_shared_string_values: overrides
                .check_shared_string_values
                .unwrap_or(self.check_shared_string_values),
        }
    }
}

/// Per-operation overrides for [`WriteFeatures`]. Unset fields fall through
/// to the factory defaults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteOverrides {
    pub write_header: Option<bool>,
    pub write_end_marker: Option<bool>,
    pub encode_binary_as_7bit: Option<bool>,
    pub check_shared_names: Option<bool>,
    pub check_shared_string_values: Option<bool>,
}

impl WriteOverrides {
    /// Creates an empty override set (everything falls through).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn write_header(mut self, enabled: bool) -> Self {
        self.write_header = Some(enabled);
        self
    }

    #[must_use]
    pub fn write_end_marker(mut self, enabled: bool) -> Self {
        self.write_end_marker = Some(enabled);
        self
    }

    #[must_use]
    pub fn encode_binary_as_7bit(mut self, enabled: bool) -> Self {
        self.encode_binary_as_7bit = Some(enabled);
        self
    }

    #[must_use]
    pub fn check_shared_names(mut self, enabled: bool) -> Self {
        self.check_shared_names = Some(enabled);
        self
    }

    #[must_use]
    pub fn check_shared_string_values(mut self, enabled: bool) -> Self {
        self.check_shared_string_values = Some(enabled);
        self
    }
}
