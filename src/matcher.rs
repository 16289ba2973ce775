//! Optimized field-name lookup.
//!
//! A [`FieldNameMatcher`] maps a fixed, ordered set of candidate field
//! names to stable indices, for decoders that know up front which names
//! they care about. Lookups by canonical reference (an `Arc<str>` produced
//! by this crate's symbol table) hit a pointer-keyed fast path; anything
//! else falls back to byte-content comparison.
//!
//! Matchers come in exact and case-insensitive variants and are immutable
//! once built. Building fails with
//! [`Error::DuplicateName`](crate::Error::DuplicateName) if two candidate
//! names collide under the matcher's comparison rule, since an ambiguous
//! mapping must never exist.
//!
//! ## Examples
//!
//! ```rust
//! use serde_smile_factory::SmileFactory;
//!
//! let factory = SmileFactory::new();
//! let matcher = factory.field_name_matcher(["id", "name"], false).unwrap();
//! assert_eq!(matcher.match_name("name"), Some(1));
//! assert_eq!(matcher.match_name("Name"), None);
//!
//! let ci = factory
//!     .case_insensitive_field_name_matcher(["id", "name"], false)
//!     .unwrap();
//! assert_eq!(ci.match_name("Name"), Some(1));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::symbols::SymbolTable;

/// Immutable name-to-index lookup over a fixed candidate set.
#[derive(Debug, Clone)]
pub struct FieldNameMatcher {
    names: Vec<Arc<str>>,
    by_ptr: HashMap<usize, usize>,
    by_key: HashMap<String, usize>,
    case_insensitive: bool,
}

impl FieldNameMatcher {
    /// Builds a matcher over `names`, interning them through `root` unless
    /// the caller asserts they are `already_interned` canonical references.
    pub(crate) fn construct<I, S>(
        names: I,
        already_interned: bool,
        case_insensitive: bool,
        root: &SymbolTable,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let mut matcher = FieldNameMatcher {
            names: Vec::new(),
            by_ptr: HashMap::new(),
            by_key: HashMap::new(),
            case_insensitive,
        };
        for name in names {
            let name: Arc<str> = name.into();
            let sym = if already_interned {
                name
            } else {
                root.intern(&name)
            };
            let key = matcher.key_for(&sym);
            let index = matcher.names.len();
            if matcher.by_key.insert(key, index).is_some() {
                return Err(Error::duplicate_name(&sym));
            }
            matcher.by_ptr.insert(ptr_key(&sym), index);
            matcher.names.push(sym);
        }
        Ok(matcher)
    }

    fn key_for(&self, name: &str) -> String {
        if self.case_insensitive {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }

    /// Looks up a name by byte content (case-folded for the
    /// case-insensitive variant).
    #[must_use]
    pub fn match_name(&self, name: &str) -> Option<usize> {
        self.by_key.get(&self.key_for(name)).copied()
    }

    /// Looks up a canonical reference. References produced by the same
    /// factory's symbol table resolve by pointer; foreign references fall
    /// back to byte comparison.
    #[must_use]
    pub fn match_interned(&self, name: &Arc<str>) -> Option<usize> {
        if let Some(&index) = self.by_ptr.get(&ptr_key(name)) {
            return Some(index);
        }
        self.match_name(name)
    }

    /// The candidate name at `index`, in build order.
    #[must_use]
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(|n| n.as_ref())
    }

    /// Number of candidate names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the candidate set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether this matcher folds case when comparing.
    #[must_use]
    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }
}

fn ptr_key(name: &Arc<str>) -> usize {
    Arc::as_ptr(name) as *const u8 as usize
}
