//! Shared field-name symbol table.
//!
//! Decoding Smile content is dominated by repeated field names, so every
//! reader interns the names it sees into a canonical `Arc<str>` form that
//! later comparisons can resolve by pointer. The table has two levels:
//!
//! - [`SymbolTable`]: the factory-lifetime root. Append-only, bounded, safe
//!   to read and to derive children from concurrently. Derivation takes a
//!   snapshot; merging back swaps in a freshly built map, so no child ever
//!   observes a partially merged root.
//! - [`SymbolScope`]: one per read session, created from the current root
//!   snapshot. Accumulates names the session learns; on release (explicit
//!   or on drop) the learned names are merged back into the root as an
//!   idempotent, best-effort union.
//!
//! Growth is capped at [`MAX_ROOT_SYMBOLS`] total entries to resist inputs
//! that stream endless unique field names. A session that would push past
//! the cap silently degrades to pass-through interning for its remainder;
//! decoding keeps working, it just stops caching.
//!
//! ## Examples
//!
//! ```rust
//! use serde_smile_factory::SymbolTable;
//!
//! let root = SymbolTable::new();
//! let mut scope = root.make_child(true);
//! let a = scope.intern("name");
//! let b = scope.intern("name");
//! assert!(std::sync::Arc::ptr_eq(&a, &b));
//!
//! drop(scope); // learned names merge back into the root
//! assert_eq!(root.len(), 1);
//! ```

use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

/// Upper bound on the number of canonical names the root table will hold.
pub const MAX_ROOT_SYMBOLS: usize = 4096;

type Snapshot = Arc<IndexMap<String, Arc<str>>>;

/// Factory-lifetime root of interned field names.
///
/// Cloning a `SymbolTable` clones a handle to the same underlying table;
/// [`SymbolTable::new`] creates an independent empty one.
#[derive(Clone)]
pub struct SymbolTable {
    shared: Arc<Mutex<Snapshot>>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Creates an empty root table.
    #[must_use]
    pub fn new() -> Self {
        SymbolTable {
            shared: Arc::new(Mutex::new(Arc::new(IndexMap::new()))),
        }
    }

    /// Derives a fresh per-session scope from the current root snapshot.
    ///
    /// `canonicalize` comes from the resolved read features; when false the
    /// scope is a pass-through that neither caches nor merges.
    #[must_use]
    pub fn make_child(&self, canonicalize: bool) -> SymbolScope {
        SymbolScope {
            root: self.clone(),
            snapshot: self.snapshot(),
            local: IndexMap::new(),
            canonicalize,
            degraded: false,
        }
    }

    /// Interns a single name directly into the root, returning its
    /// canonical reference. Used by the field-name matcher builder so that
    /// matcher entries share references with later-derived scopes. Past the
    /// size cap this returns an uncached reference.
    pub(crate) fn intern(&self, name: &str) -> Arc<str> {
        let mut guard = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sym) = guard.get(name) {
            return Arc::clone(sym);
        }
        if guard.len() >= MAX_ROOT_SYMBOLS {
            return Arc::from(name);
        }
        let sym: Arc<str> = Arc::from(name);
        let mut map = (**guard).clone();
        map.insert(name.to_string(), Arc::clone(&sym));
        *guard = Arc::new(map);
        sym
    }

    /// Merges a session's learned names. Duplicate inserts are no-ops and
    /// the union stops at the size cap; the swap is atomic with respect to
    /// concurrent derivations.
    pub(crate) fn merge<I>(&self, learned: I)
    where
        I: IntoIterator<Item = (String, Arc<str>)>,
    {
        let mut guard = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        let mut updated: Option<IndexMap<String, Arc<str>>> = None;
        for (name, sym) in learned {
            let exists = match &updated {
                Some(map) => map.contains_key(&name),
                None => guard.contains_key(&name),
            };
            if exists {
                continue;
            }
            let map = updated.get_or_insert_with(|| (**guard).clone());
            if map.len() >= MAX_ROOT_SYMBOLS {
                break;
            }
            map.insert(name, sym);
        }
        if let Some(map) = updated {
            *guard = Arc::new(map);
        }
    }

    fn snapshot(&self) -> Snapshot {
        let guard = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Number of canonical names currently in the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the root holds no names yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the root already knows `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().contains_key(name)
    }
}

impl std::fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolTable")
            .field("len", &self.len())
            .finish()
    }
}

/// Per-session view of the symbol table: a root snapshot plus the names
/// this session has learned so far.
///
/// Not shared between threads; each reader owns exactly one scope. Dropping
/// the scope merges its learned names back into the root.
#[derive(Debug)]
pub struct SymbolScope {
    root: SymbolTable,
    snapshot: Snapshot,
    local: IndexMap<String, Arc<str>>,
    canonicalize: bool,
    degraded: bool,
}

impl SymbolScope {
    /// Interns `name`, returning its canonical reference. Names already in
    /// the root snapshot or learned earlier in this session come back as
    /// the same `Arc`; past the size cap the scope degrades to returning
    /// uncached references.
    pub fn intern(&mut self, name: &str) -> Arc<str> {
        if !self.canonicalize {
            return Arc::from(name);
        }
        if let Some(sym) = self.snapshot.get(name) {
            return Arc::clone(sym);
        }
        if let Some(sym) = self.local.get(name) {
            return Arc::clone(sym);
        }
        if self.degraded || self.snapshot.len() + self.local.len() >= MAX_ROOT_SYMBOLS {
            self.degraded = true;
            return Arc::from(name);
        }
        let sym: Arc<str> = Arc::from(name);
        self.local.insert(name.to_string(), Arc::clone(&sym));
        sym
    }

    /// Number of names this session has learned beyond its snapshot.
    #[must_use]
    pub fn learned(&self) -> usize {
        self.local.len()
    }

    /// Whether this session hit the size cap and stopped caching.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Ends the session, merging learned names into the root. Equivalent to
    /// dropping the scope; provided for call sites that want the merge
    /// point visible.
    pub fn release(self) {}
}

impl Drop for SymbolScope {
    fn drop(&mut self) {
        if self.canonicalize && !self.local.is_empty() {
            self.root.merge(self.local.drain(..));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn child_sees_root_snapshot() {
        let root = SymbolTable::new();
        let sym = root.intern("id");
        let mut scope = root.make_child(true);
        assert!(Arc::ptr_eq(&scope.intern("id"), &sym));
        assert_eq!(scope.learned(), 0);
    }

    #[test]
    fn merge_is_idempotent() {
        let root = SymbolTable::new();
        for _ in 0..3 {
            let mut scope = root.make_child(true);
            scope.intern("a");
            scope.intern("b");
            scope.release();
        }
        assert_eq!(root.len(), 2);
    }

    #[test]
    fn pass_through_scope_never_merges() {
        let root = SymbolTable::new();
        let mut scope = root.make_child(false);
        scope.intern("a");
        scope.release();
        assert!(root.is_empty());
    }

    #[test]
    fn scope_degrades_at_cap_instead_of_failing() {
        let root = SymbolTable::new();
        let mut scope = root.make_child(true);
        for i in 0..MAX_ROOT_SYMBOLS + 10 {
            let name = format!("field{i}");
            let _ = scope.intern(&name);
        }
        assert!(scope.is_degraded());
        assert_eq!(scope.learned(), MAX_ROOT_SYMBOLS);
        scope.release();
        assert_eq!(root.len(), MAX_ROOT_SYMBOLS);
    }

    #[test]
    fn concurrent_sessions_union_without_lost_updates() {
        let root = SymbolTable::new();
        let mut handles = Vec::new();
        for t in 0..8 {
            let root = root.clone();
            handles.push(thread::spawn(move || {
                let mut scope = root.make_child(true);
                scope.intern("common");
                scope.intern(&format!("session{t}"));
                scope.release();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(root.len(), 9);
        assert!(root.contains("common"));
        for t in 0..8 {
            assert!(root.contains(&format!("session{t}")));
        }
    }
}
