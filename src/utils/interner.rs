//! Global String Interner
//!
//! Property names, piece names and job names are compared constantly while
//! templates are expanded and caches are searched. Interning turns each name
//! into a compact [`Symbol`] so comparison and hashing are integer operations.

use std::fmt;
use std::sync::LazyLock;

use lasso::{Spur, ThreadedRodeo};

static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// Compact integer identifier of an interned string.
pub type Symbol = Spur;

/// Interns a string and returns its [`Symbol`].
#[inline]
pub fn intern(s: &str) -> Symbol {
    INTERNER.get_or_intern(s)
}

/// Returns the [`Symbol`] of an already interned string without allocating.
#[inline]
pub fn get(s: &str) -> Option<Symbol> {
    INTERNER.get(s)
}

/// Resolves a [`Symbol`] back to its string.
#[inline]
pub fn resolve(sym: Symbol) -> &'static str {
    INTERNER.resolve(&sym)
}

/// A process-wide interned identifier.
///
/// Equality, ordering and hashing operate on the symbol, never on the text.
/// Ordering therefore follows interning order, which is stable for the
/// lifetime of the process and is all that sorted containers need.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdString(Symbol);

impl IdString {
    #[inline]
    #[must_use]
    pub fn new(s: &str) -> Self {
        Self(intern(s))
    }

    /// Looks up an identifier without interning it.
    #[inline]
    #[must_use]
    pub fn lookup(s: &str) -> Option<Self> {
        get(s).map(Self)
    }

    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        resolve(self.0)
    }

    #[inline]
    #[must_use]
    pub fn symbol(self) -> Symbol {
        self.0
    }
}

impl From<&str> for IdString {
    #[inline]
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<&String> for IdString {
    #[inline]
    fn from(s: &String) -> Self {
        Self::new(s)
    }
}

impl fmt::Debug for IdString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdString({:?})", self.as_str())
    }
}

impl fmt::Display for IdString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_and_resolve() {
        let s1 = intern("hello");
        let s2 = intern("hello");
        let s3 = intern("world");

        assert_eq!(s1, s2);
        assert_ne!(s1, s3);

        assert_eq!(resolve(s1), "hello");
        assert_eq!(resolve(s3), "world");
    }

    #[test]
    fn test_get() {
        let _ = intern("existing");

        assert!(get("existing").is_some());
        assert!(get("interner_never_seen_this").is_none());
    }

    #[test]
    fn test_id_string_identity() {
        let a = IdString::new("threads_per_group_x");
        let b = IdString::from("threads_per_group_x");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "threads_per_group_x");
        assert_eq!(a.to_string(), "threads_per_group_x");
        assert_eq!(IdString::lookup("threads_per_group_x"), Some(a));
    }
}
