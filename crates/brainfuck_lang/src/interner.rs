//! Identifier interning.
//!
//! Every distinct token text is stored once and referred to by a [`Symbol`]. Only the
//! [`Interner`] can create symbols, so equal symbols always mean equal names and name lookups
//! never compare strings.

use rustc_hash::FxHashMap;
use std::num::NonZeroU32;

/// An interned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(NonZeroU32);

impl Symbol {
    fn from_index(index: usize) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index as u32))
    }

    /// Dense index of this symbol, in interning order.
    pub const fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

#[derive(Debug, Clone, Default)]
pub struct Interner {
    map: FxHashMap<Box<str>, Symbol>,
    strings: Vec<Box<str>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `s`, returning the symbol it already had if it was seen before.
    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.map.get(s) {
            return sym;
        }

        let sym = Symbol::from_index(self.strings.len());
        self.strings.push(s.into());
        self.map.insert(s.into(), sym);
        sym
    }

    /// Text of a symbol from this interner.
    ///
    /// # Panics
    ///
    /// Panics if the symbol was created by another interner with more entries.
    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.strings[sym.index()]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_deduplicates() {
        let mut interner = Interner::new();

        let sym1 = interner.intern("x");
        let sym2 = interner.intern("y");
        let sym3 = interner.intern("x");

        assert_eq!(sym1, sym3);
        assert_ne!(sym1, sym2);
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn test_resolve() {
        let mut interner = Interner::new();

        let sym = interner.intern("counter");
        assert_eq!(interner.resolve(sym), "counter");
        assert_eq!(sym.index(), 0);
        assert_eq!(interner.intern("other").index(), 1);
    }
}
