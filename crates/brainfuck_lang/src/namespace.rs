//! Lexical scopes for the code generator.
//!
//! Each scope is a small open-addressing table keyed by [`Symbol`]. Because symbols come only
//! from the interner, comparing and hashing them never touches the underlying text.

use crate::{builtins::Builtin, interner::Symbol, memory::Value};
use thiserror::Error;

/// What a name refers to at code generation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Slot(Value),
    Builtin(Builtin),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable {
    pub name: Symbol,
    pub binding: Binding,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("name is already declared in this scope")]
pub struct DuplicateName(pub Symbol);

/// One scope: a linear-probing hash table with power-of-two capacity.
#[derive(Debug, Clone)]
pub struct Namespace {
    entries: Vec<Option<Variable>>,
    len: usize,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

impl Namespace {
    const INITIAL_CAPACITY: usize = 8;

    pub fn new() -> Self {
        Self { entries: vec![None; Self::INITIAL_CAPACITY], len: 0 }
    }

    fn home(&self, name: Symbol) -> usize {
        name.index().wrapping_mul(0x9E37_79B9) & (self.entries.len() - 1)
    }

    /// Index holding `name`, or the empty slot where it would go.
    fn probe(&self, name: Symbol) -> usize {
        let mask = self.entries.len() - 1;
        let mut index = self.home(name);
        while let Some(entry) = &self.entries[index] {
            if entry.name == name {
                break;
            }
            index = (index + 1) & mask;
        }
        index
    }

    pub fn insert(&mut self, variable: Variable) -> Result<(), DuplicateName> {
        if (self.len + 1) * 5 > self.entries.len() * 4 {
            self.grow();
        }
        let index = self.probe(variable.name);
        if self.entries[index].is_some() {
            return Err(DuplicateName(variable.name));
        }
        self.entries[index] = Some(variable);
        self.len += 1;
        Ok(())
    }

    pub fn get(&self, name: Symbol) -> Option<&Variable> {
        self.entries[self.probe(name)].as_ref()
    }

    pub fn get_mut(&mut self, name: Symbol) -> Option<&mut Variable> {
        let index = self.probe(name);
        self.entries[index].as_mut()
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.entries.iter().flatten()
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn grow(&mut self) {
        let capacity = self.entries.len() * 2;
        let old = std::mem::replace(&mut self.entries, vec![None; capacity]);
        for variable in old.into_iter().flatten() {
            let index = self.probe(variable.name);
            self.entries[index] = Some(variable);
        }
    }
}

/// Stack of nested scopes. The outermost scope is never popped.
#[derive(Debug, Clone)]
pub struct ScopeChain {
    scopes: Vec<Namespace>,
}

impl Default for ScopeChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeChain {
    pub fn new() -> Self {
        Self { scopes: vec![Namespace::new()] }
    }

    pub fn push(&mut self) {
        self.scopes.push(Namespace::new());
    }

    /// Closes the innermost scope and returns the tape cells its variables held, which the
    /// caller owns from now on. Popping the outermost scope returns nothing.
    pub fn pop(&mut self) -> Vec<Value> {
        if self.scopes.len() == 1 {
            tracing::warn!("attempted to pop the outermost scope");
            return Vec::new();
        }
        self.scopes
            .pop()
            .map(|scope| {
                scope
                    .variables()
                    .filter_map(|variable| match variable.binding {
                        Binding::Slot(value) => Some(value),
                        Binding::Builtin(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Declares `variable` in the innermost scope.
    pub fn declare(&mut self, variable: Variable) -> Result<(), DuplicateName> {
        match self.scopes.last_mut() {
            Some(scope) => scope.insert(variable),
            None => Err(DuplicateName(variable.name)),
        }
    }

    /// Finds the innermost binding of `name`.
    pub fn lookup(&self, name: Symbol) -> Option<&Variable> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn lookup_mut(&mut self, name: Symbol) -> Option<&mut Variable> {
        self.scopes.iter_mut().rev().find_map(|scope| scope.get_mut(name))
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ast::Type, interner::Interner};

    fn slot(pos: usize) -> Binding {
        Binding::Slot(Value { pos, ty: Type::Int })
    }

    fn names(count: usize) -> Vec<Symbol> {
        let mut interner = Interner::new();
        (0..count).map(|i| interner.intern(&format!("v{i}"))).collect()
    }

    #[test]
    fn test_insert_and_get() {
        let names = names(3);
        let mut scope = Namespace::new();
        scope.insert(Variable { name: names[0], binding: slot(4) }).unwrap();
        scope.insert(Variable { name: names[1], binding: Binding::Builtin(Builtin::Print) }).unwrap();
        assert_eq!(scope.get(names[0]).map(|v| v.binding), Some(slot(4)));
        assert_eq!(scope.get(names[1]).map(|v| v.binding), Some(Binding::Builtin(Builtin::Print)));
        assert!(scope.get(names[2]).is_none());
        assert_eq!(
            scope.insert(Variable { name: names[0], binding: slot(9) }),
            Err(DuplicateName(names[0]))
        );
        assert_eq!(scope.len(), 2);
    }

    #[test]
    fn test_grows_past_load_factor() {
        let names = names(100);
        let mut scope = Namespace::new();
        for (pos, &name) in names.iter().enumerate() {
            scope.insert(Variable { name, binding: slot(pos) }).unwrap();
            assert!(scope.len() * 5 <= scope.capacity() * 4);
        }
        assert!(scope.capacity().is_power_of_two());
        for (pos, &name) in names.iter().enumerate() {
            assert_eq!(scope.get(name).map(|v| v.binding), Some(slot(pos)));
        }
        assert_eq!(scope.variables().count(), 100);
    }

    #[test]
    fn test_earlier_names_survive_repeated_growth() {
        let names = names(20);
        let mut scope = Namespace::new();
        let initial = scope.capacity();
        let mut growths = 0;
        for (pos, &name) in names.iter().enumerate() {
            let before = scope.capacity();
            scope.insert(Variable { name, binding: slot(pos) }).unwrap();
            if scope.capacity() > before {
                growths += 1;
            }
            for (earlier, &name) in names[..=pos].iter().enumerate() {
                assert_eq!(scope.get(name).map(|v| v.binding), Some(slot(earlier)));
            }
        }
        assert!(growths >= 2);
        assert_eq!(scope.capacity(), initial << growths);
    }

    #[test]
    fn test_get_mut_rebinds() {
        let names = names(1);
        let mut scope = Namespace::new();
        scope.insert(Variable { name: names[0], binding: slot(0) }).unwrap();
        if let Some(variable) = scope.get_mut(names[0]) {
            variable.binding = slot(7);
        }
        assert_eq!(scope.get(names[0]).map(|v| v.binding), Some(slot(7)));
    }

    #[test]
    fn test_shadowing() {
        let names = names(2);
        let x = names[0];
        let mut chain = ScopeChain::new();
        chain.declare(Variable { name: x, binding: slot(0) }).unwrap();

        chain.push();
        chain.declare(Variable { name: x, binding: slot(1) }).unwrap();
        chain.declare(Variable { name: names[1], binding: slot(2) }).unwrap();
        assert_eq!(chain.lookup(x).map(|v| v.binding), Some(slot(1)));
        assert!(chain.declare(Variable { name: x, binding: slot(3) }).is_err());

        let mut released = chain.pop();
        released.sort_by_key(|value| value.pos);
        assert_eq!(released.iter().map(|value| value.pos).collect::<Vec<_>>(), [1, 2]);
        assert_eq!(chain.lookup(x).map(|v| v.binding), Some(slot(0)));
        assert!(chain.lookup(names[1]).is_none());
    }

    #[test]
    fn test_lookup_mut_walks_outward() {
        let names = names(1);
        let mut chain = ScopeChain::new();
        chain.declare(Variable { name: names[0], binding: slot(0) }).unwrap();
        chain.push();
        if let Some(variable) = chain.lookup_mut(names[0]) {
            variable.binding = slot(5);
        }
        chain.pop();
        assert_eq!(chain.lookup(names[0]).map(|v| v.binding), Some(slot(5)));
    }

    #[test]
    fn test_outermost_scope_stays() {
        let names = names(1);
        let mut chain = ScopeChain::new();
        chain.declare(Variable { name: names[0], binding: slot(0) }).unwrap();
        assert!(chain.pop().is_empty());
        assert_eq!(chain.depth(), 1);
        assert!(chain.lookup(names[0]).is_some());
    }
}
