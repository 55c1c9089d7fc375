//! Compile-time bookkeeping of which tape cells hold live values.

use crate::ast::Type;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// Never handed out, so still zero at run time.
    Untouched,
    /// Freed; may hold a stale value.
    Available,
    Taken,
}

/// A tape cell holding a value of some type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Value {
    pub pos: usize,
    pub ty: Type,
}

/// Result of [`TapeAllocator::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub value: Value,
    /// The cell was reused and must be zeroed before anything reads it.
    pub needs_reset: bool,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AllocationError {
    #[error("values of type `{0}` cannot be stored on the tape")]
    UnsupportedType(Type),
}

#[derive(Debug, Clone)]
pub struct TapeAllocator {
    cells: Vec<CellState>,
}

impl Default for TapeAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl TapeAllocator {
    pub const INITIAL_SIZE: usize = 16;

    pub fn new() -> Self {
        Self { cells: vec![CellState::Untouched; Self::INITIAL_SIZE] }
    }

    /// Hands out the lowest free cell, growing the tape when none is left.
    pub fn allocate(&mut self, ty: Type) -> Result<Allocation, AllocationError> {
        if ty != Type::Int {
            return Err(AllocationError::UnsupportedType(ty));
        }

        let pos = match self.cells.iter().position(|&cell| cell != CellState::Taken) {
            Some(pos) => pos,
            None => {
                let pos = self.cells.len();
                self.cells.resize(pos * 2, CellState::Untouched);
                tracing::trace!("tape grew to {} cells", self.cells.len());
                pos
            }
        };
        let needs_reset = self.cells[pos] == CellState::Available;
        self.cells[pos] = CellState::Taken;
        Ok(Allocation { value: Value { pos, ty }, needs_reset })
    }

    /// Returns a cell to the pool. Freeing a cell that is not taken is logged and ignored.
    pub fn free(&mut self, value: Value) {
        match self.cells.get_mut(value.pos) {
            Some(cell @ CellState::Taken) => *cell = CellState::Available,
            state => tracing::warn!("freeing cell {} which is {state:?}", value.pos),
        }
    }

    pub fn state(&self, pos: usize) -> CellState {
        self.cells.get(pos).copied().unwrap_or(CellState::Untouched)
    }

    /// Number of cells currently taken.
    pub fn taken(&self) -> usize {
        self.cells.iter().filter(|&&cell| cell == CellState::Taken).count()
    }

    /// Cells tracked so far; the generated program never touches cells past this.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(alloc: &mut TapeAllocator) -> Allocation {
        alloc.allocate(Type::Int).unwrap()
    }

    #[test]
    fn test_fresh_cells_need_no_reset() {
        let mut alloc = TapeAllocator::new();
        let a = int(&mut alloc);
        let b = int(&mut alloc);
        assert_eq!((a.value.pos, a.needs_reset), (0, false));
        assert_eq!((b.value.pos, b.needs_reset), (1, false));
        assert_eq!(alloc.taken(), 2);
    }

    #[test]
    fn test_reused_cells_need_reset() {
        let mut alloc = TapeAllocator::new();
        let a = int(&mut alloc);
        let _b = int(&mut alloc);
        alloc.free(a.value);
        assert_eq!(alloc.state(0), CellState::Available);

        let again = int(&mut alloc);
        assert_eq!(again.value.pos, 0);
        assert!(again.needs_reset);
        let fresh = int(&mut alloc);
        assert_eq!(fresh.value.pos, 2);
        assert!(!fresh.needs_reset);
    }

    #[test]
    fn test_grows_by_doubling() {
        let mut alloc = TapeAllocator::new();
        for expected in 0..TapeAllocator::INITIAL_SIZE {
            assert_eq!(int(&mut alloc).value.pos, expected);
        }
        assert_eq!(alloc.len(), TapeAllocator::INITIAL_SIZE);
        let next = int(&mut alloc);
        assert_eq!(next.value.pos, TapeAllocator::INITIAL_SIZE);
        assert!(!next.needs_reset);
        assert_eq!(alloc.len(), TapeAllocator::INITIAL_SIZE * 2);
    }

    #[test]
    fn test_double_free_is_ignored() {
        let mut alloc = TapeAllocator::new();
        let a = int(&mut alloc);
        alloc.free(a.value);
        alloc.free(a.value);
        alloc.free(Value { pos: 1000, ty: Type::Int });
        assert_eq!(alloc.state(0), CellState::Available);
        assert_eq!(alloc.taken(), 0);
    }

    #[test]
    fn test_only_ints_fit_on_the_tape() {
        let mut alloc = TapeAllocator::new();
        assert_eq!(alloc.allocate(Type::Str), Err(AllocationError::UnsupportedType(Type::Str)));
        assert_eq!(alloc.allocate(Type::Void), Err(AllocationError::UnsupportedType(Type::Void)));
        assert_eq!(alloc.taken(), 0);
    }
}
