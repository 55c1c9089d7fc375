//! Tape primitives and the runtime arithmetic built from them.
//!
//! Every routine here leaves the scratch cells it allocates at zero before releasing them, so a
//! freed cell inside a loop body is clean again on the next iteration.

use super::{CodeGenerator, Target};
use crate::error::CompileError;

/// Reduces `amount` modulo 256 to the shortest signed delta.
const fn wrap(amount: i64) -> isize {
    let amount = amount.rem_euclid(256);
    (if amount >= 128 { amount - 256 } else { amount }) as isize
}

impl CodeGenerator {
    /// Moves the tape pointer to `pos`.
    pub(super) fn seek(&mut self, pos: usize) {
        self.program.emit_shift(pos as isize - self.position as isize);
        self.position = pos;
    }

    /// Adds `amount` (mod 256) to the cell at `pos`.
    pub(super) fn add(&mut self, pos: usize, amount: i64) {
        let amount = wrap(amount);
        if amount != 0 {
            self.seek(pos);
            self.program.emit_delta(amount);
        }
    }

    pub(super) fn output(&mut self, pos: usize) {
        self.seek(pos);
        self.program.emit_output();
    }

    pub(super) fn input(&mut self, pos: usize) {
        self.seek(pos);
        self.program.emit_input();
    }

    /// Opens a loop testing `pos`. The matching [`Self::close_loop`] must name the same cell.
    pub(super) fn open_loop(&mut self, pos: usize) {
        self.seek(pos);
        self.program.open_bracket();
        self.nonlinear += 1;
    }

    pub(super) fn close_loop(&mut self, pos: usize) -> Result<(), CompileError> {
        self.seek(pos);
        self.program.close_bracket()?;
        self.nonlinear = self.nonlinear.saturating_sub(1);
        Ok(())
    }

    /// Empties `source`, adding `weight × source` to every target.
    pub(super) fn transfer(&mut self, source: usize, targets: &[Target]) -> Result<(), CompileError> {
        for target in targets {
            if target.pos == source {
                tracing::warn!("transfer from cell {source} onto itself");
            }
            if wrap(target.weight) == 0 {
                tracing::warn!("transfer from cell {source} to cell {} with zero weight", target.pos);
            }
        }

        self.open_loop(source);
        for target in targets {
            self.add(target.pos, target.weight);
        }
        self.add(source, -1);
        self.close_loop(source)
    }

    /// `[-]`
    pub(super) fn reset(&mut self, pos: usize) -> Result<(), CompileError> {
        self.transfer(pos, &[])
    }

    /// Like [`Self::transfer`] but `source` keeps its value.
    pub(super) fn duplicate(&mut self, source: usize, targets: &[Target]) -> Result<(), CompileError> {
        let scratch = self.temp()?;
        let mut all = targets.to_vec();
        all.push(Target::new(scratch, 1));
        self.transfer(source, &all)?;
        self.transfer(scratch, &[Target::new(source, 1)])?;
        self.release(scratch);
        Ok(())
    }

    /// Empties `source`, adding `weight` to the target when it held anything but zero.
    pub(super) fn booleanize(&mut self, source: usize, target: Target) -> Result<(), CompileError> {
        self.open_loop(source);
        self.reset(source)?;
        self.add(target.pos, target.weight);
        self.close_loop(source)
    }

    /// `target += x × y`. Empties `x` and leaves `y` as it was.
    pub(super) fn multiply(&mut self, target: Target, x: usize, y: usize) -> Result<(), CompileError> {
        let clone = self.temp()?;
        self.open_loop(x);
        self.add(x, -1);
        self.transfer(y, &[target, Target::new(clone, 1)])?;
        self.transfer(clone, &[Target::new(y, 1)])?;
        self.close_loop(x)?;
        self.release(clone);
        Ok(())
    }

    /// Adds `weight` to the target when `a < b`, comparing unsigned bytes. Empties both.
    ///
    /// Both are counted down together; if `a` runs out while `b` still has something left,
    /// `a` was the smaller one.
    pub(super) fn less(&mut self, a: usize, b: usize, target: Target) -> Result<(), CompileError> {
        let exhausted = self.temp()?;
        let probe = self.temp()?;

        self.open_loop(b);
        self.add(exhausted, 1);
        self.duplicate(a, &[Target::new(probe, 1)])?;

        self.open_loop(probe);
        self.reset(probe)?;
        self.add(exhausted, -1);
        self.add(a, -1);
        self.add(b, -1);
        self.close_loop(probe)?;

        self.open_loop(exhausted);
        self.add(exhausted, -1);
        self.add(target.pos, target.weight);
        self.reset(b)?;
        self.close_loop(exhausted)?;
        self.close_loop(b)?;

        self.reset(a)?;
        self.release(exhausted);
        self.release(probe);
        Ok(())
    }

    /// Long division by repeated subtraction: adds `weight × (n / d)` to the quotient target
    /// and `n % d` to the (zeroed) remainder cell. Empties `n` and leaves `d` as it was.
    ///
    /// Dividing by zero gives a quotient of `n / 256`, which is always 0 for a byte.
    pub(super) fn divmod(
        &mut self,
        n: usize,
        d: usize,
        quotient: Target,
        remainder: usize,
    ) -> Result<(), CompileError> {
        let countdown = self.temp()?;
        let wrapped = self.temp()?;
        let probe = self.temp()?;
        self.duplicate(d, &[Target::new(countdown, 1)])?;

        self.open_loop(n);
        self.add(n, -1);
        self.add(remainder, 1);
        self.add(countdown, -1);
        self.add(wrapped, 1);
        self.duplicate(countdown, &[Target::new(probe, 1)])?;
        self.open_loop(probe);
        self.reset(probe)?;
        self.add(wrapped, -1);
        self.close_loop(probe)?;

        // The countdown hit zero: one more whole `d` fits.
        self.open_loop(wrapped);
        self.add(wrapped, -1);
        self.add(quotient.pos, quotient.weight);
        self.reset(remainder)?;
        self.duplicate(d, &[Target::new(countdown, 1)])?;
        self.close_loop(wrapped)?;
        self.close_loop(n)?;

        self.reset(countdown)?;
        self.release(countdown);
        self.release(wrapped);
        self.release(probe);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainfuck_vm::test_helper::create_test_machine;

    /// Runs the generated code and returns the tape.
    fn run(generator: CodeGenerator) -> Vec<u8> {
        let program = generator.finish().unwrap();
        let (mut machine, _) = create_test_machine(&program, &[]);
        machine.execute().unwrap();
        machine.memory().to_vec()
    }

    fn with_cells(values: &[u8]) -> (CodeGenerator, Vec<usize>) {
        let mut generator = CodeGenerator::new(&[]);
        let cells: Vec<_> = values
            .iter()
            .map(|&value| {
                let pos = generator.temp().unwrap();
                generator.add(pos, i64::from(value));
                pos
            })
            .collect();
        (generator, cells)
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap(0), 0);
        assert_eq!(wrap(127), 127);
        assert_eq!(wrap(128), -128);
        assert_eq!(wrap(255), -1);
        assert_eq!(wrap(256), 0);
        assert_eq!(wrap(-3), -3);
        assert_eq!(wrap(-300), -44);
    }

    #[test]
    fn test_seek_tracks_position() {
        let mut generator = CodeGenerator::new(&[]);
        generator.seek(5);
        generator.add(5, 1);
        generator.seek(2);
        assert_eq!(generator.position, 2);
        let memory = run(generator);
        assert_eq!(memory[5], 1);
    }

    #[test]
    fn test_transfer_with_weights() {
        let (mut generator, cells) = with_cells(&[7, 0, 1]);
        generator
            .transfer(cells[0], &[Target::new(cells[1], 3), Target::new(cells[2], -1)])
            .unwrap();
        let memory = run(generator);
        assert_eq!(&memory[..3], &[0, 21, 1u8.wrapping_sub(7)]);
    }

    #[test]
    fn test_duplicate_keeps_source() {
        let (mut generator, cells) = with_cells(&[9, 1]);
        generator.duplicate(cells[0], &[Target::new(cells[1], 2)]).unwrap();
        assert_eq!(generator.memory.taken(), 2);
        let memory = run(generator);
        assert_eq!(&memory[..3], &[9, 19, 0]);
    }

    #[test]
    fn test_booleanize() {
        for (value, expected) in [(0, 0), (1, 4), (200, 4)] {
            let (mut generator, cells) = with_cells(&[value, 0]);
            generator.booleanize(cells[0], Target::new(cells[1], 4)).unwrap();
            assert_eq!(&run(generator)[..2], &[0, expected]);
        }
    }

    #[test]
    fn test_multiply() {
        for (x, y) in [(3, 4), (0, 9), (9, 0), (16, 16), (255, 2)] {
            let (mut generator, cells) = with_cells(&[x, y, 1]);
            generator.multiply(Target::new(cells[2], 1), cells[0], cells[1]).unwrap();
            let memory = run(generator);
            assert_eq!(&memory[..4], &[0, y, x.wrapping_mul(y).wrapping_add(1), 0], "{x} * {y}");
        }
    }

    #[test]
    fn test_less() {
        for (a, b) in [(0, 0), (0, 1), (1, 0), (3, 3), (2, 3), (3, 2), (0, 255), (255, 255)] {
            let (mut generator, cells) = with_cells(&[a, b, 0]);
            generator.less(cells[0], cells[1], Target::new(cells[2], 1)).unwrap();
            let memory = run(generator);
            let expected = u8::from(a < b);
            assert_eq!(&memory[..6], &[0, 0, expected, 0, 0, 0], "{a} < {b}");
        }
    }

    #[test]
    fn test_divmod() {
        for (n, d) in [(7, 3), (12, 4), (0, 5), (5, 7), (255, 10), (255, 1), (9, 0)] {
            let (mut generator, cells) = with_cells(&[n, d, 0, 0]);
            generator.divmod(cells[0], cells[1], Target::new(cells[2], 1), cells[3]).unwrap();
            let memory = run(generator);
            let (q, r) = if d == 0 { (0, n) } else { (n / d, n % d) };
            assert_eq!(&memory[..4], &[0, d, q, r], "{n} / {d}");
            assert!(memory[4..].iter().all(|&cell| cell == 0), "{n} / {d} left scratch behind");
        }
    }
}
