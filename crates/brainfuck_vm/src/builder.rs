//! Incremental construction of [`Program`]s.
//!
//! Pointer moves and cell increments are fused into `(shift, delta)` pairs while they are
//! emitted. Pairs that cancel out are dropped, so the pair list only depends on the net effect
//! of the emitted moves. Once a non-compute unit is needed the pending pairs are flushed as
//! compute units of at most 31 pairs each. Each open bracket gets its own scratch buffer;
//! closing it resolves both jump distances from the body length and splices the body into the
//! enclosing buffer, so no second pass over the program is ever needed.

use crate::bytecode::{BytecodeError, Mode, Program, MAX_LENGTH, OFFSET_SIZE};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Pair {
    shift: i8,
    delta: i8,
}

/// Whether `value` can move further in the direction of `amount`.
const fn has_room(value: i8, amount: isize) -> bool {
    if amount > 0 {
        value < i8::MAX
    } else {
        value > i8::MIN
    }
}

/// Adds as much of `amount` to `slot` as fits in an `i8`, returning the remainder.
fn absorb(slot: &mut i8, amount: isize) -> isize {
    let current = isize::from(*slot);
    let total = (current + amount).clamp(isize::from(i8::MIN), isize::from(i8::MAX));
    *slot = total as i8;
    amount - (total - current)
}

#[derive(Debug, Default)]
struct Chunk {
    code: Vec<u8>,
    run: Vec<Pair>,
}

impl Chunk {
    fn flush(&mut self) {
        let max = usize::from(MAX_LENGTH);
        if self.run.len() > max {
            tracing::debug!(
                "run of {} pairs exceeds one compute unit, splitting into {}",
                self.run.len(),
                self.run.len().div_ceil(max)
            );
        }
        for pairs in self.run.chunks(usize::from(MAX_LENGTH)) {
            self.code.push(Mode::Compute.control(pairs.len() as u8));
            for pair in pairs {
                self.code.push(pair.shift as u8);
                self.code.push(pair.delta as u8);
            }
        }
        self.run.clear();
    }

    /// Drops the open pair if it cancelled out.
    fn settle(&mut self) {
        if self.run.last() == Some(&Pair::default()) {
            self.run.pop();
        }
    }

    fn push_unit(&mut self, control: u8) {
        self.flush();
        self.code.push(control);
    }
}

fn push_jump(code: &mut Vec<u8>, short: Mode, long: Mode, distance: usize) {
    if distance <= usize::from(MAX_LENGTH) {
        code.push(short.control(distance as u8));
    } else {
        code.push(long.control(0));
        code.extend_from_slice(&distance.to_ne_bytes());
    }
}

/// Size of the forward jumps a body starts with.
///
/// When the loop jumps back, the tested cell is still nonzero and has not moved, so these
/// jumps would all fall through and the backward jump can land after them.
fn leading_jumps(body: &[u8]) -> usize {
    let mut at = 0;
    while let Some(&control) = body.get(at) {
        match Mode::of(control) {
            Mode::ShortJumpForward => at += 1,
            Mode::LongJumpForward => at += 1 + OFFSET_SIZE,
            _ => break,
        }
    }
    at
}

#[derive(Debug, Default)]
pub struct ProgramBuilder {
    root: Chunk,
    open: Vec<Chunk>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently open brackets.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    fn current(&mut self) -> &mut Chunk {
        self.open.last_mut().unwrap_or(&mut self.root)
    }

    /// Moves the tape pointer by `amount` cells.
    pub fn emit_shift(&mut self, mut amount: isize) {
        let chunk = self.current();
        while amount != 0 {
            let reusable =
                chunk.run.last().is_some_and(|pair| pair.delta == 0 && has_room(pair.shift, amount));
            if !reusable {
                chunk.run.push(Pair::default());
            }
            if let Some(pair) = chunk.run.last_mut() {
                amount = absorb(&mut pair.shift, amount);
            }
            chunk.settle();
        }
    }

    /// Adds `amount` to the current cell.
    pub fn emit_delta(&mut self, mut amount: isize) {
        let chunk = self.current();
        while amount != 0 {
            let reusable = chunk.run.last().is_some_and(|pair| has_room(pair.delta, amount));
            if !reusable {
                chunk.run.push(Pair::default());
            }
            if let Some(pair) = chunk.run.last_mut() {
                amount = absorb(&mut pair.delta, amount);
            }
            chunk.settle();
        }
    }

    pub fn emit_input(&mut self) {
        self.current().push_unit(Mode::Input.control(0));
    }

    pub fn emit_output(&mut self) {
        self.current().push_unit(Mode::Output.control(0));
    }

    /// Starts a loop body.
    pub fn open_bracket(&mut self) {
        self.current().flush();
        self.open.push(Chunk::default());
    }

    /// Closes the innermost loop, splicing it with its jumps into the enclosing buffer.
    ///
    /// Fails without touching the builder when no bracket is open.
    pub fn close_bracket(&mut self) -> Result<(), BytecodeError> {
        let mut body = self.open.pop().ok_or(BytecodeError::UnmatchedClose)?;
        body.flush();
        let body = body.code;

        let mut forward = body.len() + 1;
        let backward = body.len() + 1 - leading_jumps(&body);
        if backward > usize::from(MAX_LENGTH) {
            forward += OFFSET_SIZE;
        }
        if forward > usize::from(MAX_LENGTH) {
            forward += OFFSET_SIZE;
        }

        let parent = self.current();
        parent.flush();
        push_jump(&mut parent.code, Mode::ShortJumpForward, Mode::LongJumpForward, forward);
        parent.code.extend_from_slice(&body);
        push_jump(&mut parent.code, Mode::ShortJumpBackward, Mode::LongJumpBackward, backward);
        Ok(())
    }

    /// Terminates the program with an END unit.
    pub fn finish(mut self) -> Result<Program, BytecodeError> {
        if !self.open.is_empty() {
            return Err(BytecodeError::UnclosedBracket(self.open.len()));
        }
        self.root.push_unit(Mode::End.control(0));
        Ok(Program::from_raw(self.root.code))
    }
}
