//! Packed bytecode.
//!
//! A program is a stream of units, each introduced by a control byte holding a [`Mode`] in its
//! low three bits and a 5-bit length above it:
//!
//! | mode                  | length         | followed by                         |
//! |-----------------------|----------------|-------------------------------------|
//! | [`Mode::Compute`]     | number of pairs| `length` pairs of `(shift, delta)`  |
//! | [`Mode::End`]         | unused         | nothing                             |
//! | [`Mode::Input`]       | unused         | nothing                             |
//! | [`Mode::Output`]      | unused         | nothing                             |
//! | short jumps           | jump distance  | nothing                             |
//! | long jumps            | unused         | [`OFFSET_SIZE`] bytes of distance   |
//!
//! Jump distances are byte counts measured from just past the control byte. Long distances are
//! stored as a raw native-endian `usize`, so packed programs are not portable between targets
//! with different pointer widths or byte orders.

use crate::instruction::InstructionType;
use std::fmt;
use thiserror::Error;

/// Largest value the 5-bit length field can hold.
pub const MAX_LENGTH: u8 = 31;

/// Size of the distance field following a long jump.
pub const OFFSET_SIZE: usize = std::mem::size_of::<usize>();

/// Structural problems with a bytecode stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BytecodeError {
    /// A bracket was closed while none was open.
    #[error("Unmatched closing bracket")]
    UnmatchedClose,

    /// The program was finished with brackets still open.
    #[error("{0} bracket(s) left open at end of program")]
    UnclosedBracket(usize),

    /// A unit's operands run past the end of the stream.
    #[error("Truncated unit at byte {0}")]
    Truncated(usize),

    /// A jump lands outside of the stream.
    #[error("Jump at byte {0} lands outside of the program")]
    InvalidJump(usize),

    /// A jump lands in the middle of another unit's operands.
    #[error("Jump at byte {0} lands inside another unit")]
    MisalignedJump(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Compute = 0,
    End = 1,
    Input = 2,
    Output = 3,
    ShortJumpForward = 4,
    LongJumpForward = 5,
    ShortJumpBackward = 6,
    LongJumpBackward = 7,
}

impl Mode {
    /// Extracts the mode of a control byte.
    pub const fn of(control: u8) -> Self {
        match control & 0b111 {
            0 => Self::Compute,
            1 => Self::End,
            2 => Self::Input,
            3 => Self::Output,
            4 => Self::ShortJumpForward,
            5 => Self::LongJumpForward,
            6 => Self::ShortJumpBackward,
            _ => Self::LongJumpBackward,
        }
    }

    /// Packs this mode and a length into a control byte.
    pub const fn control(self, length: u8) -> u8 {
        debug_assert!(length <= MAX_LENGTH);
        self as u8 | (length << 3)
    }
}

/// Extracts the length field of a control byte.
pub const fn length_of(control: u8) -> u8 {
    control >> 3
}

/// A decoded unit, borrowing its operands from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit<'a> {
    /// Raw `(shift, delta)` pairs, two bytes each.
    Compute(&'a [u8]),
    End,
    Input,
    Output,
    JumpForward { distance: usize, long: bool },
    JumpBackward { distance: usize, long: bool },
}

impl Unit<'_> {
    /// Iterates over the `(shift, delta)` pairs of a compute unit.
    pub fn pairs(&self) -> impl Iterator<Item = (i8, i8)> + '_ {
        let bytes: &[u8] = match self {
            Unit::Compute(bytes) => *bytes,
            _ => &[],
        };
        bytes.chunks_exact(2).map(|pair| (pair[0] as i8, pair[1] as i8))
    }
}

impl fmt::Display for Unit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compute(_) => {
                write!(f, "compute")?;
                for (shift, delta) in self.pairs() {
                    write!(f, " ({shift:+}, {delta:+})")?;
                }
                Ok(())
            }
            Self::End => write!(f, "end"),
            Self::Input => write!(f, "in"),
            Self::Output => write!(f, "out"),
            Self::JumpForward { distance, long } => {
                write!(f, "jz{} +{distance}", if *long { ".long" } else { "" })
            }
            Self::JumpBackward { distance, long } => {
                write!(f, "jnz{} -{distance}", if *long { ".long" } else { "" })
            }
        }
    }
}

fn read_offset(code: &[u8], at: usize) -> Result<usize, BytecodeError> {
    let bytes = code.get(at + 1..at + 1 + OFFSET_SIZE).ok_or(BytecodeError::Truncated(at))?;
    let bytes: [u8; OFFSET_SIZE] = bytes.try_into().map_err(|_| BytecodeError::Truncated(at))?;
    Ok(usize::from_ne_bytes(bytes))
}

/// Decodes the unit starting at `at`, returning it with the offset of the unit that follows.
pub fn decode_unit(code: &[u8], at: usize) -> Result<(Unit<'_>, usize), BytecodeError> {
    let control = *code.get(at).ok_or(BytecodeError::Truncated(at))?;
    let length = usize::from(length_of(control));
    let decoded = match Mode::of(control) {
        Mode::Compute => {
            let end = at + 1 + 2 * length;
            let pairs = code.get(at + 1..end).ok_or(BytecodeError::Truncated(at))?;
            (Unit::Compute(pairs), end)
        }
        Mode::End => (Unit::End, at + 1),
        Mode::Input => (Unit::Input, at + 1),
        Mode::Output => (Unit::Output, at + 1),
        Mode::ShortJumpForward => (Unit::JumpForward { distance: length, long: false }, at + 1),
        Mode::ShortJumpBackward => (Unit::JumpBackward { distance: length, long: false }, at + 1),
        Mode::LongJumpForward => (
            Unit::JumpForward { distance: read_offset(code, at)?, long: true },
            at + 1 + OFFSET_SIZE,
        ),
        Mode::LongJumpBackward => (
            Unit::JumpBackward { distance: read_offset(code, at)?, long: true },
            at + 1 + OFFSET_SIZE,
        ),
    };
    Ok(decoded)
}

/// Where a jump at `at` lands when taken.
pub fn jump_target(unit: &Unit<'_>, at: usize) -> Result<usize, BytecodeError> {
    match *unit {
        Unit::JumpForward { distance, .. } => {
            (at + 1).checked_add(distance).ok_or(BytecodeError::InvalidJump(at))
        }
        Unit::JumpBackward { distance, .. } => {
            (at + 1).checked_sub(distance).ok_or(BytecodeError::InvalidJump(at))
        }
        _ => Ok(at),
    }
}

/// Iterator over the units of a stream, yielding each with its offset.
#[derive(Debug, Clone)]
pub struct Units<'a> {
    code: &'a [u8],
    at: usize,
}

impl<'a> Iterator for Units<'a> {
    type Item = Result<(usize, Unit<'a>), BytecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.at >= self.code.len() {
            return None;
        }
        let at = self.at;
        match decode_unit(self.code, at) {
            Ok((unit, next)) => {
                self.at = next;
                Some(Ok((at, unit)))
            }
            Err(err) => {
                self.at = self.code.len();
                Some(Err(err))
            }
        }
    }
}

/// A finished program, terminated by an END unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    code: Vec<u8>,
}

impl Program {
    pub(crate) const fn from_raw(code: Vec<u8>) -> Self {
        Self { code }
    }

    /// Loads a packed program, checking that every unit is complete and every jump lands on
    /// the start of a unit or just past the end of the stream.
    pub fn from_bytes(code: Vec<u8>) -> Result<Self, BytecodeError> {
        let mut starts = Vec::new();
        let mut jumps = Vec::new();
        for unit in (Units { code: &code, at: 0 }) {
            let (at, unit) = unit?;
            starts.push(at);
            if matches!(unit, Unit::JumpForward { .. } | Unit::JumpBackward { .. }) {
                jumps.push((at, jump_target(&unit, at)?));
            }
        }
        starts.push(code.len());

        for (at, target) in jumps {
            if target > code.len() {
                return Err(BytecodeError::InvalidJump(at));
            }
            if starts.binary_search(&target).is_err() {
                return Err(BytecodeError::MisalignedJump(at));
            }
        }
        Ok(Self { code })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.code
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn units(&self) -> Units<'_> {
        Units { code: self.code.as_slice(), at: 0 }
    }

    /// Expands the program back into textual Brainfuck, up to its END unit.
    pub fn to_brainfuck(&self) -> Result<String, BytecodeError> {
        let mut text = String::new();
        for unit in self.units() {
            let (_, unit) = unit?;
            match unit {
                Unit::Compute(_) => {
                    for (shift, delta) in unit.pairs() {
                        let step =
                            if shift < 0 { InstructionType::Left } else { InstructionType::Right };
                        push_repeated(&mut text, &step, shift.unsigned_abs());
                        let step =
                            if delta < 0 { InstructionType::Minus } else { InstructionType::Plus };
                        push_repeated(&mut text, &step, delta.unsigned_abs());
                    }
                }
                Unit::End => break,
                Unit::Input => text.push(InstructionType::ReadChar.as_char()),
                Unit::Output => text.push(InstructionType::PutChar.as_char()),
                Unit::JumpForward { .. } => text.push(InstructionType::JumpIfZero.as_char()),
                Unit::JumpBackward { .. } => text.push(InstructionType::JumpIfNotZero.as_char()),
            }
        }
        Ok(text)
    }
}

fn push_repeated(text: &mut String, ins: &InstructionType, count: u8) {
    text.extend(std::iter::repeat(ins.as_char()).take(usize::from(count)));
}

/// Disassembly listing, one unit per line.
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for unit in self.units() {
            match unit {
                Ok((at, unit)) => writeln!(f, "{at:>6}  {unit}")?,
                Err(err) => writeln!(f, "        <{err}>")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_byte_layout() {
        assert_eq!(Mode::Compute.control(3), 0b0001_1000);
        assert_eq!(Mode::ShortJumpBackward.control(MAX_LENGTH), 0b1111_1110);
        assert_eq!(Mode::of(0b1111_1110), Mode::ShortJumpBackward);
        assert_eq!(length_of(0b1111_1110), 31);
        assert_eq!(Mode::of(Mode::End.control(0)), Mode::End);
    }

    #[test]
    fn test_decode_compute() {
        let code = [Mode::Compute.control(2), 1, 3, 0xFE, 0xFF, Mode::End.control(0)];
        let (unit, next) = decode_unit(&code, 0).unwrap();
        assert_eq!(next, 5);
        assert_eq!(unit.pairs().collect::<Vec<_>>(), vec![(1, 3), (-2, -1)]);
        assert_eq!(decode_unit(&code, 5).unwrap(), (Unit::End, 6));
    }

    #[test]
    fn test_decode_long_jump() {
        let mut code = vec![Mode::LongJumpForward.control(0)];
        code.extend_from_slice(&40usize.to_ne_bytes());
        let (unit, next) = decode_unit(&code, 0).unwrap();
        assert_eq!(unit, Unit::JumpForward { distance: 40, long: true });
        assert_eq!(next, 1 + OFFSET_SIZE);
        assert_eq!(jump_target(&unit, 0).unwrap(), 41);
    }

    #[test]
    fn test_truncated_units() {
        let code = [Mode::Compute.control(2), 1, 3];
        assert_eq!(decode_unit(&code, 0), Err(BytecodeError::Truncated(0)));
        let code = [Mode::LongJumpBackward.control(0), 1];
        assert_eq!(decode_unit(&code, 0), Err(BytecodeError::Truncated(0)));
    }

    #[test]
    fn test_from_bytes_rejects_wild_jumps() {
        let code = vec![Mode::ShortJumpBackward.control(5)];
        assert_eq!(Program::from_bytes(code), Err(BytecodeError::InvalidJump(0)));
        let code = vec![Mode::ShortJumpForward.control(9), Mode::End.control(0)];
        assert_eq!(Program::from_bytes(code), Err(BytecodeError::InvalidJump(0)));
    }

    #[test]
    fn test_from_bytes_rejects_jumps_into_operands() {
        // A long jump whose distance lands on its own offset bytes.
        let mut code = vec![Mode::LongJumpForward.control(0)];
        code.extend_from_slice(&0usize.to_ne_bytes());
        code.push(Mode::End.control(0));
        assert_eq!(Program::from_bytes(code), Err(BytecodeError::MisalignedJump(0)));

        let code = vec![
            Mode::ShortJumpForward.control(1),
            Mode::Compute.control(1),
            0,
            1,
            Mode::End.control(0),
        ];
        assert_eq!(Program::from_bytes(code), Err(BytecodeError::MisalignedJump(0)));
    }

    #[test]
    fn test_from_bytes_accepts_long_jump_to_unit() {
        let mut code = vec![Mode::LongJumpForward.control(0)];
        code.extend_from_slice(&OFFSET_SIZE.to_ne_bytes());
        code.push(Mode::End.control(0));
        assert!(Program::from_bytes(code).is_ok());
    }

    #[test]
    fn test_from_bytes_accepts_forward_jump_to_end() {
        // '[' whose matching ']' is the last unit
        let code = vec![Mode::ShortJumpForward.control(1), Mode::ShortJumpBackward.control(1)];
        assert!(Program::from_bytes(code).is_ok());
    }

    #[test]
    fn test_to_brainfuck_expands_pairs() {
        let program = Program::from_raw(vec![
            Mode::Compute.control(2),
            2,
            0xFD,
            0xFF,
            1,
            Mode::Output.control(0),
            Mode::End.control(0),
            Mode::Input.control(0),
        ]);
        assert_eq!(program.to_brainfuck().unwrap(), ">>---<+.");
    }

    #[test]
    fn test_disassembly() {
        let program = Program::from_raw(vec![
            Mode::ShortJumpForward.control(4),
            Mode::Compute.control(1),
            0,
            0xFF,
            Mode::ShortJumpBackward.control(4),
            Mode::End.control(0),
        ]);
        assert_eq!(
            program.to_string(),
            "     0  jz +4\n     1  compute (+0, -1)\n     4  jnz -4\n     5  end\n"
        );
    }
}
