use crate::{builder::ProgramBuilder, bytecode::BytecodeError};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

/// Custom error type for instructions
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstructionError {
    /// Error when converting a character to an instruction
    #[error("Value `{0}` is not a valid instruction")]
    Conversion(char),
}

/// The eight commands of textual Brainfuck.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum InstructionType {
    /// '>': move one cell right.
    Right,
    /// '<': move one cell left.
    Left,
    /// '+': add one to the current cell, wrapping at 256.
    Plus,
    /// '-': subtract one from the current cell, wrapping at 0.
    Minus,
    /// '.': write the current cell.
    PutChar,
    /// ',': read one byte into the current cell.
    ReadChar,
    /// '[': skip past the matching ']' when the current cell is zero.
    JumpIfZero,
    /// ']': go back past the matching '[' when the current cell is nonzero.
    JumpIfNotZero,
}

impl InstructionType {
    pub const fn as_char(&self) -> char {
        match self {
            Self::Right => '>',
            Self::Left => '<',
            Self::Plus => '+',
            Self::Minus => '-',
            Self::PutChar => '.',
            Self::ReadChar => ',',
            Self::JumpIfZero => '[',
            Self::JumpIfNotZero => ']',
        }
    }

    /// Appends this command to a program under construction.
    pub fn emit(&self, builder: &mut ProgramBuilder) -> Result<(), BytecodeError> {
        match self {
            Self::Right => builder.emit_shift(1),
            Self::Left => builder.emit_shift(-1),
            Self::Plus => builder.emit_delta(1),
            Self::Minus => builder.emit_delta(-1),
            Self::PutChar => builder.emit_output(),
            Self::ReadChar => builder.emit_input(),
            Self::JumpIfZero => builder.open_bracket(),
            Self::JumpIfNotZero => builder.close_bracket()?,
        }
        Ok(())
    }
}

impl FromStr for InstructionType {
    type Err = InstructionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::try_from(c),
            (Some(c), Some(_)) => Err(InstructionError::Conversion(c)),
            (None, _) => Err(InstructionError::Conversion('\0')),
        }
    }
}

impl Display for InstructionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl TryFrom<char> for InstructionType {
    type Error = InstructionError;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value {
            '>' => Ok(Self::Right),
            '<' => Ok(Self::Left),
            '+' => Ok(Self::Plus),
            '-' => Ok(Self::Minus),
            '.' => Ok(Self::PutChar),
            ',' => Ok(Self::ReadChar),
            '[' => Ok(Self::JumpIfZero),
            ']' => Ok(Self::JumpIfNotZero),
            _ => Err(InstructionError::Conversion(value)),
        }
    }
}

impl TryFrom<u8> for InstructionType {
    type Error = InstructionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from(char::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [InstructionType; 8] = [
        InstructionType::Right,
        InstructionType::Left,
        InstructionType::Plus,
        InstructionType::Minus,
        InstructionType::PutChar,
        InstructionType::ReadChar,
        InstructionType::JumpIfZero,
        InstructionType::JumpIfNotZero,
    ];

    #[test]
    fn test_instruction_type_from_str() {
        assert_eq!(InstructionType::from_str(">").unwrap(), InstructionType::Right);
        assert_eq!(InstructionType::from_str("]").unwrap(), InstructionType::JumpIfNotZero);
        for ins in ALL {
            assert_eq!(InstructionType::from_str(&ins.to_string()).unwrap(), ins);
        }
    }

    #[test]
    fn test_instruction_type_from_str_invalid() {
        assert_eq!(InstructionType::from_str("x"), Err(InstructionError::Conversion('x')));
        assert!(InstructionType::from_str("").is_err());
        assert!(InstructionType::from_str("++").is_err());
    }

    #[test]
    fn test_instruction_type_display() {
        let text: String = ALL.iter().map(ToString::to_string).collect();
        assert_eq!(text, "><+-.,[]");
    }

    #[test]
    fn test_instruction_type_from_u8() {
        assert_eq!(InstructionType::try_from(b'<').unwrap(), InstructionType::Left);
        assert_eq!(InstructionType::try_from(b',').unwrap(), InstructionType::ReadChar);
        assert_eq!(InstructionType::try_from(b'x'), Err(InstructionError::Conversion('x')));
    }

    #[test]
    fn test_emit_unmatched_close() {
        let mut builder = ProgramBuilder::new();
        assert_eq!(
            InstructionType::JumpIfNotZero.emit(&mut builder),
            Err(BytecodeError::UnmatchedClose)
        );
        InstructionType::JumpIfZero.emit(&mut builder).unwrap();
        assert_eq!(builder.depth(), 1);
    }
}
