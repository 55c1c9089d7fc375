use crate::token::Location;
use brainfuck_vm::bytecode::BytecodeError;
use thiserror::Error;

/// Everything that can go wrong between source text and bytecode.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("{location}: lexical error: unexpected character `{found}`")]
    Lexical { location: Location, found: char },
    #[error("{location}: syntax error: {message}")]
    Syntax { location: Location, message: String },
    #[error("{location}: name error: {message}")]
    Name { location: Location, message: String },
    #[error("{location}: type error: {message}")]
    Type { location: Location, message: String },
    #[error("{location}: unsupported: {message}")]
    Unsupported { location: Location, message: String },
    #[error("Bytecode error: {0}")]
    Bytecode(#[from] BytecodeError),
    #[error("{} errors during compilation", .0.len())]
    Diagnostics(Vec<CompileError>),
}

impl CompileError {
    pub fn syntax(location: Location, message: impl Into<String>) -> Self {
        Self::Syntax { location, message: message.into() }
    }

    pub fn name(location: Location, message: impl Into<String>) -> Self {
        Self::Name { location, message: message.into() }
    }

    pub fn type_error(location: Location, message: impl Into<String>) -> Self {
        Self::Type { location, message: message.into() }
    }

    pub fn unsupported(location: Location, message: impl Into<String>) -> Self {
        Self::Unsupported { location, message: message.into() }
    }

    /// Folds a list of diagnostics into one error. A single diagnostic is returned as is.
    pub fn from_diagnostics(mut errors: Vec<Self>) -> Self {
        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }
        Self::Diagnostics(errors)
    }

    /// Flattens nested aggregates into the individual diagnostics.
    pub fn into_diagnostics(self) -> Vec<Self> {
        match self {
            Self::Diagnostics(errors) => {
                errors.into_iter().flat_map(Self::into_diagnostics).collect()
            }
            other => vec![other],
        }
    }

    /// Where in the source the problem is, when it has a position.
    pub const fn location(&self) -> Option<Location> {
        match self {
            Self::Lexical { location, .. }
            | Self::Syntax { location, .. }
            | Self::Name { location, .. }
            | Self::Type { location, .. }
            | Self::Unsupported { location, .. } => Some(*location),
            Self::Bytecode(_) | Self::Diagnostics(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_location() {
        let err = CompileError::type_error(Location::new(3, 7), "can't cast to boolean");
        assert_eq!(err.to_string(), "3:7: type error: can't cast to boolean");
        let err = CompileError::Lexical { location: Location::new(1, 2), found: '$' };
        assert_eq!(err.to_string(), "1:2: lexical error: unexpected character `$`");
    }

    #[test]
    fn test_diagnostics_folding() {
        let one = CompileError::syntax(Location::new(1, 1), "expected `;`");
        assert_eq!(CompileError::from_diagnostics(vec![one.clone()]), one);

        let two = CompileError::name(Location::new(2, 1), "undefined identifier `x`");
        let folded = CompileError::from_diagnostics(vec![one.clone(), two.clone()]);
        assert_eq!(folded.to_string(), "2 errors during compilation");
        assert_eq!(folded.location(), None);

        let nested = CompileError::Diagnostics(vec![folded, one.clone()]);
        assert_eq!(nested.into_diagnostics(), vec![one.clone(), two, one]);
    }

    #[test]
    fn test_bytecode_error_converts() {
        let err: CompileError = BytecodeError::UnmatchedClose.into();
        assert_eq!(err, CompileError::Bytecode(BytecodeError::UnmatchedClose));
    }
}
