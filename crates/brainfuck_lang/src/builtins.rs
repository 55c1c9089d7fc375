use crate::ast::Type;

/// Functions every program can call without declaring them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `print(int)`: writes the decimal value followed by a newline.
    Print,
    /// `input()`: reads one byte.
    Input,
}

impl Builtin {
    pub const ALL: [Self; 2] = [Self::Print, Self::Input];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Input => "input",
        }
    }

    pub const fn arity(self) -> usize {
        match self {
            Self::Print => 1,
            Self::Input => 0,
        }
    }

    pub const fn return_type(self) -> Type {
        match self {
            Self::Print => Type::Void,
            Self::Input => Type::Int,
        }
    }
}
