use crate::interner::Symbol;
use std::fmt;

/// 1-based position in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    Semicolon,
    Comma,

    Plus,
    PlusEqual,
    Minus,
    MinusEqual,
    Star,
    StarEqual,
    Slash,
    SlashEqual,

    Equal,
    EqualEqual,
    Bang,
    BangEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    AndAnd,
    OrOr,

    Int,
    Str,
    Identifier,

    KwInt,
    KwStr,
    KwIf,
    KwElse,
    KwDo,
    KwWhile,

    Eof,
}

impl TokenKind {
    /// Keyword spelled by an identifier, if any.
    pub fn keyword(text: &str) -> Option<Self> {
        Some(match text {
            "int" => Self::KwInt,
            "str" => Self::KwStr,
            "if" => Self::KwIf,
            "else" => Self::KwElse,
            "do" => Self::KwDo,
            "while" => Self::KwWhile,
            _ => return None,
        })
    }
}

/// A lexeme with its interned text and where it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: Symbol,
    pub location: Location,
}
