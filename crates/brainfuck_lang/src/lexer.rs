//! Source text to tokens.
//!
//! The raw scanning is done by `logos`; this module layers 1-based line/column tracking on top
//! of its byte spans, interns every lexeme, and turns scanner failures into recoverable
//! [`CompileError::Lexical`] diagnostics so one pass reports every bad character.

use crate::{
    error::CompileError,
    interner::Interner,
    token::{Location, Token, TokenKind},
};
use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum LogosToken {
    #[regex(r"[ \t\r\n]+", logos::skip)]
    Whitespace,

    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,
    #[token("{")]
    OpenBrace,
    #[token("}")]
    CloseBrace,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,

    #[token("+")]
    Plus,
    #[token("+=")]
    PlusEqual,
    #[token("-")]
    Minus,
    #[token("-=")]
    MinusEqual,
    #[token("*")]
    Star,
    #[token("*=")]
    StarEqual,
    #[token("/")]
    Slash,
    #[token("/=")]
    SlashEqual,

    #[token("=")]
    Equal,
    #[token("==")]
    EqualEqual,
    #[token("!")]
    Bang,
    #[token("!=")]
    BangEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,

    #[regex("[0-9]+")]
    Int,
    #[regex(r#""[^"]*""#)]
    Str,
    #[regex("[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,
}

impl LogosToken {
    const fn kind(self) -> TokenKind {
        match self {
            // Skipped by the scanner, never produced.
            Self::Whitespace => TokenKind::Eof,
            Self::OpenParen => TokenKind::OpenParen,
            Self::CloseParen => TokenKind::CloseParen,
            Self::OpenBrace => TokenKind::OpenBrace,
            Self::CloseBrace => TokenKind::CloseBrace,
            Self::Semicolon => TokenKind::Semicolon,
            Self::Comma => TokenKind::Comma,
            Self::Plus => TokenKind::Plus,
            Self::PlusEqual => TokenKind::PlusEqual,
            Self::Minus => TokenKind::Minus,
            Self::MinusEqual => TokenKind::MinusEqual,
            Self::Star => TokenKind::Star,
            Self::StarEqual => TokenKind::StarEqual,
            Self::Slash => TokenKind::Slash,
            Self::SlashEqual => TokenKind::SlashEqual,
            Self::Equal => TokenKind::Equal,
            Self::EqualEqual => TokenKind::EqualEqual,
            Self::Bang => TokenKind::Bang,
            Self::BangEqual => TokenKind::BangEqual,
            Self::Greater => TokenKind::Greater,
            Self::GreaterEqual => TokenKind::GreaterEqual,
            Self::Less => TokenKind::Less,
            Self::LessEqual => TokenKind::LessEqual,
            Self::AndAnd => TokenKind::AndAnd,
            Self::OrOr => TokenKind::OrOr,
            Self::Int => TokenKind::Int,
            Self::Str => TokenKind::Str,
            Self::Identifier => TokenKind::Identifier,
        }
    }
}

/// Pull-based lexer: each call to [`Lexer::next_token`] yields the next valid token, and
/// [`TokenKind::Eof`] forever once the input is exhausted.
pub struct Lexer<'src> {
    source: &'src str,
    scanner: logos::Lexer<'src, LogosToken>,
    interner: Interner,
    /// Byte offset `location` refers to.
    offset: usize,
    location: Location,
    errors: Vec<CompileError>,
}

impl std::fmt::Debug for Lexer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexer")
            .field("offset", &self.offset)
            .field("location", &self.location)
            .field("errors", &self.errors.len())
            .finish_non_exhaustive()
    }
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self::with_interner(source, Interner::new())
    }

    /// Lexes `source` into an interner that may already hold names.
    pub fn with_interner(source: &'src str, interner: Interner) -> Self {
        Self {
            source,
            scanner: LogosToken::lexer(source),
            interner,
            offset: 0,
            location: Location::new(1, 1),
            errors: Vec::new(),
        }
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            let scanned = self.scanner.next();
            let span = self.scanner.span();
            match scanned {
                None => {
                    let location = self.locate(self.source.len());
                    let text = self.interner.intern("");
                    return Token { kind: TokenKind::Eof, text, location };
                }
                Some(Ok(scanned)) => {
                    let location = self.locate(span.start);
                    let lexeme = self.scanner.slice();
                    let kind = match scanned {
                        LogosToken::Identifier => {
                            TokenKind::keyword(lexeme).unwrap_or(TokenKind::Identifier)
                        }
                        other => other.kind(),
                    };
                    let text = self.interner.intern(lexeme);
                    return Token { kind, text, location };
                }
                Some(Err(())) => {
                    let location = self.locate(span.start);
                    let first = self.source.get(span.start..).and_then(|rest| rest.chars().next());
                    let found = first.unwrap_or(char::REPLACEMENT_CHARACTER);
                    tracing::debug!("{location}: skipping unexpected character {found:?}");
                    self.errors.push(CompileError::Lexical { location, found });

                    // A failed match such as an unterminated string may have consumed more
                    // than the offending character; rescan from just after it.
                    if let Some(first) = first {
                        let resume = span.start + first.len_utf8();
                        if span.end > resume {
                            self.resume_at(resume);
                        }
                    }
                }
            }
        }
    }

    /// Lexical errors found since the last call.
    pub fn take_errors(&mut self) -> Vec<CompileError> {
        std::mem::take(&mut self.errors)
    }

    pub const fn interner(&self) -> &Interner {
        &self.interner
    }

    pub fn interner_mut(&mut self) -> &mut Interner {
        &mut self.interner
    }

    pub fn into_interner(self) -> Interner {
        self.interner
    }

    /// Restarts scanning at byte `offset`, which must lie on a character boundary.
    fn resume_at(&mut self, offset: usize) {
        let mut scanner = LogosToken::lexer(self.source);
        scanner.bump(offset);
        self.scanner = scanner;
    }

    /// Advances the line/column bookkeeping to byte `offset`, which never moves backwards.
    fn locate(&mut self, offset: usize) -> Location {
        let skipped = self.source.as_bytes().get(self.offset..offset).unwrap_or_default();
        for &byte in skipped {
            if byte == b'\n' {
                self.location.line += 1;
                self.location.column = 1;
            } else if byte & 0xC0 != 0x80 {
                // Continuation bytes belong to the character already counted.
                self.location.column += 1;
            }
        }
        self.offset = self.offset.max(offset);
        self.location
    }
}
