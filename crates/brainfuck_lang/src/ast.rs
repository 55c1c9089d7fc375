//! Typed syntax tree produced by the parser.
//!
//! Types are resolved while parsing, so every [`Node`] that exists already type-checked.
//! Comparisons the code generator has no direct algorithm for are lowered by the parser:
//! `a == b` is `!(a != b)`, `a > b` is `!(a <= b)` and `a >= b` is `!(a < b)`.

use crate::{interner::Symbol, token::Token};
use std::fmt;

/// Static type of an expression or declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Int,
    Str,
    Void,
    Error,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Int => "int",
            Self::Str => "str",
            Self::Void => "void",
            Self::Error => "<error>",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Negate,
    Not,
}

impl UnaryOp {
    pub const fn result_type(self, operand: Type) -> Type {
        match (self, operand) {
            (Self::Plus | Self::Negate, Type::Int) | (Self::Not, Type::Int | Type::Str) => {
                Type::Int
            }
            _ => Type::Error,
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plus => "+",
            Self::Negate => "-",
            Self::Not => "!",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    NotEqual,
    Less,
    LessEqual,
}

impl BinaryOp {
    pub const fn result_type(self, lhs: Type, rhs: Type) -> Type {
        use Type::{Int, Str};
        match (self, lhs, rhs) {
            (Self::Add | Self::Sub | Self::Mul | Self::Div | Self::And | Self::Or, Int, Int)
            | (Self::NotEqual | Self::Less | Self::LessEqual, Int, Int)
            | (Self::NotEqual | Self::Less | Self::LessEqual, Str, Str) => Int,
            (Self::Add | Self::And | Self::Or, Str, Str)
            | (Self::Mul, Str, Int)
            | (Self::Mul, Int, Str) => Str,
            _ => Type::Error,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::And => "&&",
            Self::Or => "||",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    /// Whether a variable of type `target` may be updated with a value of type `value`.
    pub const fn accepts(self, target: Type, value: Type) -> bool {
        matches!(
            (self, target, value),
            (Self::Set | Self::Add, Type::Int, Type::Int)
                | (Self::Set | Self::Add, Type::Str, Type::Str)
                | (Self::Sub | Self::Mul | Self::Div, Type::Int, Type::Int)
                | (Self::Mul, Type::Str, Type::Int)
        )
    }
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Set => "=",
            Self::Add => "+=",
            Self::Sub => "-=",
            Self::Mul => "*=",
            Self::Div => "/=",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// The token the node was built from, kept for diagnostics.
    pub token: Token,
    pub ty: Type,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Int(i64),
    /// String literal; the symbol is the lexeme including its quotes.
    Str(Symbol),
    Variable(Symbol),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Call(Symbol, Vec<Node>),
    Assign(AssignOp, Symbol, Box<Node>),
    Block(Vec<Node>),
    If(Box<Node>, Box<Node>, Option<Box<Node>>),
    While(Box<Node>, Box<Node>),
    /// Body first, then condition.
    DoWhile(Box<Node>, Box<Node>),
    /// The declared type is the node's `ty`.
    Declare(Symbol, Option<Box<Node>>),
    Nop,
}

impl Node {
    pub const fn new(token: Token, ty: Type, kind: NodeKind) -> Self {
        Self { token, ty, kind }
    }

    /// The integer value of a literal node.
    pub const fn literal(&self) -> Option<i64> {
        match self.kind {
            NodeKind::Int(value) => Some(value),
            _ => None,
        }
    }

    /// Whether evaluating this subtree reads `name`.
    pub fn reads(&self, name: Symbol) -> bool {
        match &self.kind {
            NodeKind::Variable(var) => *var == name,
            NodeKind::Int(_) | NodeKind::Str(_) | NodeKind::Nop => false,
            NodeKind::Unary(_, operand) => operand.reads(name),
            NodeKind::Binary(_, lhs, rhs) | NodeKind::While(lhs, rhs) => {
                lhs.reads(name) || rhs.reads(name)
            }
            NodeKind::DoWhile(body, cond) => body.reads(name) || cond.reads(name),
            NodeKind::Call(_, args) | NodeKind::Block(args) => args.iter().any(|n| n.reads(name)),
            NodeKind::Assign(_, var, value) => *var == name || value.reads(name),
            NodeKind::If(cond, then, otherwise) => {
                cond.reads(name)
                    || then.reads(name)
                    || otherwise.as_ref().is_some_and(|n| n.reads(name))
            }
            NodeKind::Declare(_, init) => init.as_ref().is_some_and(|n| n.reads(name)),
        }
    }

    /// Short name of the construct, for diagnostics.
    pub fn describe(&self) -> String {
        match &self.kind {
            NodeKind::Int(_) => "integer literal".to_owned(),
            NodeKind::Str(_) => "string literal".to_owned(),
            NodeKind::Variable(_) => "variable".to_owned(),
            NodeKind::Unary(op, _) => format!("unary `{op}`"),
            NodeKind::Binary(op, _, _) => format!("binary `{op}`"),
            NodeKind::Call(..) => "call".to_owned(),
            NodeKind::Assign(op, ..) => format!("assignment `{op}`"),
            NodeKind::Block(_) => "block".to_owned(),
            NodeKind::If(..) => "if statement".to_owned(),
            NodeKind::While(..) => "while loop".to_owned(),
            NodeKind::DoWhile(..) => "do-while loop".to_owned(),
            NodeKind::Declare(..) => "declaration".to_owned(),
            NodeKind::Nop => "empty statement".to_owned(),
        }
    }
}
