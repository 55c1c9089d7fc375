//! Recursive-descent statement parser with a Pratt expression parser.
//!
//! Names are resolved and types are checked as nodes are built, so the tree handed to the code
//! generator is always well typed. The parser is pulled one top-level statement at a time; after
//! a bad statement it skips ahead to the next `;` or `}` and keeps going, collecting every
//! diagnostic it meets on the way.

use crate::{
    ast::{AssignOp, BinaryOp, Node, NodeKind, Type, UnaryOp},
    builtins::Builtin,
    error::CompileError,
    interner::{Interner, Symbol},
    lexer::Lexer,
    token::{Token, TokenKind},
};

/// Binding strength of infix operators, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Or,
    And,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
}

impl Precedence {
    const fn of(kind: TokenKind) -> Self {
        match kind {
            TokenKind::OrOr => Self::Or,
            TokenKind::AndAnd => Self::And,
            TokenKind::EqualEqual
            | TokenKind::BangEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual
            | TokenKind::Less
            | TokenKind::LessEqual => Self::Comparison,
            TokenKind::Plus | TokenKind::Minus => Self::Term,
            TokenKind::Star | TokenKind::Slash => Self::Factor,
            TokenKind::OpenParen => Self::Call,
            _ => Self::None,
        }
    }

    const fn next(self) -> Self {
        match self {
            Self::None => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Comparison,
            Self::Comparison => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor => Self::Unary,
            Self::Unary | Self::Call => Self::Call,
        }
    }
}

/// A name visible to the resolver.
#[derive(Debug, Clone, Copy)]
struct Record {
    name: Symbol,
    ty: Type,
    builtin: Option<Builtin>,
}

#[derive(Debug)]
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    current: Token,
    records: Vec<Record>,
    /// Index into `records` where each open scope starts.
    scopes: Vec<usize>,
    builtins: Vec<(Symbol, Builtin)>,
    errors: Vec<CompileError>,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let builtins: Vec<_> = Builtin::ALL
            .into_iter()
            .map(|builtin| (lexer.interner_mut().intern(builtin.name()), builtin))
            .collect();
        let records: Vec<_> = builtins
            .iter()
            .map(|&(name, builtin)| Record {
                name,
                ty: builtin.return_type(),
                builtin: Some(builtin),
            })
            .collect();
        let current = lexer.next_token();
        Self { lexer, current, scopes: vec![records.len()], records, builtins, errors: Vec::new() }
    }

    /// Parses the next top-level statement, or returns `None` at end of input.
    ///
    /// Any diagnostic met while parsing the statement, including lexical errors, fails the call;
    /// the parser has already recovered and can be called again.
    pub fn parse_statement(&mut self) -> Result<Option<Node>, CompileError> {
        let parsed = if self.current.kind == TokenKind::Eof {
            None
        } else {
            match self.statement() {
                Ok(node) => Some(node),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                    if self.current.kind == TokenKind::CloseBrace {
                        self.advance();
                    }
                    None
                }
            }
        };

        self.errors.extend(self.lexer.take_errors());
        if self.errors.is_empty() {
            return Ok(parsed);
        }
        let mut errors = std::mem::take(&mut self.errors);
        errors.sort_by_key(CompileError::location);
        Err(CompileError::from_diagnostics(errors))
    }

    /// Builtin functions and the symbols they are called by.
    pub fn builtins(&self) -> &[(Symbol, Builtin)] {
        &self.builtins
    }

    pub const fn interner(&self) -> &Interner {
        self.lexer.interner()
    }

    fn advance(&mut self) -> Token {
        let token = self.current;
        self.current = self.lexer.next_token();
        token
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.current.kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, CompileError> {
        if self.current.kind == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(self.current, what))
        }
    }

    fn text(&self, token: Token) -> &str {
        self.lexer.interner().resolve(token.text)
    }

    fn unexpected(&self, token: Token, what: &str) -> CompileError {
        let found = match token.kind {
            TokenKind::Eof => "end of input".to_owned(),
            _ => format!("`{}`", self.text(token)),
        };
        CompileError::syntax(token.location, format!("expected {what}, found {found}"))
    }

    /// Skips to just past the next `;`, or to the `}` closing the current block.
    fn synchronize(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.current.kind {
                TokenKind::Eof => return,
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::OpenBrace => depth += 1,
                TokenKind::CloseBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn resolve(&self, name: Symbol) -> Option<Record> {
        self.records.iter().rev().find(|record| record.name == name).copied()
    }

    fn declare(&mut self, token: Token, ty: Type) -> Result<(), CompileError> {
        let start = self.scopes.last().copied().unwrap_or_default();
        if self.records[start..].iter().any(|record| record.name == token.text) {
            return Err(CompileError::name(
                token.location,
                format!("`{}` is already declared in this scope", self.text(token)),
            ));
        }
        self.records.push(Record { name: token.text, ty, builtin: None });
        Ok(())
    }

    fn statement(&mut self) -> Result<Node, CompileError> {
        let token = self.current;
        match token.kind {
            TokenKind::OpenBrace => {
                self.advance();
                self.block(token)
            }
            TokenKind::KwInt | TokenKind::KwStr => {
                self.advance();
                self.declaration(token)
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(Node::new(token, Type::Void, NodeKind::Nop))
            }
            TokenKind::KwIf => {
                self.advance();
                let cond = self.condition()?;
                let then = self.body()?;
                let otherwise =
                    if self.matches(TokenKind::KwElse) { Some(Box::new(self.body()?)) } else { None };
                Ok(Node::new(token, Type::Void, NodeKind::If(Box::new(cond), Box::new(then), otherwise)))
            }
            TokenKind::KwWhile => {
                self.advance();
                let cond = self.condition()?;
                let body = self.body()?;
                Ok(Node::new(token, Type::Void, NodeKind::While(Box::new(cond), Box::new(body))))
            }
            TokenKind::KwDo => {
                self.advance();
                let body = self.body()?;
                self.expect(TokenKind::KwWhile, "`while`")?;
                let cond = self.condition()?;
                self.expect(TokenKind::Semicolon, "`;`")?;
                Ok(Node::new(token, Type::Void, NodeKind::DoWhile(Box::new(body), Box::new(cond))))
            }
            _ => self.simple_statement(),
        }
    }

    /// The statement controlled by `if`, `else`, `while` or `do`. A declaration there would
    /// outlive the code that initializes it, so it must be wrapped in a block.
    fn body(&mut self) -> Result<Node, CompileError> {
        if matches!(self.current.kind, TokenKind::KwInt | TokenKind::KwStr) {
            return Err(CompileError::syntax(
                self.current.location,
                "a declaration here must be wrapped in a block",
            ));
        }
        self.statement()
    }

    fn block(&mut self, open: Token) -> Result<Node, CompileError> {
        let start = self.records.len();
        self.scopes.push(start);

        let mut nodes = Vec::new();
        while !matches!(self.current.kind, TokenKind::CloseBrace | TokenKind::Eof) {
            match self.statement() {
                Ok(node) => nodes.push(node),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }

        self.scopes.pop();
        self.records.truncate(start);
        self.expect(TokenKind::CloseBrace, "`}`")?;
        Ok(Node::new(open, Type::Void, NodeKind::Block(nodes)))
    }

    fn declaration(&mut self, type_token: Token) -> Result<Node, CompileError> {
        let ty = if type_token.kind == TokenKind::KwInt { Type::Int } else { Type::Str };
        let name = self.expect(TokenKind::Identifier, "a variable name")?;
        let init = if self.matches(TokenKind::Equal) {
            let value = self.expression()?;
            if value.ty != ty {
                return Err(CompileError::type_error(
                    value.token.location,
                    format!(
                        "cannot initialize `{ty}` variable `{}` with a `{}` value",
                        self.text(name),
                        value.ty
                    ),
                ));
            }
            Some(Box::new(value))
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "`;`")?;
        self.declare(name, ty)?;
        Ok(Node::new(name, ty, NodeKind::Declare(name.text, init)))
    }

    fn condition(&mut self) -> Result<Node, CompileError> {
        let cond = self.expression()?;
        if cond.ty != Type::Int {
            return Err(CompileError::type_error(
                cond.token.location,
                format!("can't cast `{}` to boolean", cond.ty),
            ));
        }
        Ok(cond)
    }

    fn simple_statement(&mut self) -> Result<Node, CompileError> {
        let expr = self.expression()?;
        let op = match self.current.kind {
            TokenKind::Equal => Some(AssignOp::Set),
            TokenKind::PlusEqual => Some(AssignOp::Add),
            TokenKind::MinusEqual => Some(AssignOp::Sub),
            TokenKind::StarEqual => Some(AssignOp::Mul),
            TokenKind::SlashEqual => Some(AssignOp::Div),
            _ => None,
        };

        let node = match op {
            Some(op) => {
                let op_token = self.advance();
                let NodeKind::Variable(name) = expr.kind else {
                    return Err(CompileError::syntax(
                        op_token.location,
                        format!("cannot assign to {}", expr.describe()),
                    ));
                };
                let value = self.expression()?;
                if !op.accepts(expr.ty, value.ty) {
                    return Err(CompileError::type_error(
                        op_token.location,
                        format!(
                            "unsupported operand types for `{op}`: `{}` and `{}`",
                            expr.ty, value.ty
                        ),
                    ));
                }
                Node::new(op_token, Type::Void, NodeKind::Assign(op, name, Box::new(value)))
            }
            None => expr,
        };
        self.expect(TokenKind::Semicolon, "`;`")?;
        Ok(node)
    }

    fn expression(&mut self) -> Result<Node, CompileError> {
        self.precedence(Precedence::Or)
    }

    fn precedence(&mut self, min: Precedence) -> Result<Node, CompileError> {
        let mut node = self.prefix()?;
        while Precedence::of(self.current.kind) >= min {
            let token = self.advance();
            node = self.infix(token, node)?;
        }
        Ok(node)
    }

    fn prefix(&mut self) -> Result<Node, CompileError> {
        let token = self.current;
        let unary = match token.kind {
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Int => {
                self.advance();
                let value = self.text(token).parse().map_err(|_| {
                    CompileError::syntax(
                        token.location,
                        format!("integer literal `{}` is too large", self.text(token)),
                    )
                })?;
                return Ok(Node::new(token, Type::Int, NodeKind::Int(value)));
            }
            TokenKind::Str => {
                self.advance();
                return Ok(Node::new(token, Type::Str, NodeKind::Str(token.text)));
            }
            TokenKind::Identifier => {
                self.advance();
                return self.variable(token);
            }
            TokenKind::OpenParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(TokenKind::CloseParen, "`)`")?;
                return Ok(inner);
            }
            _ => return Err(self.unexpected(token, "an expression")),
        };

        self.advance();
        let operand = self.precedence(Precedence::Unary)?;
        let ty = unary.result_type(operand.ty);
        if ty == Type::Error {
            return Err(CompileError::type_error(
                token.location,
                format!("bad operand type for unary `{unary}`: `{}`", operand.ty),
            ));
        }
        Ok(Node::new(token, ty, NodeKind::Unary(unary, Box::new(operand))))
    }

    fn variable(&self, token: Token) -> Result<Node, CompileError> {
        let Some(record) = self.resolve(token.text) else {
            return Err(CompileError::name(
                token.location,
                format!("undefined identifier `{}`", self.text(token)),
            ));
        };
        if record.builtin.is_some() && self.current.kind != TokenKind::OpenParen {
            return Err(CompileError::type_error(
                token.location,
                format!("function `{}` can only be called", self.text(token)),
            ));
        }
        Ok(Node::new(token, record.ty, NodeKind::Variable(token.text)))
    }

    fn infix(&mut self, token: Token, lhs: Node) -> Result<Node, CompileError> {
        match token.kind {
            TokenKind::OpenParen => self.call(token, lhs),
            TokenKind::Plus => self.binary(token, BinaryOp::Add, lhs),
            TokenKind::Minus => self.binary(token, BinaryOp::Sub, lhs),
            TokenKind::Star => self.binary(token, BinaryOp::Mul, lhs),
            TokenKind::Slash => self.binary(token, BinaryOp::Div, lhs),
            TokenKind::AndAnd => self.binary(token, BinaryOp::And, lhs),
            TokenKind::OrOr => self.binary(token, BinaryOp::Or, lhs),
            TokenKind::BangEqual => self.binary(token, BinaryOp::NotEqual, lhs),
            TokenKind::Less => self.binary(token, BinaryOp::Less, lhs),
            TokenKind::LessEqual => self.binary(token, BinaryOp::LessEqual, lhs),
            TokenKind::EqualEqual => self.negated(token, BinaryOp::NotEqual, lhs),
            TokenKind::Greater => self.negated(token, BinaryOp::LessEqual, lhs),
            TokenKind::GreaterEqual => self.negated(token, BinaryOp::Less, lhs),
            _ => Err(self.unexpected(token, "an operator")),
        }
    }

    fn binary(&mut self, token: Token, op: BinaryOp, lhs: Node) -> Result<Node, CompileError> {
        let rhs = self.precedence(Precedence::of(token.kind).next())?;
        let ty = op.result_type(lhs.ty, rhs.ty);
        if ty == Type::Error {
            return Err(CompileError::type_error(
                token.location,
                format!(
                    "unsupported operand types for `{}`: `{}` and `{}`",
                    self.text(token),
                    lhs.ty,
                    rhs.ty
                ),
            ));
        }
        Ok(Node::new(token, ty, NodeKind::Binary(op, Box::new(lhs), Box::new(rhs))))
    }

    /// `==`, `>` and `>=` as the negation of the comparison they complement.
    fn negated(&mut self, token: Token, op: BinaryOp, lhs: Node) -> Result<Node, CompileError> {
        let inner = self.binary(token, op, lhs)?;
        Ok(Node::new(token, Type::Int, NodeKind::Unary(UnaryOp::Not, Box::new(inner))))
    }

    fn call(&mut self, open: Token, callee: Node) -> Result<Node, CompileError> {
        let builtin = match callee.kind {
            NodeKind::Variable(name) => self.resolve(name).and_then(|record| record.builtin),
            _ => None,
        };
        let Some(builtin) = builtin else {
            return Err(CompileError::type_error(
                open.location,
                format!("{} is not callable", callee.describe()),
            ));
        };

        let mut args = Vec::new();
        if self.current.kind != TokenKind::CloseParen {
            loop {
                let arg = self.expression()?;
                if arg.ty == Type::Void {
                    return Err(CompileError::type_error(
                        arg.token.location,
                        "a `void` value cannot be passed as an argument",
                    ));
                }
                args.push(arg);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::CloseParen, "`)`")?;

        if args.len() != builtin.arity() {
            return Err(CompileError::type_error(
                callee.token.location,
                format!(
                    "`{}` takes {} argument(s) but {} were given",
                    builtin.name(),
                    builtin.arity(),
                    args.len()
                ),
            ));
        }
        let name = self.lexer.interner().resolve(callee.token.text);
        tracing::trace!("call to `{name}` with {} argument(s)", args.len());
        Ok(Node::new(callee.token, builtin.return_type(), NodeKind::Call(callee.token.text, args)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Location;

    fn parse_all(source: &str) -> Result<Vec<Node>, CompileError> {
        let mut parser = Parser::new(source);
        let mut nodes = Vec::new();
        let mut errors = Vec::new();
        loop {
            match parser.parse_statement() {
                Ok(Some(node)) => nodes.push(node),
                Ok(None) => break,
                Err(err) => errors.extend(err.into_diagnostics()),
            }
        }
        if errors.is_empty() {
            Ok(nodes)
        } else {
            Err(CompileError::from_diagnostics(errors))
        }
    }

    fn single(source: &str) -> Node {
        let mut nodes = parse_all(source).unwrap();
        nodes.pop().unwrap()
    }

    fn errors(source: &str) -> Vec<CompileError> {
        parse_all(source).unwrap_err().into_diagnostics()
    }

    #[test]
    fn test_declarations_and_types() {
        let nodes = parse_all("int x = 3; str s = \"hi\"; int y;").unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].ty, Type::Int);
        assert!(matches!(nodes[0].kind, NodeKind::Declare(_, Some(_))));
        assert_eq!(nodes[1].ty, Type::Str);
        assert!(matches!(nodes[2].kind, NodeKind::Declare(_, None)));
    }

    #[test]
    fn test_precedence() {
        let node = single("int a; a = 1 + 2 * 3;");
        let NodeKind::Assign(AssignOp::Set, _, value) = node.kind else { panic!("{node:?}") };
        let NodeKind::Binary(BinaryOp::Add, lhs, rhs) = value.kind else { panic!("{value:?}") };
        assert_eq!(lhs.literal(), Some(1));
        assert!(matches!(rhs.kind, NodeKind::Binary(BinaryOp::Mul, _, _)));
    }

    #[test]
    fn test_left_associativity() {
        let node = single("8 - 4 - 2;");
        let NodeKind::Binary(BinaryOp::Sub, lhs, rhs) = node.kind else { panic!("{node:?}") };
        assert!(matches!(lhs.kind, NodeKind::Binary(BinaryOp::Sub, _, _)));
        assert_eq!(rhs.literal(), Some(2));
    }

    #[test]
    fn test_logical_precedence() {
        let node = single("1 || 2 && 3 < 4;");
        let NodeKind::Binary(BinaryOp::Or, _, rhs) = node.kind else { panic!("{node:?}") };
        let NodeKind::Binary(BinaryOp::And, _, cmp) = rhs.kind else { panic!("{rhs:?}") };
        assert!(matches!(cmp.kind, NodeKind::Binary(BinaryOp::Less, _, _)));
    }

    #[test]
    fn test_comparisons_are_lowered() {
        for (source, inner) in [
            ("1 == 2;", BinaryOp::NotEqual),
            ("1 > 2;", BinaryOp::LessEqual),
            ("1 >= 2;", BinaryOp::Less),
        ] {
            let node = single(source);
            assert_eq!(node.ty, Type::Int);
            let NodeKind::Unary(UnaryOp::Not, operand) = node.kind else { panic!("{source}") };
            let NodeKind::Binary(op, lhs, _) = operand.kind else { panic!("{source}") };
            assert_eq!(op, inner);
            assert_eq!(lhs.literal(), Some(1));
        }
    }

    #[test]
    fn test_unary_binds_tighter_than_binary() {
        let node = single("-1 * 2;");
        let NodeKind::Binary(BinaryOp::Mul, lhs, _) = node.kind else { panic!("{node:?}") };
        assert!(matches!(lhs.kind, NodeKind::Unary(UnaryOp::Negate, _)));
    }

    #[test]
    fn test_control_flow() {
        let node = single("int x; if (x) x = 1; else { x = 2; }");
        let NodeKind::If(_, then, Some(otherwise)) = node.kind else { panic!("{node:?}") };
        assert!(matches!(then.kind, NodeKind::Assign(..)));
        assert!(matches!(otherwise.kind, NodeKind::Block(_)));

        let node = single("int x; do x += 1; while (x < 3);");
        assert!(matches!(node.kind, NodeKind::DoWhile(..)));

        let node = single("int x; while (x) { x -= 1; }");
        assert!(matches!(node.kind, NodeKind::While(..)));
    }

    #[test]
    fn test_builtin_calls() {
        let node = single("print(input() + 1);");
        assert_eq!(node.ty, Type::Void);
        let NodeKind::Call(_, args) = node.kind else { panic!("{node:?}") };
        assert_eq!(args.len(), 1);
        assert!(matches!(args[0].kind, NodeKind::Binary(BinaryOp::Add, _, _)));
    }

    #[test]
    fn test_name_errors() {
        assert_eq!(
            errors("x = 1;"),
            vec![CompileError::name(Location::new(1, 1), "undefined identifier `x`")]
        );
        assert_eq!(
            errors("int x; int x;"),
            vec![CompileError::name(Location::new(1, 12), "`x` is already declared in this scope")]
        );
        // The name is only visible after its own declaration.
        assert!(parse_all("int x = x;").is_err());
    }

    #[test]
    fn test_shadowing_in_inner_scope() {
        let nodes = parse_all("int x = 1; { int x = 2; x += 1; } x += 1;").unwrap();
        assert_eq!(nodes.len(), 3);
        // Names declared in a block are gone after it.
        assert!(parse_all("{ int y; } y = 1;").is_err());
    }

    #[test]
    fn test_type_errors() {
        assert_eq!(
            errors("if (\"s\") ;"),
            vec![CompileError::type_error(Location::new(1, 5), "can't cast `str` to boolean")]
        );
        assert_eq!(
            errors("\"a\" - \"b\";"),
            vec![CompileError::type_error(
                Location::new(1, 5),
                "unsupported operand types for `-`: `str` and `str`"
            )]
        );
        assert_eq!(
            errors("int x = \"s\";"),
            vec![CompileError::type_error(
                Location::new(1, 9),
                "cannot initialize `int` variable `x` with a `str` value"
            )]
        );
        assert!(parse_all("int x; x = print(1);").is_err());
        assert!(parse_all("print(1, 2);").is_err());
        assert!(parse_all("int x; x(1);").is_err());
        assert!(parse_all("int x = print;").is_err());
        assert!(parse_all("str s; s -= \"a\";").is_err());
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(
            errors("int x = 1"),
            vec![CompileError::syntax(Location::new(1, 10), "expected `;`, found end of input")]
        );
        assert_eq!(
            errors("1 = 2;"),
            vec![CompileError::syntax(Location::new(1, 3), "cannot assign to integer literal")]
        );
        assert!(parse_all("{ int x;").is_err());
        assert!(parse_all("}").is_err());
        assert!(parse_all("99999999999999999999;").is_err());
    }

    #[test]
    fn test_declaration_needs_a_block_under_control_flow() {
        assert_eq!(
            errors("while (1) int x;"),
            vec![CompileError::syntax(
                Location::new(1, 11),
                "a declaration here must be wrapped in a block"
            )]
        );
        assert!(parse_all("if (1) { int x; } else { int x; }").is_ok());
    }

    #[test]
    fn test_recovery_reports_every_statement() {
        let errs = errors("int a = ; int b = 2; b = c; { b = ; b += 1; } print(b);");
        let locations: Vec<_> = errs.iter().filter_map(CompileError::location).collect();
        assert_eq!(
            locations,
            vec![Location::new(1, 9), Location::new(1, 26), Location::new(1, 35)]
        );
    }

    #[test]
    fn test_lexical_errors_fail_the_statement() {
        let errs = errors("int x = 1 $;");
        assert_eq!(errs, vec![CompileError::Lexical { location: Location::new(1, 11), found: '$' }]);
    }
}
