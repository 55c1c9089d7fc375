//! Lowering of typed statements to Brainfuck bytecode.
//!
//! The generator keeps a compile-time model of the machine: which tape cells are live
//! ([`TapeAllocator`]), which cell each variable lives in ([`ScopeChain`]), and where the tape
//! pointer is. All pointer movement goes through [`CodeGenerator::seek`], so the model never
//! drifts from what the emitted code does.
//!
//! Expressions are compiled into a [`Target`]: the value, times the target's weight, is added
//! to the target cell. Code inside a loop may run any number of times, so there the generator
//! restores every variable it reads instead of moving it, and zeroes scopes it closes.

mod arith;
mod builtins;
mod expression;

use crate::{
    ast::{AssignOp, Node, NodeKind, Type},
    builtins::Builtin,
    error::CompileError,
    interner::Symbol,
    memory::{TapeAllocator, Value},
    namespace::{Binding, ScopeChain, Variable},
    token::Location,
};
use brainfuck_vm::{builder::ProgramBuilder, bytecode::Program};

/// Destination of an expression: `weight × value` is added to cell `pos`, modulo 256.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub pos: usize,
    pub weight: i64,
}

impl Target {
    pub const fn new(pos: usize, weight: i64) -> Self {
        Self { pos, weight: weight.rem_euclid(256) }
    }

    /// Evaluate for side effects only.
    pub const fn discard() -> Self {
        Self { pos: 0, weight: 0 }
    }

    pub const fn is_discarded(self) -> bool {
        self.weight == 0
    }

    pub const fn scaled(self, factor: i64) -> Self {
        Self::new(self.pos, self.weight.wrapping_mul(factor.rem_euclid(256)))
    }

    pub const fn negated(self) -> Self {
        self.scaled(-1)
    }
}

#[derive(Debug)]
pub struct CodeGenerator {
    program: ProgramBuilder,
    memory: TapeAllocator,
    scopes: ScopeChain,
    /// Tape pointer at this point of the emitted code.
    position: usize,
    /// Number of enclosing brackets.
    nonlinear: usize,
}

impl CodeGenerator {
    pub fn new(builtins: &[(Symbol, Builtin)]) -> Self {
        let mut scopes = ScopeChain::new();
        for &(name, builtin) in builtins {
            if let Err(err) = scopes.declare(Variable { name, binding: Binding::Builtin(builtin) }) {
                tracing::warn!("builtin `{}` registered twice: {err}", builtin.name());
            }
        }
        // User globals live in their own scope so they may shadow builtins.
        scopes.push();
        Self {
            program: ProgramBuilder::new(),
            memory: TapeAllocator::new(),
            scopes,
            position: 0,
            nonlinear: 0,
        }
    }

    pub fn compile_statement(&mut self, node: &Node) -> Result<(), CompileError> {
        tracing::debug!("{}: compiling {}", node.token.location, node.describe());
        self.statement(node)?;
        tracing::trace!("{} cells live, pointer at {}", self.memory.taken(), self.position);
        Ok(())
    }

    pub fn finish(self) -> Result<Program, CompileError> {
        tracing::debug!("program uses {} tape cells", self.memory.len());
        Ok(self.program.finish()?)
    }

    pub const fn memory(&self) -> &TapeAllocator {
        &self.memory
    }

    /// Takes a cell for a value of type `ty`, zeroing it when it held something before.
    fn allocate(&mut self, ty: Type, location: Location) -> Result<Value, CompileError> {
        let allocation = self
            .memory
            .allocate(ty)
            .map_err(|err| CompileError::unsupported(location, err.to_string()))?;
        if allocation.needs_reset {
            self.reset(allocation.value.pos)?;
        }
        Ok(allocation.value)
    }

    /// A zeroed scratch cell.
    fn temp(&mut self) -> Result<usize, CompileError> {
        Ok(self.allocate(Type::Int, Location::default())?.pos)
    }

    /// Gives back a scratch cell, which must be zero by now.
    fn release(&mut self, pos: usize) {
        self.memory.free(Value { pos, ty: Type::Int });
    }

    /// The cell `name` currently lives in.
    fn slot(&self, name: Symbol, location: Location) -> Result<Value, CompileError> {
        match self.scopes.lookup(name).map(|variable| variable.binding) {
            Some(Binding::Slot(value)) => Ok(value),
            Some(Binding::Builtin(builtin)) => Err(CompileError::unsupported(
                location,
                format!("builtin `{}` used as a value", builtin.name()),
            )),
            None => Err(CompileError::name(location, "unresolved identifier")),
        }
    }

    fn statement(&mut self, node: &Node) -> Result<(), CompileError> {
        match &node.kind {
            NodeKind::Nop => Ok(()),
            NodeKind::Block(body) => self.block(body),
            NodeKind::Declare(name, init) => self.declaration(node, *name, init.as_deref()),
            NodeKind::If(cond, then, otherwise) => self.if_else(cond, then, otherwise.as_deref()),
            NodeKind::While(cond, body) => self.while_loop(cond, body),
            NodeKind::DoWhile(body, cond) => self.do_while(body, cond),
            NodeKind::Assign(op, name, value) => self.assignment(node, *op, *name, value),
            NodeKind::Int(_)
            | NodeKind::Str(_)
            | NodeKind::Variable(_)
            | NodeKind::Unary(..)
            | NodeKind::Binary(..)
            | NodeKind::Call(..) => self.expression(node, Target::discard()),
        }
    }

    fn block(&mut self, body: &[Node]) -> Result<(), CompileError> {
        self.scopes.push();
        for statement in body {
            self.statement(statement)?;
        }
        for value in self.scopes.pop() {
            if self.nonlinear > 0 {
                self.reset(value.pos)?;
            }
            self.memory.free(value);
        }
        Ok(())
    }

    fn declaration(
        &mut self,
        node: &Node,
        name: Symbol,
        init: Option<&Node>,
    ) -> Result<(), CompileError> {
        let location = node.token.location;
        let value = self.allocate(node.ty, location)?;
        if let Some(init) = init {
            self.expression(init, Target::new(value.pos, 1))?;
        }
        self.scopes
            .declare(Variable { name, binding: Binding::Slot(value) })
            .map_err(|err| CompileError::name(location, err.to_string()))
    }

    fn if_else(
        &mut self,
        cond: &Node,
        then: &Node,
        otherwise: Option<&Node>,
    ) -> Result<(), CompileError> {
        let flag = self.temp()?;
        let else_flag = match otherwise {
            Some(_) => {
                let pos = self.temp()?;
                self.add(pos, 1);
                Some(pos)
            }
            None => None,
        };

        self.expression(cond, Target::new(flag, 1))?;
        self.open_loop(flag);
        self.reset(flag)?;
        if let Some(pos) = else_flag {
            self.add(pos, -1);
        }
        self.statement(then)?;
        self.close_loop(flag)?;
        self.release(flag);

        if let (Some(pos), Some(otherwise)) = (else_flag, otherwise) {
            self.open_loop(pos);
            self.add(pos, -1);
            self.statement(otherwise)?;
            self.close_loop(pos)?;
            self.release(pos);
        }
        Ok(())
    }

    fn while_loop(&mut self, cond: &Node, body: &Node) -> Result<(), CompileError> {
        let flag = self.temp()?;
        self.expression(cond, Target::new(flag, 1))?;
        self.open_loop(flag);
        self.statement(body)?;
        self.reset(flag)?;
        self.expression(cond, Target::new(flag, 1))?;
        self.close_loop(flag)?;
        self.release(flag);
        Ok(())
    }

    fn do_while(&mut self, body: &Node, cond: &Node) -> Result<(), CompileError> {
        let flag = self.temp()?;
        self.add(flag, 1);
        self.open_loop(flag);
        self.reset(flag)?;
        self.statement(body)?;
        self.expression(cond, Target::new(flag, 1))?;
        self.close_loop(flag)?;
        self.release(flag);
        Ok(())
    }

    fn assignment(
        &mut self,
        node: &Node,
        op: AssignOp,
        name: Symbol,
        value: &Node,
    ) -> Result<(), CompileError> {
        let location = node.token.location;
        match op {
            AssignOp::Set => {
                // `value` may read the old contents, so it cannot be built in place.
                let tmp = self.temp()?;
                self.expression(value, Target::new(tmp, 1))?;
                let slot = self.slot(name, location)?;
                self.reset(slot.pos)?;
                self.transfer(tmp, &[Target::new(slot.pos, 1)])?;
                self.release(tmp);
            }
            AssignOp::Add | AssignOp::Sub => {
                let sign = if op == AssignOp::Add { 1 } else { -1 };
                if value.reads(name) {
                    let tmp = self.temp()?;
                    self.expression(value, Target::new(tmp, 1))?;
                    let slot = self.slot(name, location)?;
                    self.transfer(tmp, &[Target::new(slot.pos, sign)])?;
                    self.release(tmp);
                } else {
                    let slot = self.slot(name, location)?;
                    self.expression(value, Target::new(slot.pos, sign))?;
                }
            }
            AssignOp::Mul => match value.literal() {
                Some(factor) => {
                    let slot = self.slot(name, location)?;
                    self.scale(slot.pos, factor)?;
                }
                None => {
                    let y = self.temp()?;
                    self.expression(value, Target::new(y, 1))?;
                    let slot = self.slot(name, location)?;
                    let x = self.temp()?;
                    self.transfer(slot.pos, &[Target::new(x, 1)])?;
                    self.multiply(Target::new(slot.pos, 1), x, y)?;
                    self.reset(y)?;
                    self.release(x);
                    self.release(y);
                }
            },
            AssignOp::Div => {
                let divisor = self.temp()?;
                self.expression(value, Target::new(divisor, 1))?;
                let slot = self.slot(name, location)?;
                let dividend = self.temp()?;
                let remainder = self.temp()?;
                self.transfer(slot.pos, &[Target::new(dividend, 1)])?;
                self.divmod(dividend, divisor, Target::new(slot.pos, 1), remainder)?;
                self.reset(remainder)?;
                self.reset(divisor)?;
                self.release(dividend);
                self.release(divisor);
                self.release(remainder);
            }
        }
        Ok(())
    }

    /// Multiplies the cell at `pos` by a constant.
    fn scale(&mut self, pos: usize, factor: i64) -> Result<(), CompileError> {
        match factor.rem_euclid(256) {
            0 => self.reset(pos),
            1 => Ok(()),
            _ => {
                let tmp = self.temp()?;
                self.transfer(pos, &[Target::new(tmp, factor)])?;
                self.transfer(tmp, &[Target::new(pos, 1)])?;
                self.release(tmp);
                Ok(())
            }
        }
    }
}
