use super::{CodeGenerator, Target};
use crate::{
    ast::{BinaryOp, Node, NodeKind, Type, UnaryOp},
    error::CompileError,
    interner::Symbol,
    memory::Value,
    namespace::Binding,
    token::Location,
};

impl CodeGenerator {
    /// Adds `target.weight × node` to the target cell.
    pub(super) fn expression(&mut self, node: &Node, target: Target) -> Result<(), CompileError> {
        let location = node.token.location;
        if node.ty == Type::Str {
            return Err(CompileError::unsupported(location, "string values are not supported"));
        }

        match &node.kind {
            NodeKind::Int(value) => {
                if !target.is_discarded() {
                    self.add(target.pos, value.wrapping_mul(target.weight));
                }
                Ok(())
            }
            NodeKind::Str(_) => {
                Err(CompileError::unsupported(location, "string values are not supported"))
            }
            NodeKind::Variable(name) => self.read(*name, location, target),
            NodeKind::Unary(UnaryOp::Plus, operand) => self.expression(operand, target),
            NodeKind::Unary(UnaryOp::Negate, operand) => self.expression(operand, target.negated()),
            NodeKind::Unary(UnaryOp::Not, operand) => self.not(operand, target),
            NodeKind::Binary(op, lhs, rhs) => self.binary(*op, lhs, rhs, target),
            NodeKind::Call(name, args) => self.call(*name, args, target, location),
            NodeKind::Assign(..)
            | NodeKind::Block(_)
            | NodeKind::If(..)
            | NodeKind::While(..)
            | NodeKind::DoWhile(..)
            | NodeKind::Declare(..)
            | NodeKind::Nop => Err(CompileError::unsupported(
                location,
                format!("{} used as an expression", node.describe()),
            )),
        }
    }

    /// Copies a variable into the target through a scratch cell.
    ///
    /// In straight-line code the scratch cell simply becomes the variable's new home. Inside a
    /// loop the variable must stay where the rest of the loop expects it, so the copy is moved
    /// back instead.
    fn read(&mut self, name: Symbol, location: Location, target: Target) -> Result<(), CompileError> {
        if target.is_discarded() {
            return Ok(());
        }

        let value = self.slot(name, location)?;
        let copy = self.temp()?;
        self.transfer(value.pos, &[target, Target::new(copy, 1)])?;
        if self.nonlinear > 0 {
            self.transfer(copy, &[Target::new(value.pos, 1)])?;
            self.release(copy);
        } else {
            if let Some(variable) = self.scopes.lookup_mut(name) {
                variable.binding = Binding::Slot(Value { pos: copy, ty: value.ty });
            }
            self.memory.free(value);
        }
        Ok(())
    }

    /// `target += w; if operand { target -= w }`
    fn not(&mut self, operand: &Node, target: Target) -> Result<(), CompileError> {
        if target.is_discarded() {
            return self.expression(operand, target);
        }

        let flag = self.temp()?;
        self.expression(operand, Target::new(flag, 1))?;
        self.add(target.pos, target.weight);
        self.open_loop(flag);
        self.reset(flag)?;
        self.add(target.pos, -target.weight);
        self.close_loop(flag)?;
        self.release(flag);
        Ok(())
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        lhs: &Node,
        rhs: &Node,
        target: Target,
    ) -> Result<(), CompileError> {
        match op {
            BinaryOp::Add => {
                self.expression(lhs, target)?;
                self.expression(rhs, target)
            }
            BinaryOp::Sub => {
                self.expression(lhs, target)?;
                self.expression(rhs, target.negated())
            }
            BinaryOp::Mul => self.product(lhs, rhs, target),
            _ if target.is_discarded() => {
                self.expression(lhs, target)?;
                self.expression(rhs, target)
            }
            BinaryOp::Div => {
                let n = self.temp()?;
                let d = self.temp()?;
                let remainder = self.temp()?;
                self.expression(lhs, Target::new(n, 1))?;
                self.expression(rhs, Target::new(d, 1))?;
                self.divmod(n, d, target, remainder)?;
                self.reset(remainder)?;
                self.reset(d)?;
                self.release(n);
                self.release(d);
                self.release(remainder);
                Ok(())
            }
            BinaryOp::NotEqual => {
                let diff = self.temp()?;
                self.expression(lhs, Target::new(diff, 1))?;
                self.expression(rhs, Target::new(diff, -1))?;
                self.booleanize(diff, target)?;
                self.release(diff);
                Ok(())
            }
            BinaryOp::Less => {
                let (a, b) = self.operands(lhs, rhs)?;
                self.less(a, b, target)?;
                self.release(a);
                self.release(b);
                Ok(())
            }
            BinaryOp::LessEqual => {
                // a <= b is !(b < a), with a still evaluated first.
                let (a, b) = self.operands(lhs, rhs)?;
                let greater = self.temp()?;
                self.less(b, a, Target::new(greater, 1))?;
                self.add(target.pos, target.weight);
                self.open_loop(greater);
                self.add(greater, -1);
                self.add(target.pos, -target.weight);
                self.close_loop(greater)?;
                self.release(greater);
                self.release(a);
                self.release(b);
                Ok(())
            }
            BinaryOp::And => {
                let (a, b) = self.operands(lhs, rhs)?;
                self.open_loop(a);
                self.reset(a)?;
                self.booleanize(b, target)?;
                self.close_loop(a)?;
                self.reset(b)?;
                self.release(a);
                self.release(b);
                Ok(())
            }
            BinaryOp::Or => {
                let any = self.temp()?;
                let flag = self.temp()?;
                self.expression(lhs, Target::new(flag, 1))?;
                self.booleanize(flag, Target::new(any, 1))?;
                self.expression(rhs, Target::new(flag, 1))?;
                self.booleanize(flag, Target::new(any, 1))?;
                self.booleanize(any, target)?;
                self.release(any);
                self.release(flag);
                Ok(())
            }
        }
    }

    /// Evaluates both operands, left first, into fresh cells.
    fn operands(&mut self, lhs: &Node, rhs: &Node) -> Result<(usize, usize), CompileError> {
        let a = self.temp()?;
        let b = self.temp()?;
        self.expression(lhs, Target::new(a, 1))?;
        self.expression(rhs, Target::new(b, 1))?;
        Ok((a, b))
    }

    /// Products with a literal side fold into the target's weight; only variable × variable
    /// needs a runtime loop.
    fn product(&mut self, lhs: &Node, rhs: &Node, target: Target) -> Result<(), CompileError> {
        if lhs.ty != Type::Int || rhs.ty != Type::Int {
            return Err(CompileError::unsupported(
                lhs.token.location,
                "can't multiply non-integers",
            ));
        }

        match (lhs.literal(), rhs.literal()) {
            (Some(a), Some(b)) => {
                if !target.is_discarded() {
                    self.add(target.pos, a.wrapping_mul(b).wrapping_mul(target.weight));
                }
                Ok(())
            }
            (Some(a), None) => self.expression(rhs, target.scaled(a)),
            (None, Some(b)) => self.expression(lhs, target.scaled(b)),
            (None, None) if target.is_discarded() => {
                self.expression(lhs, target)?;
                self.expression(rhs, target)
            }
            (None, None) => {
                let (x, y) = self.operands(lhs, rhs)?;
                self.multiply(target, x, y)?;
                self.reset(y)?;
                self.release(x);
                self.release(y);
                Ok(())
            }
        }
    }
}
