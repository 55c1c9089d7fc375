use super::{CodeGenerator, Target};
use crate::{
    ast::{Node, Type},
    builtins::Builtin,
    error::CompileError,
    interner::Symbol,
    namespace::Binding,
    token::Location,
};

impl CodeGenerator {
    pub(super) fn call(
        &mut self,
        name: Symbol,
        args: &[Node],
        target: Target,
        location: Location,
    ) -> Result<(), CompileError> {
        let Some(Binding::Builtin(builtin)) = self.scopes.lookup(name).map(|v| v.binding) else {
            return Err(CompileError::unsupported(location, "only builtin functions can be called"));
        };

        match (builtin, args) {
            (Builtin::Print, [arg]) => self.print(arg),
            (Builtin::Input, []) => self.read_byte(target),
            _ => Err(CompileError::type_error(
                location,
                format!("wrong number of arguments to `{}`", builtin.name()),
            )),
        }
    }

    fn print(&mut self, arg: &Node) -> Result<(), CompileError> {
        if arg.ty != Type::Int {
            return Err(CompileError::unsupported(
                arg.token.location,
                format!("cannot print a `{}` value", arg.ty),
            ));
        }
        let value = self.temp()?;
        self.expression(arg, Target::new(value, 1))?;
        self.print_decimal(value)?;
        self.release(value);
        Ok(())
    }

    fn read_byte(&mut self, target: Target) -> Result<(), CompileError> {
        let byte = self.temp()?;
        self.input(byte);
        if target.is_discarded() {
            self.reset(byte)?;
        } else {
            self.transfer(byte, &[target])?;
        }
        self.release(byte);
        Ok(())
    }

    /// Writes the byte in `value` as decimal digits and a newline, emptying `value`.
    /// Leading zeros are dropped but a lone zero is printed.
    fn print_decimal(&mut self, value: usize) -> Result<(), CompileError> {
        let ten = self.temp()?;
        let rest = self.temp()?;
        let ones = self.temp()?;
        let hundreds = self.temp()?;
        let tens = self.temp()?;
        let leading = self.temp()?;

        self.add(ten, 10);
        self.divmod(value, ten, Target::new(rest, 1), ones)?;
        self.divmod(rest, ten, Target::new(hundreds, 1), tens)?;
        self.reset(ten)?;

        // Tens are printed when anything above them is nonzero, hundreds only when nonzero.
        self.duplicate(hundreds, &[Target::new(leading, 1)])?;
        self.duplicate(tens, &[Target::new(leading, 1)])?;
        self.open_loop(leading);
        self.reset(leading)?;
        let flag = self.temp()?;
        self.duplicate(hundreds, &[Target::new(flag, 1)])?;
        self.open_loop(flag);
        self.reset(flag)?;
        self.add(hundreds, i64::from(b'0'));
        self.output(hundreds);
        self.close_loop(flag)?;
        self.release(flag);
        self.add(tens, i64::from(b'0'));
        self.output(tens);
        self.close_loop(leading)?;

        self.add(ones, i64::from(b'0'));
        self.output(ones);
        self.add(leading, i64::from(b'\n'));
        self.output(leading);
        self.add(leading, -i64::from(b'\n'));

        for pos in [hundreds, tens, ones] {
            self.reset(pos)?;
        }
        for pos in [ten, rest, ones, hundreds, tens, leading] {
            self.release(pos);
        }
        Ok(())
    }
}
