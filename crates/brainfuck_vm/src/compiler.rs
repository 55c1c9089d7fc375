use crate::{
    builder::ProgramBuilder,
    bytecode::{BytecodeError, Program},
    instruction::InstructionType,
};

/// Assembles textual Brainfuck into bytecode.
#[derive(Debug)]
pub struct Compiler {
    code: Vec<InstructionType>,
}

impl Compiler {
    /// Keeps the eight command characters of `code`; everything else is commentary.
    pub fn new(code: &str) -> Self {
        let code = code.chars().filter_map(|c| InstructionType::try_from(c).ok()).collect();
        Self { code }
    }

    pub fn compile(&self) -> Result<Program, BytecodeError> {
        let mut builder = ProgramBuilder::new();
        for ins in &self.code {
            ins.emit(&mut builder)?;
        }
        builder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Mode;

    #[test]
    fn test_new() {
        let code = "++>,<[>+.<-] add the input";
        let compiler = Compiler::new(code);
        let trimmed_code: String = compiler.code.iter().map(InstructionType::as_char).collect();
        assert_eq!(trimmed_code, "++>,<[>+.<-]");
    }

    #[test]
    fn test_compile() {
        let code = "++>,<[>+.<-]";
        let compiler = Compiler::new(code);
        let program = compiler.compile().unwrap();
        let expected = vec![
            Mode::Compute.control(2),
            0,
            2,
            1,
            0,
            Mode::Input.control(0),
            Mode::Compute.control(1),
            0xFF,
            0,
            Mode::ShortJumpForward.control(8),
            Mode::Compute.control(1),
            1,
            1,
            Mode::Output.control(0),
            Mode::Compute.control(1),
            0xFF,
            0xFF,
            Mode::ShortJumpBackward.control(8),
            Mode::End.control(0),
        ];
        assert_eq!(program.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_round_trip_text() {
        let code = "++>,<[>+.<-]";
        let program = Compiler::new(code).compile().unwrap();
        assert_eq!(program.to_brainfuck().unwrap(), code);
    }

    #[test]
    fn test_unbalanced_text() {
        assert_eq!(Compiler::new("+]").compile(), Err(BytecodeError::UnmatchedClose));
        assert_eq!(Compiler::new("[[]").compile(), Err(BytecodeError::UnclosedBracket(1)));
    }
}
