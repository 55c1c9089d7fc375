use crate::{codegen::CodeGenerator, error::CompileError, parser::Parser};
use brainfuck_vm::bytecode::Program;

/// Compiles a whole source file to bytecode.
///
/// Statements are parsed and generated one at a time. Parse and type errors do not stop the
/// parser, so every diagnostic in the file is reported together; once any has been seen no more
/// code is generated. A bracket imbalance in the bytecode aborts at once.
pub fn compile_source(source: &str) -> Result<Program, CompileError> {
    let mut parser = Parser::new(source);
    let mut generator = CodeGenerator::new(parser.builtins());
    let mut diagnostics = Vec::new();

    loop {
        match parser.parse_statement() {
            Ok(Some(node)) => {
                if !diagnostics.is_empty() {
                    continue;
                }
                match generator.compile_statement(&node) {
                    Ok(()) => {}
                    Err(err @ CompileError::Bytecode(_)) => return Err(err),
                    Err(err) => diagnostics.push(err),
                }
            }
            Ok(None) => break,
            Err(err) => diagnostics.extend(err.into_diagnostics()),
        }
    }

    if !diagnostics.is_empty() {
        for diagnostic in &diagnostics {
            tracing::error!("{diagnostic}");
        }
        return Err(CompileError::from_diagnostics(diagnostics));
    }

    let program = generator.finish()?;
    tracing::info!("Compiled {} bytes of bytecode", program.len());
    Ok(program)
}
