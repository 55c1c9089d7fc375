//! Reading and writing the files named on the command line. A path of `-` stands for stdin or
//! stdout.

use crate::{error::CompileError, pipeline::compile_source};
use brainfuck_vm::{
    bytecode::{BytecodeError, Program},
    compiler::Compiler,
};
use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("{}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("{}: {source}", .path.display())]
    Bytecode { path: PathBuf, source: BytecodeError },
    #[error("{}: {source}", .path.display())]
    Compile { path: PathBuf, source: CompileError },
}

/// How an input file is to be understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Packed bytecode (`.cbf`).
    Packed,
    /// Textual Brainfuck (`.bf`).
    Text,
    /// Source in the high-level language.
    Source,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Packed,
    Text,
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

pub fn read_bytes(path: &Path) -> Result<Vec<u8>, ShellError> {
    let io_error = |source| ShellError::Io { path: path.to_owned(), source };
    if is_stdio(path) {
        let mut bytes = Vec::new();
        io::stdin().lock().read_to_end(&mut bytes).map_err(io_error)?;
        Ok(bytes)
    } else {
        fs::read(path).map_err(io_error)
    }
}

pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), ShellError> {
    let io_error = |source| ShellError::Io { path: path.to_owned(), source };
    if is_stdio(path) {
        let mut stdout = io::stdout().lock();
        stdout.write_all(bytes).and_then(|()| stdout.flush()).map_err(io_error)
    } else {
        fs::write(path, bytes).map_err(io_error)
    }
}

/// Reads `path` and turns it into bytecode according to `format`.
pub fn load(format: InputFormat, path: &Path) -> Result<Program, ShellError> {
    let bytes = read_bytes(path)?;
    tracing::debug!("read {} bytes from {}", bytes.len(), path.display());
    match format {
        InputFormat::Packed => Program::from_bytes(bytes)
            .map_err(|source| ShellError::Bytecode { path: path.to_owned(), source }),
        InputFormat::Text => Compiler::new(&String::from_utf8_lossy(&bytes))
            .compile()
            .map_err(|source| ShellError::Bytecode { path: path.to_owned(), source }),
        InputFormat::Source => {
            let source = String::from_utf8(bytes).map_err(|err| ShellError::Io {
                path: path.to_owned(),
                source: io::Error::new(io::ErrorKind::InvalidData, err),
            })?;
            compile_source(&source)
                .map_err(|source| ShellError::Compile { path: path.to_owned(), source })
        }
    }
}

/// Writes `program` to `path`. Text output ends with a newline.
pub fn store(format: OutputFormat, program: &Program, path: &Path) -> Result<(), ShellError> {
    match format {
        OutputFormat::Packed => write_bytes(path, program.as_bytes()),
        OutputFormat::Text => {
            let mut text = program
                .to_brainfuck()
                .map_err(|source| ShellError::Bytecode { path: path.to_owned(), source })?;
            text.push('\n');
            write_bytes(path, text.as_bytes())
        }
    }
}
