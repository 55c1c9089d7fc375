//! A small C-like language compiled to Brainfuck bytecode.

pub mod ast;
pub mod builtins;
pub mod codegen;
pub mod error;
pub mod interner;
pub mod lexer;
pub mod memory;
pub mod namespace;
pub mod parser;
pub mod pipeline;
pub mod shellio;
pub mod token;

pub use error::CompileError;
pub use pipeline::compile_source;
