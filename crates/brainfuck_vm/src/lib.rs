//! Packed Brainfuck bytecode, its builder and its interpreter.

pub mod builder;
pub mod bytecode;
pub mod compiler;
pub mod instruction;
pub mod machine;
pub mod registers;
pub mod test_helper;
