use crate::{bytecode::Program, machine::Machine};
use std::{
    cell::RefCell,
    io::{Cursor, Write},
    rc::Rc,
};

/// An output stream whose contents stay readable after the machine took ownership of it.
#[derive(Debug, Clone, Default)]
pub struct TestWriter {
    buffer: Rc<RefCell<Vec<u8>>>,
}

impl TestWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_output(&self) -> Vec<u8> {
        self.buffer.borrow().clone()
    }
}

impl Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Builds a machine with a fixed tape reading from `input`, along with a handle on its output.
pub fn create_test_machine(code: &Program, input: &[u8]) -> (Machine, TestWriter) {
    let input = Cursor::new(input.to_vec());
    let output = TestWriter::new();
    let test_output = output.clone();
    let machine = Machine::new(code, input, output).expect("Failed to create test machine");
    (machine, test_output)
}
