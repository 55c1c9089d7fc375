use crate::{
    bytecode::{decode_unit, jump_target, BytecodeError, Program, Unit},
    registers::Registers,
};
use std::io::{ErrorKind, Read, Write};
use thiserror::Error;

/// Custom error type for the Machine.
#[derive(Debug, Error)]
pub enum MachineError {
    /// I/O operation failed.
    #[error("I/O operation failed: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed bytecode.
    #[error("Bytecode error: {0}")]
    Bytecode(#[from] BytecodeError),

    /// The pointer of a growable tape moved left of its first cell.
    #[error("Tape pointer moved left of cell 0 at byte {0}")]
    TapeUnderflow(usize),

    /// A tape needs at least one cell.
    #[error("Tape size must be at least one cell")]
    EmptyTape,
}

/// How the tape behaves at its edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TapeKind {
    /// A fixed number of cells; the pointer wraps around at both ends.
    #[default]
    Fixed,
    /// Doubles its length whenever the pointer runs past the end.
    Growable,
}

impl TapeKind {
    pub const fn default_size(self) -> usize {
        match self {
            Self::Fixed => Machine::DEFAULT_RAM_SIZE,
            Self::Growable => Machine::DEFAULT_GROWABLE_SIZE,
        }
    }
}

pub struct MachineBuilder {
    code: Program,
    input: Option<Box<dyn Read>>,
    output: Option<Box<dyn Write>>,
    ram_size: Option<usize>,
    tape: TapeKind,
    eof: u8,
    trace: bool,
}

impl MachineBuilder {
    /// Creates a new [`MachineBuilder`] with the specified program.
    pub fn new(code: &Program) -> Self {
        Self {
            code: code.clone(),
            input: None,
            output: None,
            ram_size: None,
            tape: TapeKind::default(),
            eof: Machine::DEFAULT_EOF,
            trace: false,
        }
    }

    /// Sets the input stream for the machine.
    #[must_use]
    pub fn with_input<R: Read + 'static>(mut self, input: R) -> Self {
        self.input = Some(Box::new(input));
        self
    }

    /// Sets the output stream for the machine.
    #[must_use]
    pub fn with_output<W: Write + 'static>(mut self, output: W) -> Self {
        self.output = Some(Box::new(output));
        self
    }

    /// Sets the RAM size for the machine, the initial size for a growable tape.
    #[must_use]
    pub const fn with_ram_size(mut self, ram_size: usize) -> Self {
        self.ram_size = Some(ram_size);
        self
    }

    #[must_use]
    pub const fn with_tape(mut self, tape: TapeKind) -> Self {
        self.tape = tape;
        self
    }

    /// Sets the value stored by an input read once the input stream is exhausted.
    #[must_use]
    pub const fn with_eof_value(mut self, eof: u8) -> Self {
        self.eof = eof;
        self
    }

    /// Records the registers before every executed unit.
    #[must_use]
    pub const fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Builds the [`Machine`] instance with the provided configuration.
    pub fn build(self) -> Result<Machine, MachineError> {
        let (Some(input), Some(output)) = (self.input, self.output) else {
            return Err(std::io::Error::new(
                ErrorKind::Other,
                "Input and output streams must be provided",
            )
            .into());
        };
        let ram_size = self.ram_size.unwrap_or_else(|| self.tape.default_size());
        if ram_size == 0 {
            return Err(MachineError::EmptyTape);
        }

        Ok(Machine {
            program: ProgramMemory { code: self.code },
            state: MutableState {
                ram: vec![0; ram_size],
                registers: Registers::new(),
                tape: self.tape,
            },
            io: IO { input, output, eof: self.eof },
            trace: self.trace.then(Vec::new),
        })
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProgramMemory {
    code: Program,
}

impl ProgramMemory {
    pub const fn new(code: Program) -> Self {
        Self { code }
    }

    pub const fn code(&self) -> &Program {
        &self.code
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MutableState {
    ram: Vec<u8>,
    registers: Registers,
    tape: TapeKind,
}

impl MutableState {
    fn cell(&self) -> u8 {
        self.ram[self.registers.mp]
    }

    fn set_cell(&mut self, value: u8) {
        let mp = self.registers.mp;
        self.ram[mp] = value;
    }

    fn add(&mut self, delta: i8) {
        let mp = self.registers.mp;
        self.ram[mp] = self.ram[mp].wrapping_add_signed(delta);
    }

    fn shift(&mut self, by: i8) -> Result<(), MachineError> {
        let len = self.ram.len();
        let target = self.registers.mp as isize + isize::from(by);
        self.registers.mp = match self.tape {
            TapeKind::Fixed => target.rem_euclid(len as isize) as usize,
            TapeKind::Growable => {
                let target = usize::try_from(target)
                    .map_err(|_| MachineError::TapeUnderflow(self.registers.ip))?;
                if target >= len {
                    self.ram.resize((len * 2).max((target + 1).next_power_of_two()), 0);
                }
                target
            }
        };
        Ok(())
    }
}

pub struct IO {
    input: Box<dyn Read>,
    output: Box<dyn Write>,
    eof: u8,
}

impl IO {
    fn read_byte(&mut self) -> Result<u8, MachineError> {
        self.output.flush()?;
        let mut buf = [0; 1];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => return Ok(self.eof),
                Ok(_) => return Ok(buf[0]),
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl std::fmt::Debug for IO {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IO").field("eof", &self.eof).finish_non_exhaustive()
    }
}

/// Executes a [`Program`] one unit at a time against a byte tape.
#[derive(Debug)]
pub struct Machine {
    program: ProgramMemory,
    state: MutableState,
    io: IO,
    trace: Option<Vec<Registers>>,
}

impl Machine {
    /// 64 KiB, the classic fixed tape.
    pub const DEFAULT_RAM_SIZE: usize = 1 << 16;
    pub const DEFAULT_GROWABLE_SIZE: usize = 16;
    /// `getchar`'s EOF truncated to a byte.
    pub const DEFAULT_EOF: u8 = 0xFF;

    pub fn new_with_config<R, W>(
        code: &Program,
        input: R,
        output: W,
        ram_size: usize,
    ) -> Result<Self, MachineError>
    where
        R: Read + 'static,
        W: Write + 'static,
    {
        MachineBuilder::new(code)
            .with_input(input)
            .with_output(output)
            .with_ram_size(ram_size)
            .build()
    }

    pub fn new<R, W>(code: &Program, input: R, output: W) -> Result<Self, MachineError>
    where
        R: Read + 'static,
        W: Write + 'static,
    {
        MachineBuilder::new(code).with_input(input).with_output(output).build()
    }

    /// Runs until an END unit or the end of the program.
    pub fn execute(&mut self) -> Result<(), MachineError> {
        while self.step()? {}

        // Last clock cycle
        self.state.registers.ci = 0;
        self.write_trace();
        self.io.output.flush()?;
        Ok(())
    }

    /// Executes the unit at the instruction pointer, returning whether execution goes on.
    fn step(&mut self) -> Result<bool, MachineError> {
        let code = self.program.code.as_bytes();
        let ip = self.state.registers.ip;
        let Some(&control) = code.get(ip) else {
            return Ok(false);
        };
        self.state.registers.ci = control;
        if let Some(trace) = &mut self.trace {
            trace.push(self.state.registers.clone());
        }

        let (unit, next) = decode_unit(code, ip)?;
        let next = match unit {
            Unit::End => return Ok(false),
            Unit::Compute(_) => {
                for (shift, delta) in unit.pairs() {
                    self.state.shift(shift)?;
                    self.state.add(delta);
                }
                next
            }
            Unit::Input => {
                let byte = self.io.read_byte()?;
                self.state.set_cell(byte);
                next
            }
            Unit::Output => {
                self.io.output.write_all(&[self.state.cell()])?;
                next
            }
            Unit::JumpForward { .. } if self.state.cell() == 0 => jump_target(&unit, ip)?,
            Unit::JumpBackward { .. } if self.state.cell() != 0 => jump_target(&unit, ip)?,
            Unit::JumpForward { .. } | Unit::JumpBackward { .. } => next,
        };

        self.state.registers.ip = next;
        self.state.registers.clk += 1;
        self.state.registers.mv = self.state.cell();
        Ok(true)
    }

    fn write_trace(&mut self) {
        if let Some(trace) = &mut self.trace {
            trace.push(self.state.registers.clone());
        }
    }

    /// Register snapshots recorded so far; empty unless tracing was enabled.
    pub fn trace(&self) -> &[Registers] {
        self.trace.as_deref().unwrap_or_default()
    }

    pub const fn registers(&self) -> &Registers {
        &self.state.registers
    }

    /// The tape, as it stands.
    pub fn memory(&self) -> &[u8] {
        &self.state.ram
    }

    pub const fn program(&self) -> &ProgramMemory {
        &self.program
    }
}
