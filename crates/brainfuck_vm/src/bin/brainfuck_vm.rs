use brainfuck_vm::{
    bytecode::Program,
    compiler::Compiler,
    machine::{MachineBuilder, MachineError, TapeKind},
};
use clap::{Parser, ValueHint};
use std::{
    fs,
    io::{stdin, stdout},
    path::PathBuf,
};

#[derive(Parser)]
#[clap(author, version, about = "Run a Brainfuck program", long_about = None)]
struct Args {
    #[clap(value_parser, value_hint=ValueHint::FilePath)]
    filename: PathBuf,
    /// Read the file as packed bytecode instead of Brainfuck text.
    #[clap(long)]
    binary: bool,
    #[clap(long, default_value = "info")]
    log: String,
    /// Print the execution trace once the program halts.
    #[clap(long)]
    trace: bool,
    /// Print the tape once the program halts.
    #[clap(long)]
    memory: bool,
    #[clap(long)]
    ram_size: Option<usize>,
    #[clap(long, value_enum, default_value_t = TapeKind::Fixed)]
    tape: TapeKind,
}

fn main() -> Result<(), MachineError> {
    let args = Args::parse();

    tracing_subscriber::fmt().with_env_filter(args.log).with_writer(std::io::stderr).init();

    let code = fs::read(&args.filename)?;
    let program = if args.binary {
        Program::from_bytes(code)?
    } else {
        Compiler::new(&String::from_utf8_lossy(&code)).compile()?
    };
    tracing::info!("Assembled {} bytes of bytecode", program.len());
    tracing::debug!("Bytecode:\n{program}");

    let mut builder = MachineBuilder::new(&program)
        .with_input(stdin())
        .with_output(stdout())
        .with_tape(args.tape)
        .with_trace(args.trace);
    if let Some(size) = args.ram_size {
        builder = builder.with_ram_size(size);
    }
    let mut bf_vm = builder.build()?;

    tracing::info!("Program execution");
    bf_vm.execute()?;
    tracing::info!("Executed {} units", bf_vm.registers().clk);

    if args.trace {
        tracing::info!("Execution trace: {:#?}", bf_vm.trace());
    }
    if args.memory {
        tracing::info!("Memory: {:?}", bf_vm.memory());
    }
    Ok(())
}
