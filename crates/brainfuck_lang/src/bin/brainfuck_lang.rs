use brainfuck_lang::shellio::{self, InputFormat, OutputFormat, ShellError};
use brainfuck_vm::machine::{MachineBuilder, MachineError, TapeKind};
use clap::{ArgGroup, Parser, ValueHint};
use std::{
    io::{stdin, stdout},
    path::PathBuf,
    process::ExitCode,
};
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(author, version, about = "Compile programs to Brainfuck and run them", long_about = None)]
#[command(group(
    ArgGroup::new("input_mode")
        .args(["cbf", "bf", "source"])
        .required(true)
))]
#[command(group(
    ArgGroup::new("action")
        .args(["output_cbf", "output_bf", "execute"])
        .required(true)
        .multiple(true)
))]
struct Cli {
    /// Load packed bytecode (`-` for stdin).
    #[clap(short = 'i', long, value_hint = ValueHint::FilePath)]
    cbf: Option<PathBuf>,
    /// Load textual Brainfuck (`-` for stdin).
    #[clap(short = 'I', long, value_hint = ValueHint::FilePath)]
    bf: Option<PathBuf>,
    /// Compile a source file (`-` for stdin).
    #[clap(short = 's', long, value_hint = ValueHint::FilePath)]
    source: Option<PathBuf>,
    /// Write packed bytecode (`-` for stdout).
    #[clap(short = 'o', long, value_hint = ValueHint::FilePath)]
    output_cbf: Option<PathBuf>,
    /// Write textual Brainfuck (`-` for stdout).
    #[clap(short = 'O', long, value_hint = ValueHint::FilePath)]
    output_bf: Option<PathBuf>,
    /// Run the program against stdin and stdout.
    #[clap(short = 'x', long)]
    execute: bool,
    /// Log Level.
    #[clap(long, default_value = "warn")]
    log: String,
    #[clap(long, value_enum, default_value_t = TapeKind::Fixed)]
    tape: TapeKind,
    /// Configure the size of the memory.
    #[clap(long)]
    ram_size: Option<usize>,
    /// Value read into the cell once input is exhausted.
    #[clap(long)]
    eof: Option<u8>,
    /// Print the tape to stderr after running.
    #[clap(long)]
    memory: bool,
    /// Print the bytecode listing to stderr.
    #[clap(long)]
    disassemble: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("no input given")]
    MissingInput,
    #[error(transparent)]
    Shell(#[from] ShellError),
    #[error(transparent)]
    Machine(#[from] MachineError),
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let (format, path) = match (&cli.cbf, &cli.bf, &cli.source) {
        (Some(path), _, _) => (InputFormat::Packed, path),
        (_, Some(path), _) => (InputFormat::Text, path),
        (_, _, Some(path)) => (InputFormat::Source, path),
        (None, None, None) => return Err(CliError::MissingInput),
    };

    tracing::info!("Loading {}", path.display());
    let program = shellio::load(format, path)?;
    tracing::info!("Loaded {} bytes of bytecode", program.len());
    if cli.disassemble {
        eprint!("{program}");
    }

    if let Some(path) = &cli.output_cbf {
        tracing::info!("Writing packed bytecode to {}", path.display());
        shellio::store(OutputFormat::Packed, &program, path)?;
    }
    if let Some(path) = &cli.output_bf {
        tracing::info!("Writing Brainfuck to {}", path.display());
        shellio::store(OutputFormat::Text, &program, path)?;
    }

    if cli.execute {
        let mut builder = MachineBuilder::new(&program)
            .with_input(stdin())
            .with_output(stdout())
            .with_tape(cli.tape);
        if let Some(size) = cli.ram_size {
            builder = builder.with_ram_size(size);
        }
        if let Some(eof) = cli.eof {
            builder = builder.with_eof_value(eof);
        }
        let mut machine = builder.build()?;

        tracing::info!("Program execution");
        machine.execute()?;
        tracing::info!("Executed {} units", machine.registers().clk);
        if cli.memory {
            eprintln!("{:?}", machine.memory());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_env_filter(cli.log.as_str()).with_writer(std::io::stderr).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
