use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use nexa_core::{CompileOptions, compile_wasm, emit_llvm_ir, run_wasm};

/// Compile Nexa programs to LLVM IR or wasm.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long, help = "Source file (reads stdin when omitted)")]
    input: Option<PathBuf>,

    #[arg(
        short,
        long,
        help = "Output file (LLVM IR is written to stdout when omitted)"
    )]
    output: Option<PathBuf>,

    #[arg(
        long,
        value_enum,
        value_name = "FORMAT",
        default_value_t = Emit::Llvm,
        help = "Output format"
    )]
    emit: Emit,

    #[arg(long, help = "Run the program and report its exit code")]
    run: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Emit {
    Llvm,
    Wasm,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    execute(cli)
}

/// Install a stderr subscriber, but only when `RUST_LOG` asks for one.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn execute(cli: Cli) -> Result<()> {
    let (source, module_name) = match &cli.input {
        Some(path) => (
            fs::read_to_string(path)
                .with_context(|| format!("failed to read input file {}", path.display()))?,
            path.file_name().map_or_else(
                || path.display().to_string(),
                |name| name.to_string_lossy().into_owned(),
            ),
        ),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            (buffer, "stdin".to_string())
        }
    };
    let options = CompileOptions { module_name };
    tracing::debug!(module = %options.module_name, emit = ?cli.emit, run = cli.run, "compiling");

    if cli.emit == Emit::Wasm && cli.output.is_none() && !cli.run {
        bail!("--emit wasm requires --output");
    }

    if cli.emit == Emit::Llvm {
        let ir = emit_llvm_ir(&source, &options).context("compilation failed")?;
        match &cli.output {
            Some(path) => write_output(path, ir.as_bytes())?,
            // With --run, stdout belongs to the program.
            None if !cli.run => print!("{ir}"),
            None => {}
        }
    }

    if cli.emit == Emit::Wasm || cli.run {
        let artifact = compile_wasm(&source, &options).context("compilation failed")?;
        if let (Emit::Wasm, Some(path)) = (cli.emit, &cli.output) {
            write_output(path, &artifact.wasm)?;
        }
        if cli.run {
            run(&artifact.wasm)?;
        }
    }
    Ok(())
}

fn run(wasm: &[u8]) -> Result<()> {
    let execution = run_wasm(wasm).context("failed to execute program")?;
    print!("{}", execution.stdout);
    println!("Program exited with {}", execution.exit_code);
    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    fs::write(path, bytes)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}
