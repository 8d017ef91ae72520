use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use mscdec::bytecode::container::load_program;
use mscdec::bytecode::disasm::print_program;
use mscdec::decompile::analysis::analyze_program;
use mscdec::lang::printer::{render_source, render_split};
use mscdec::{decompile_program, DecompilerConfig, SymbolTable};

#[derive(Parser, Debug)]
#[command(name = "mscdec", about = "Decompile MSC script bytecode to C-like source")]
struct Args {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decompile a program dump to source
    Decompile {
        /// Serialized program dump
        input: PathBuf,

        /// Output file (defaults to the input with a `.c` extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write library functions to `stdlib.c` next to the output
        #[arg(long)]
        split: bool,

        /// JSON symbol table for syscalls and globals
        #[arg(long)]
        symbols: Option<PathBuf>,
    },

    /// Print the analyzed instruction stream of every script
    Disasm {
        /// Serialized program dump
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Decompile {
            input,
            output,
            split,
            symbols,
        } => decompile(&input, output, split, symbols.as_deref()),
        Command::Disasm { input } => disasm(&input),
    }
}

fn decompile(input: &Path, output: Option<PathBuf>, split: bool, symbols: Option<&Path>) -> Result<()> {
    let program = load_program(input)
        .with_context(|| format!("failed to load program from {}", input.display()))?;

    let mut config = DecompilerConfig::default();
    if let Some(path) = symbols {
        let table = SymbolTable::load(path)
            .with_context(|| format!("failed to load symbols from {}", path.display()))?;
        config = config.with_symbols(table);
    }

    let result = decompile_program(&program, &config);
    for (script, error) in &result.failed {
        warn!(%script, %error, "script needs manual review");
    }

    let output = output.unwrap_or_else(|| input.with_extension("c"));
    if split {
        let (library, main) = render_split(&result.source);
        let library_path = output.with_file_name("stdlib.c");
        write(&library_path, &library)?;
        write(&output, &main)?;
    } else {
        write(&output, &render_source(&result.source))?;
    }

    info!(
        functions = result.source.functions.len(),
        failed = result.failed.len(),
        "decompiled {}",
        input.display()
    );
    Ok(())
}

fn disasm(input: &Path) -> Result<()> {
    let mut program = load_program(input)
        .with_context(|| format!("failed to load program from {}", input.display()))?;
    program.rename_entry_point();
    analyze_program(&mut program, &DecompilerConfig::default());
    print_program(&program);
    Ok(())
}

fn write(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}
