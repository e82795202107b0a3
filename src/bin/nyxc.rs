// ABOUTME: Transpiler driver: lowers a resolved Nyx program to a single C translation unit

use clap::Parser;
use nyx::codegen;
use nyx::config::LANG_VERSION;
use nyx::error::NyxError;
use nyx::import::resolve_program;
use std::path::PathBuf;
use std::process::ExitCode;

/// Nyx-to-C transpiler.
#[derive(Parser, Debug)]
#[command(name = "nyxc")]
#[command(version = LANG_VERSION)]
#[command(about = "Compile a Nyx script to a C translation unit")]
struct Cli {
    /// Script to compile.
    input: PathBuf,

    /// Where to write the generated C source.
    output: PathBuf,

    /// Copy the compiler's own source to the output instead of compiling.
    #[arg(long)]
    emit_self: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.emit_self {
        return match std::fs::copy(file!(), &cli.output) {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => report(NyxError::Io(format!("--emit-self: {e}"))),
        };
    }

    let program = match resolve_program(&cli.input) {
        Ok(p) => p,
        Err(e) => return report(e.into()),
    };

    let c_source = match codegen::generate(&program) {
        Ok(c) => c,
        Err(e) => return report(e.into()),
    };

    match std::fs::write(&cli.output, c_source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(NyxError::Io(format!("writing {}: {e}", cli.output.display()))),
    }
}

fn report(err: NyxError) -> ExitCode {
    eprintln!("{err}");
    ExitCode::FAILURE
}
