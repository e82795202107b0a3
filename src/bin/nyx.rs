// ABOUTME: Runtime driver: parses, resolves imports, and interprets a Nyx script

use clap::Parser;
use log::LevelFilter;
use nyx::config::{DebugConfig, Quotas, DEFAULT_ENTRY_FILE, LANG_VERSION};
use nyx::env::Environment;
use nyx::error::NyxError;
use nyx::import::resolve_program;
use nyx::interpreter::{Interp, VmMode};
use std::path::PathBuf;
use std::process::ExitCode;

/// Nyx language runtime: executes a script with the tree interpreter or the
/// expression VM.
#[derive(Parser, Debug)]
#[command(name = "nyx")]
#[command(version = LANG_VERSION)]
#[command(about = "Run a Nyx script")]
struct Cli {
    /// Script to run; defaults to main.nx if omitted and readable.
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Arguments forwarded to the script, visible via argc()/argv().
    #[arg(last = true)]
    script_args: Vec<String>,

    /// Emit a per-statement trace to stderr.
    #[arg(long)]
    trace: bool,

    /// Parse the script, report errors, then exit without running it.
    #[arg(long, alias = "lint")]
    parse_only: bool,

    /// Use the expression VM, falling back to the tree walker per-expression.
    #[arg(long)]
    vm: bool,

    /// Use the expression VM and reject unsupported forms instead of
    /// falling back.
    #[arg(long)]
    vm_strict: bool,

    /// Allocation quota (array/object allocations); non-positive disables it.
    #[arg(long, value_name = "N")]
    max_alloc: Option<i64>,

    /// Statement quota; non-positive disables it.
    #[arg(long, value_name = "N")]
    max_steps: Option<i64>,

    /// Recursion bound on user function calls.
    #[arg(long, value_name = "N")]
    max_call_depth: Option<i64>,

    /// Start with the interactive debugger enabled.
    #[arg(long)]
    debug: bool,

    /// Pause before every statement (implies --debug).
    #[arg(long)]
    step: bool,

    /// Number of statements to auto-step before re-prompting.
    #[arg(long, value_name = "N", default_value_t = 0)]
    step_count: u32,

    /// Comma-separated source line numbers to break on (implies --debug).
    #[arg(long, value_name = "L1,L2,...")]
    r#break: Option<String>,

    /// Trace and honor breakpoints without blocking on stdin.
    #[arg(long)]
    debug_no_prompt: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.trace { LevelFilter::Trace } else { LevelFilter::Warn };
    let _ = simple_logger::SimpleLogger::new().with_level(level).init();

    let script = match cli.script.clone().or_else(|| {
        let default = PathBuf::from(DEFAULT_ENTRY_FILE);
        default.is_file().then_some(default)
    }) {
        Some(path) => path,
        None => {
            eprintln!("Error: no script given and {DEFAULT_ENTRY_FILE} is not readable");
            return ExitCode::FAILURE;
        }
    };

    let program = match resolve_program(&script) {
        Ok(p) => p,
        Err(e) => return report(e.into()),
    };

    if cli.parse_only {
        return ExitCode::SUCCESS;
    }

    let mut quotas = Quotas::default();
    if let Some(n) = cli.max_alloc {
        quotas.max_alloc = n;
    }
    if let Some(n) = cli.max_steps {
        quotas.max_steps = n;
    }
    if let Some(n) = cli.max_call_depth {
        quotas.max_call_depth = n;
    }

    let breakpoints: Vec<u32> = cli
        .r#break
        .as_deref()
        .map(|s| s.split(',').filter_map(|p| p.trim().parse().ok()).collect())
        .unwrap_or_default();
    let debug = DebugConfig {
        enabled: cli.debug || cli.step || cli.debug_no_prompt || !breakpoints.is_empty(),
        step: cli.step,
        step_count: cli.step_count,
        breakpoints,
        no_prompt: cli.debug_no_prompt,
    };

    let vm_mode = if cli.vm_strict {
        VmMode::Strict
    } else if cli.vm {
        VmMode::On
    } else {
        VmMode::Off
    };

    let entry_file: std::rc::Rc<str> = std::rc::Rc::from(script.to_string_lossy().as_ref());
    let interp = Interp::new(quotas, debug, vm_mode, cli.script_args, entry_file);
    let env = Environment::new();
    nyx::builtins::register_all(&env);

    match interp.run(&program, &env) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(e.into()),
    }
}

fn report(err: NyxError) -> ExitCode {
    eprintln!("{err}");
    ExitCode::FAILURE
}
