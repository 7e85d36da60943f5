//! Smoke-test harness for `impulse-core`: loads a JSON dump of an
//! [`impulse_core::ir::Module`] and runs one function against it, printing
//! the stable [`impulse_core::VmResult`] textual form.
//!
//! This is not a frontend for Impulse source text — it only ever consumes
//! an already-built IR module dump, exactly as `vm::Vm` expects.

use std::error::Error as StdError;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, Level};
use tracing_subscriber::{fmt, EnvFilter};

use impulse_core::common::InterpreterConfig;
use impulse_core::ir::Module;
use impulse_core::vm::{Vm, VmStatus};

#[derive(Parser)]
#[command(name = "impulse", about = "Run a JSON-dumped Impulse IR module")]
struct Cli {
    /// Path to a JSON dump of an `ir::Module`.
    module_path: PathBuf,

    /// Name of the function to run after loading the module.
    #[arg(long)]
    run: String,

    /// Optional TOML config file (GC thresholds, optimiser toggles, trace verbosity).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase log verbosity; repeatable (`-v`, `-vv`, `-vvv`).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter = EnvFilter::from_default_env()
        .add_directive(format!("impulse_core={level}").parse().unwrap());
    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    if let Err(err) = run(&cli) {
        error!("{err}");
        let mut cause = err.source();
        while let Some(source) = cause {
            error!("  caused by: {source}");
            cause = source.source();
        }
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn StdError>> {
    let config = match &cli.config {
        Some(path) => InterpreterConfig::load_from_file(path)?.with_env_overrides(),
        None => InterpreterConfig::default().with_env_overrides(),
    };

    let data = std::fs::read_to_string(&cli.module_path)?;
    let module: Module = serde_json::from_str(&data)?;
    let module_name = module.dotted_name();

    let mut vm = Vm::new(config);
    let load_result = vm.load(module);
    for diagnostic in &load_result.diagnostics {
        error!("load diagnostic: {diagnostic}");
    }

    let result = vm.run(&module_name, &cli.run);
    println!("{result}");

    if matches!(result.status, VmStatus::RuntimeError | VmStatus::ModuleError) {
        process::exit(1);
    }
    Ok(())
}
