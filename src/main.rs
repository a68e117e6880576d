//! Trellis setup CLI entry point.

use std::process::ExitCode;

use trellis_setup::cli::{parse_args, usage, Invocation};
use trellis_setup::config::SetupConfig;
use trellis_setup::runner::Orchestrator;
use trellis_setup::toolchain::PythonToolchain;
use trellis_setup::ui::{TerminalUI, UserInterface};
use trellis_setup::workspace::init_signal_handlers;
use trellis_setup::SetupError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by `RUST_LOG`; the default only shows
/// warnings. Logs go to stderr so they never mix with the report.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trellis_setup=warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    init_tracing();

    let selection = match parse_args(std::env::args().skip(1)) {
        Ok(Invocation::Help) => {
            println!("{}", usage());
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Install(selection)) => selection,
        Err(e) => {
            eprintln!("Error: {}\n", e);
            eprintln!("{}", usage());
            return ExitCode::from(e.exit_code());
        }
    };

    if let Err(e) = init_signal_handlers() {
        tracing::warn!("Could not install signal handlers: {}", e);
    }

    let config = SetupConfig::from_env();
    tracing::debug!("Configuration: {:?}", config);

    let mut ui = TerminalUI::new();
    let invocation_dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => return fail(&mut ui, SetupError::Io(e)),
    };

    let toolchain = PythonToolchain::new(&config);
    match Orchestrator::new(&toolchain, &config, invocation_dir).run(selection, &mut ui) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => fail(&mut ui, e),
    }
}

fn fail(ui: &mut dyn UserInterface, e: SetupError) -> ExitCode {
    ui.error(&format!("Error: {}", e));
    if let Some(remedy) = e.remedy() {
        ui.hint(&remedy);
    }
    ExitCode::from(e.exit_code())
}
