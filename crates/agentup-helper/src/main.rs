//! Out-of-process binary swap.
//!
//! Launched by the updater when the running agent cannot be replaced from
//! inside its own process tree. Stops the service, swaps the binaries, starts
//! the service again and reports the outcome through its exit code:
//!
//! - `0` swapped and started
//! - `1` invalid arguments
//! - `2` a rename failed; the previous binary is back
//! - `3` the service failed to start; the previous binary was restored

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use agentup_core::{HELPER_EXIT_START, HELPER_EXIT_SWAP, SwapError, SwapPolicy, swap_binaries};
use agentup_platform::{Deadline, Platform, StagingPaths};
use agentup_service::select_controller;
use clap::Parser;
use clap::error::ErrorKind;
use log::{error, info};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

const EXIT_USAGE: u8 = 1;
const HELPER_DEADLINE: Duration = Duration::from_secs(120);

#[derive(Debug, Parser)]
#[command(
    name = "agentup-helper",
    version,
    about = "Replace the agent binary while its service is stopped"
)]
struct Args {
    /// Installed executable.
    #[arg(long)]
    current: PathBuf,
    /// Verified replacement staged next to it.
    #[arg(long)]
    new: PathBuf,
    /// Where the previous executable is kept.
    #[arg(long)]
    old: PathBuf,
    /// Service to stop and start; omitted or blank means none.
    #[arg(long)]
    service: Option<String>,
    /// NSSM binary, or `SC` to force the built-in service control manager.
    #[arg(long)]
    nssm: Option<String>,
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => return ExitCode::from(usage_exit(&error)),
    };

    init_logging(args.verbose);
    ExitCode::from(run(args).await)
}

fn usage_exit(error: &clap::Error) -> u8 {
    let _ = error.print();
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => EXIT_USAGE,
    }
}

fn init_logging(verbose: bool) {
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("agentup")
        .build();
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Never);
}

async fn run(args: Args) -> u8 {
    let controller = select_controller(
        &Platform::current(),
        args.service.as_deref(),
        args.nssm.as_deref(),
    );
    let paths = StagingPaths::new(args.current, args.new, args.old);

    info!(
        "Swapping {} -> {} (service {})",
        paths.new.display(),
        paths.current.display(),
        controller.name()
    );

    let deadline = Deadline::after(HELPER_DEADLINE);
    match swap_binaries(controller.as_ref(), &paths, &SwapPolicy::default(), deadline).await {
        Ok(backup) => {
            info!("Update applied, backup at {}", backup.display());
            0
        }
        Err(swap_error) => {
            error!("{swap_error}");
            exit_code(&swap_error)
        }
    }
}

fn exit_code(error: &SwapError) -> u8 {
    match error {
        SwapError::Swap(_) => HELPER_EXIT_SWAP,
        SwapError::Start(_) => HELPER_EXIT_START,
    }
}
