//! `agentup`: check a manifest and keep an installed agent binary current.

mod cli;
mod error;
mod logging;
mod single_instance;

use std::process::ExitCode;
use std::time::Duration;

use agentup_core::Updater;
use agentup_platform::{Deadline, Platform};
use clap::Parser;
use log::debug;

use crate::cli::Cli;
use crate::error::AppError;
use crate::single_instance::InstallLock;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("agentup: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run(cli: &Cli) -> Result<(), AppError> {
    let lock = InstallLock::acquire(&cli.dir)?;
    debug!("Holding {}", lock.path().display());

    let platform = Platform::current();
    let updater = Updater::new(cli.updater_config(platform));
    let deadline = Deadline::after(Duration::from_secs(cli.timeout));

    if cli.check {
        let check = updater.check(deadline).await?;
        println!(
            "current={} remote={} update_available={}",
            display_version(&check.current_version),
            check.remote_version,
            check.update_available
        );
        if !check.notes.is_empty() {
            println!("notes: {}", check.notes);
        }
        return Ok(());
    }

    let result = updater.update(deadline).await?;
    if result.did_update {
        println!(
            "updated to {} ({})",
            result.remote_version,
            result.current_path.display()
        );
    } else {
        println!("already up to date ({})", result.remote_version);
    }
    Ok(())
}

fn display_version(version: &str) -> &str {
    if version.trim().is_empty() {
        "unknown"
    } else {
        version
    }
}
