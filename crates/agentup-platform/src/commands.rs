use std::io;
use std::process::{Output, Stdio};

use log::{debug, trace};
use thiserror::Error;
use tokio::process::Command;

use crate::deadline::Deadline;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

const STDERR_SNIPPET_CHARS: usize = 240;

pub trait HideWindow {
    fn hide_window(&mut self) -> &mut Self;
}

impl HideWindow for Command {
    #[cfg(windows)]
    fn hide_window(&mut self) -> &mut Self {
        self.creation_flags(CREATE_NO_WINDOW)
    }

    #[cfg(not(windows))]
    fn hide_window(&mut self) -> &mut Self {
        self
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with code {}{}", display_code(.code.as_ref()), stderr_snippet(.stderr.as_str()))]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{program} did not finish before the deadline")]
    Timeout { program: String },
}

impl CommandError {
    /// Exit code of the child when it ran to completion with a failure.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandError::Exit { code, .. } => *code,
            _ => None,
        }
    }
}

/// Run `command` to completion without a console window, bounded by
/// `deadline`.
///
/// Stdin is closed so a supervised child never blocks on the caller's
/// terminal. The child is killed if the deadline drops it.
///
/// # Errors
/// Returns an error when the program cannot be spawned, exits unsuccessfully,
/// or is still running when the deadline passes.
pub async fn run_bounded(command: &mut Command, deadline: Deadline) -> Result<Output, CommandError> {
    let program = command.as_std().get_program().to_string_lossy().to_string();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .hide_window();

    debug!("Running {program} (deadline in {:?})", deadline.remaining());

    let output = deadline
        .run(command.output())
        .await
        .map_err(|_| CommandError::Timeout {
            program: program.clone(),
        })?
        .map_err(|source| CommandError::Spawn {
            program: program.clone(),
            source,
        })?;

    trace!("{program} stdout: {}", String::from_utf8_lossy(&output.stdout));

    if output.status.success() {
        Ok(output)
    } else {
        Err(CommandError::Exit {
            program,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn display_code(code: Option<&i32>) -> String {
    code.map_or_else(|| "none (terminated by signal)".to_string(), ToString::to_string)
}

fn stderr_snippet(stderr: &str) -> String {
    let snippet: String = stderr.chars().take(STDERR_SNIPPET_CHARS).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}
