//! Run an external command line to completion.

use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

/// Split `command_line` on whitespace and run it in `working_dir` with the
/// parent's stdio. Blocks until the child exits.
pub fn run_command(command_line: &str, working_dir: &Path) -> io::Result<ExitStatus> {
    let mut parts = command_line.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;
    tracing::info!("running `{}` in {}", command_line, working_dir.display());
    let status = Command::new(program)
        .args(parts)
        .current_dir(working_dir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;
    if !status.success() {
        tracing::warn!("`{}` exited with {}", command_line, status);
    }
    Ok(status)
}
