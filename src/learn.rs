//! Feeding messages to external spam/ham learners.

use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::{DetachError, Result};

/// Pipe `message` into `argv` and wait for it.
///
/// Returns whether the command exited successfully. Only a command that
/// cannot be started, or whose input cannot be written, is an error; a
/// command that exits without reading everything is judged by its exit
/// status. The child is always waited for.
pub fn learn(argv: &[String], message: &[u8]) -> Result<bool> {
    let command = argv.join(" ");
    let Some((program, args)) = argv.split_first() else {
        return Err(DetachError::Learn {
            command,
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
        });
    };
    let failed = |source| DetachError::Learn {
        command: command.clone(),
        source,
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .spawn()
        .map_err(failed)?;

    let written = match child.stdin.take() {
        Some(mut stdin) => match stdin.write_all(message) {
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!(command = %command, "Learn command stopped reading its input");
                Ok(())
            }
            other => other,
        },
        None => Ok(()),
    };
    let status = child.wait().map_err(failed)?;
    written.map_err(failed)?;

    if status.success() {
        info!(command = %command, "Learn command finished");
    } else {
        warn!(command = %command, status = %status, "Learn command failed");
    }
    Ok(status.success())
}
