//! Running external tools

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::CollaboratorError;

/// Run `program` with `args` to completion
///
/// `input`, when given, is written to the child's stdin; secrets travel
/// this way and never on the command line. Stdout is discarded and stderr
/// is captured for the error.
pub async fn run<I, S>(program: &str, args: I, input: Option<&[u8]>) -> Result<(), CollaboratorError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let spawn_err = |source| CollaboratorError::Spawn {
        program: program.to_string(),
        source,
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(program, "Running command");
    let mut child = command.spawn().map_err(spawn_err)?;

    if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
        match stdin.write_all(input).await {
            Ok(()) => {}
            // The exit status reports why the child stopped reading
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
            Err(e) => return Err(spawn_err(e)),
        }
    }

    let output = child.wait_with_output().await.map_err(spawn_err)?;
    if output.status.success() {
        Ok(())
    } else {
        Err(CollaboratorError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
