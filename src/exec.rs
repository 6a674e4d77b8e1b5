use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

/// Result of running an external tool with a deadline.
#[derive(Debug)]
pub enum CommandOutcome {
    Success { stdout: String },
    NonZeroExit { code: Option<i32>, stderr: String },
    NotFound,
    TimedOut,
}

/// Runs `program` with `args`, capturing stdout and stderr, and kills the
/// child if it outlives `limit`.
pub async fn run_command(program: &str, args: &[&str], limit: Duration) -> CommandOutcome {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(limit, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) if err.kind() == ErrorKind::NotFound => return CommandOutcome::NotFound,
        Ok(Err(err)) => {
            // Spawn failures other than a missing binary degrade the same way.
            debug!(program, error = %err, "failed to spawn command");
            return CommandOutcome::NotFound;
        }
        Err(_) => return CommandOutcome::TimedOut,
    };

    if output.status.success() {
        CommandOutcome::Success {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        }
    } else {
        CommandOutcome::NonZeroExit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}
