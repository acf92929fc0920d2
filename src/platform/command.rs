use std::ffi::OsStr;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::authorization::{is_sudo_rejection, Authorization, Privilege};
use crate::core::DaemonError;

/// Captured output of a successful command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` under `auth`, feeding `stdin` if given; non-zero exit is an error
pub async fn run<I, S>(
    auth: &Authorization,
    program: &OsStr,
    args: I,
    stdin: Option<&[u8]>,
) -> Result<CommandOutput, DaemonError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program_name = program.to_string_lossy().into_owned();
    let mut cmd = auth.command(program, args);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() });

    debug!("Running {:?}", cmd.as_std());

    let mut child = cmd.spawn().map_err(|e| DaemonError::Spawn {
        program: program_name.clone(),
        source: e,
    })?;

    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(input)
                .await
                .map_err(|e| DaemonError::io(format!("Failed to write to {}", program_name), e))?;
        }
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| DaemonError::io(format!("Failed to wait for {}", program_name), e))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if output.status.success() {
        return Ok(CommandOutput { stdout, stderr });
    }

    if auth.privilege() == Privilege::Sudo && is_sudo_rejection(&stderr) {
        return Err(DaemonError::Authorization(format!(
            "sudo rejected the request to run {}: {}",
            program_name,
            stderr.trim()
        )));
    }

    Err(DaemonError::Subprocess {
        program: program_name,
        code: output.status.code().unwrap_or(-1),
        stderr,
    })
}
