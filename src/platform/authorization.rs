use std::ffi::OsStr;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::core::DaemonError;

const SUDO: &str = "/usr/bin/sudo";
const ID: &str = "/usr/bin/id";

/// How privileged operations are carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Plain user, no elevation available
    User,
    /// The process already runs as root
    Root,
    /// Elevate through a cached sudo ticket
    Sudo,
}

/// Credential threaded through every privileged operation
#[derive(Debug, Clone)]
pub struct Authorization {
    privilege: Privilege,
}

impl Authorization {
    /// Unprivileged credential
    pub fn user() -> Self {
        Self::with_privilege(Privilege::User)
    }

    pub fn with_privilege(privilege: Privilege) -> Self {
        Self { privilege }
    }

    /// Root if the effective uid is 0, plain user otherwise
    pub async fn detect() -> Self {
        let output = Command::new(ID).arg("-u").output().await;
        match output {
            Ok(out) if out.status.success() && String::from_utf8_lossy(&out.stdout).trim() == "0" => {
                debug!("Running as root");
                Self::with_privilege(Privilege::Root)
            }
            Ok(_) => Self::user(),
            Err(e) => {
                debug!("Could not determine effective uid: {}", e);
                Self::user()
            }
        }
    }

    /// Obtain or refresh a sudo ticket, prompting on the terminal when `interactive`
    pub async fn acquire_sudo(interactive: bool) -> Result<Self, DaemonError> {
        let mut cmd = Command::new(SUDO);
        if interactive {
            cmd.arg("-v")
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::piped());
        } else {
            cmd.args(["-n", "-v"]).stdin(Stdio::null()).stderr(Stdio::piped());
        }

        let output = cmd.output().await.map_err(|e| DaemonError::Spawn {
            program: SUDO.to_string(),
            source: e,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(DaemonError::Authorization(if stderr.is_empty() {
                "sudo refused to grant elevated privileges".to_string()
            } else {
                stderr
            }));
        }

        info!("Elevated authorization granted via sudo");
        Ok(Self::with_privilege(Privilege::Sudo))
    }

    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    pub fn is_privileged(&self) -> bool {
        !matches!(self.privilege, Privilege::User)
    }

    /// Command for `program`, wrapped in `sudo -n` when elevating through sudo
    pub fn command<I, S>(&self, program: &OsStr, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        match self.privilege {
            Privilege::Sudo => {
                let mut cmd = Command::new(SUDO);
                cmd.arg("-n").arg(program).args(args);
                cmd
            }
            Privilege::User | Privilege::Root => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
        }
    }
}

/// sudo prints this when the ticket is missing or expired
pub(crate) fn is_sudo_rejection(stderr: &str) -> bool {
    stderr.contains("a password is required")
        || stderr.contains("is not in the sudoers file")
        || stderr.contains("may not run sudo")
}
