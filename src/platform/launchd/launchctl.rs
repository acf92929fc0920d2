use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::DaemonError;
use crate::platform::authorization::Authorization;
use crate::platform::command;
use crate::platform::traits::JobScheduler;

/// launchd backend driven through the `launchctl` command line tool
#[derive(Debug, Clone)]
pub struct LaunchctlScheduler {
    launchctl: PathBuf,
}

impl LaunchctlScheduler {
    pub fn new(launchctl: impl Into<PathBuf>) -> Self {
        Self {
            launchctl: launchctl.into(),
        }
    }

    fn load_args(plist: &Path) -> Vec<OsString> {
        vec!["load".into(), plist.as_os_str().to_os_string()]
    }

    fn unload_args(label: &str, plist: Option<&Path>) -> Vec<OsString> {
        match plist {
            Some(path) => vec!["unload".into(), path.as_os_str().to_os_string()],
            None => vec!["remove".into(), label.into()],
        }
    }

    fn list_args(label: &str) -> Vec<OsString> {
        vec!["list".into(), label.into()]
    }

    fn program(&self) -> &OsStr {
        self.launchctl.as_os_str()
    }
}

/// Status code from messages like `Load failed: 5: Input/output error`
fn parse_failure_code(stderr: &str) -> Option<i32> {
    stderr.lines().find_map(|line| {
        let (_, rest) = line.split_once("failed: ")?;
        rest.split(':').next()?.trim().parse().ok()
    })
}

impl JobScheduler for LaunchctlScheduler {
    async fn load(&self, label: &str, plist: &Path, auth: &Authorization) -> Result<(), DaemonError> {
        info!("Loading {} from {}", label, plist.display());

        let output = command::run(auth, self.program(), Self::load_args(plist), None).await?;

        // Older launchctl versions report load failures on stderr with exit status 0
        if !self.is_loaded(label, auth).await? {
            let code = parse_failure_code(&output.stderr).unwrap_or(5);
            return Err(DaemonError::Subprocess {
                program: self.launchctl.display().to_string(),
                code,
                stderr: if output.stderr.trim().is_empty() {
                    format!("{} was not registered after load", label)
                } else {
                    output.stderr
                },
            });
        }

        Ok(())
    }

    async fn unload(&self, label: &str, plist: Option<&Path>, auth: &Authorization) -> Result<(), DaemonError> {
        info!("Unloading {}", label);
        command::run(auth, self.program(), Self::unload_args(label, plist), None).await?;
        Ok(())
    }

    async fn is_loaded(&self, label: &str, auth: &Authorization) -> Result<bool, DaemonError> {
        match command::run(auth, self.program(), Self::list_args(label), None).await {
            Ok(_) => Ok(true),
            Err(DaemonError::Subprocess { code, .. }) => {
                debug!("{} not listed by launchctl (status {})", label, code);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
