use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::DaemonError;
use crate::platform::{file_ops, Authorization};

/// State transitions recorded in the event log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    Enabled,
    Disabled,
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobEvent::Enabled => write!(f, "enabled"),
            JobEvent::Disabled => write!(f, "disabled"),
        }
    }
}

/// Append-only, human-readable log of job state transitions
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format_line(name: &str, event: JobEvent, at: DateTime<Local>) -> String {
        format!("[{}] Backup daemon '{}' {}", at.format("%Y-%m-%d %H:%M:%S"), name, event)
    }

    /// Append one timestamped line for `event`
    pub async fn record(&self, name: &str, event: JobEvent, auth: &Authorization) -> Result<(), DaemonError> {
        let line = Self::format_line(name, event, Local::now());
        file_ops::append_line(&self.path, &line, auth).await
    }
}
