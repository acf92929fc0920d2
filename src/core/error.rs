use std::borrow::Cow;
use std::path::PathBuf;
use thiserror::Error;

use crate::platform::launchd::error_text_for_status;

/// Failure category surfaced alongside every failed outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    Io,
    Subprocess,
    Authorization,
    OsStatus,
}

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("{0}")]
    Validation(String),

    #[error("Job '{0}' is not loaded")]
    NotLoaded(String),

    #[error("Job '{0}' is already loaded")]
    AlreadyLoaded(String),

    #[error("Job '{0}' is still loaded; unload it before removing its job description")]
    StillLoaded(String),

    #[error("Job '{0}' already exists; use edit to change it")]
    AlreadyExists(String),

    #[error("Job description for '{name}' not found at {}", .path.display())]
    MissingFile { name: String, path: PathBuf },

    #[error("Job description {} is malformed: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} could not be started: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed with status {code} ({}){}", status_text(.code), stderr_suffix(.stderr))]
    Subprocess {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("{}", status_text(.0))]
    OsStatus(i32),
}

impl DaemonError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        DaemonError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DaemonError::Validation(_)
            | DaemonError::NotLoaded(_)
            | DaemonError::AlreadyLoaded(_)
            | DaemonError::StillLoaded(_)
            | DaemonError::AlreadyExists(_)
            | DaemonError::MissingFile { .. }
            | DaemonError::Malformed { .. } => ErrorKind::Validation,
            DaemonError::Io { .. } => ErrorKind::Io,
            DaemonError::Spawn { .. } | DaemonError::Subprocess { .. } => ErrorKind::Subprocess,
            DaemonError::Authorization(_) => ErrorKind::Authorization,
            DaemonError::OsStatus(_) => ErrorKind::OsStatus,
        }
    }
}

fn status_text(code: &i32) -> Cow<'static, str> {
    error_text_for_status(*code)
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}
