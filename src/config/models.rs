use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::core::DaemonError;

pub const DEFAULT_LABEL_PREFIX: &str = "com.backupminder";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_BACKUP_PROGRAM: &str = "/usr/local/bin/backupminder-run";
const DEFAULT_LAUNCHCTL: &str = "/bin/launchctl";

const SYSTEM_DAEMON_DIR: &str = "/Library/LaunchDaemons";
const SYSTEM_EVENT_LOG: &str = "/Library/Logs/BackupMinder.log";
const USER_AGENT_DIR: &str = "Library/LaunchAgents";
const USER_EVENT_LOG: &str = "Library/Logs/BackupMinder.log";

#[inline]
fn default_label_prefix() -> String {
    DEFAULT_LABEL_PREFIX.to_string()
}

#[inline]
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

#[inline]
fn default_backup_program() -> PathBuf {
    PathBuf::from(DEFAULT_BACKUP_PROGRAM)
}

#[inline]
fn default_launchctl_path() -> PathBuf {
    PathBuf::from(DEFAULT_LAUNCHCTL)
}

/// launchd domain the managed jobs live in
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// System-wide daemons, requires elevated authorization
    #[default]
    System,
    /// Per-user agents of the invoking user
    User,
}

/// Manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    #[serde(default)]
    pub domain: Domain,

    /// Directory holding job descriptions (defaults per domain)
    #[serde(default)]
    pub daemon_directory: Option<PathBuf>,

    /// Reverse-DNS prefix of every job label
    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,

    /// Program launchd runs for each backup job
    #[serde(default = "default_backup_program")]
    pub backup_program: PathBuf,

    #[serde(default = "default_launchctl_path")]
    pub launchctl_path: PathBuf,

    /// Human-readable enable/disable event log (defaults per domain)
    #[serde(default)]
    pub event_log_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional log file directory (if None, only console logging)
    #[serde(default)]
    pub log_directory: Option<PathBuf>,

    /// Log file rotation strategy
    #[serde(default)]
    pub log_rotation: LogRotation,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            domain: Domain::default(),
            daemon_directory: None,
            label_prefix: default_label_prefix(),
            backup_program: default_backup_program(),
            launchctl_path: default_launchctl_path(),
            event_log_path: None,
            log_level: default_log_level(),
            log_directory: None,
            log_rotation: LogRotation::default(),
        }
    }
}

impl ManagerConfig {
    /// Resolved directory for job descriptions
    pub fn daemon_directory(&self) -> PathBuf {
        if let Some(dir) = &self.daemon_directory {
            return dir.clone();
        }
        match self.domain {
            Domain::System => PathBuf::from(SYSTEM_DAEMON_DIR),
            Domain::User => home_dir().join(USER_AGENT_DIR),
        }
    }

    /// Resolved path of the event log
    pub fn event_log_path(&self) -> PathBuf {
        if let Some(path) = &self.event_log_path {
            return path.clone();
        }
        match self.domain {
            Domain::System => PathBuf::from(SYSTEM_EVENT_LOG),
            Domain::User => home_dir().join(USER_EVENT_LOG),
        }
    }

    /// launchd label for a job name
    pub fn label_for(&self, name: &str) -> String {
        format!("{}.{}", self.label_prefix, name)
    }

    /// Job name for a launchd label, if the label belongs to us
    pub fn name_for_label<'a>(&self, label: &'a str) -> Option<&'a str> {
        label
            .strip_prefix(self.label_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|name| !name.is_empty())
    }

    /// Job description path for a job name
    pub fn plist_path(&self, name: &str) -> PathBuf {
        self.daemon_directory()
            .join(format!("{}.plist", self.label_for(name)))
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/var/root"))
}

/// Log file rotation strategy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate daily
    #[default]
    Daily,
    /// Rotate hourly
    Hourly,
    /// Never rotate (single file)
    Never,
}

/// Validated backup job record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupJobConfig {
    /// Unique job name, part of the launchd label
    pub name: String,

    /// Directory to back up
    pub source_path: PathBuf,

    /// Directory archives are written to
    pub destination_path: PathBuf,

    /// Only files whose name contains this pattern are considered
    #[serde(default)]
    pub name_filter: String,

    /// Number of archives to keep
    pub retention_count: u32,

    /// Age in days after which the newest archive is considered stale
    pub warning_days: u32,

    /// Whether the job is currently scheduled
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub schedule: Schedule,
}

impl BackupJobConfig {
    /// Field checks that need no file system access
    pub fn check_fields(&self) -> Result<(), DaemonError> {
        check_job_name(&self.name)?;

        if !self.source_path.is_absolute() {
            return Err(DaemonError::Validation(format!(
                "Source path must be absolute: {}",
                self.source_path.display()
            )));
        }
        if !self.destination_path.is_absolute() {
            return Err(DaemonError::Validation(format!(
                "Destination path must be absolute: {}",
                self.destination_path.display()
            )));
        }

        self.schedule.check()
    }
}

/// Job names end up in file names and launchd labels
pub fn check_job_name(name: &str) -> Result<(), DaemonError> {
    if name.is_empty() {
        return Err(DaemonError::Validation("Job name cannot be empty".to_string()));
    }
    if name.starts_with('.') {
        return Err(DaemonError::Validation(format!(
            "Job name cannot start with '.': {}",
            name
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|&c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(DaemonError::Validation(format!(
            "Job name '{}' contains invalid character '{}'",
            name, bad
        )));
    }
    Ok(())
}

/// When launchd starts the backup program
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Schedule {
    /// Run at specific interval
    Interval {
        /// Duration in seconds
        seconds: u64,
    },

    /// Daily at specific time
    Daily {
        /// Hour (0-23)
        hour: u32,
        /// Minute (0-59)
        minute: u32,
    },

    /// Weekly on specific day
    Weekly {
        /// Day of week (1=Monday, 7=Sunday)
        day: u32,
        /// Hour (0-23)
        hour: u32,
        /// Minute (0-59)
        minute: u32,
    },
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::Daily { hour: 0, minute: 0 }
    }
}

impl Schedule {
    pub fn check(&self) -> Result<(), DaemonError> {
        match *self {
            Schedule::Interval { seconds } => {
                if seconds == 0 {
                    return Err(DaemonError::Validation(
                        "Schedule interval must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
            Schedule::Daily { hour, minute } => check_time(hour, minute),
            Schedule::Weekly { day, hour, minute } => {
                if !(1..=7).contains(&day) {
                    return Err(DaemonError::Validation(format!(
                        "Schedule weekday must be 1-7, got {}",
                        day
                    )));
                }
                check_time(hour, minute)
            }
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const DAYS: [&str; 7] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];
        match *self {
            Schedule::Interval { seconds } => write!(f, "every {}s", seconds),
            Schedule::Daily { hour, minute } => write!(f, "daily at {:02}:{:02}", hour, minute),
            Schedule::Weekly { day, hour, minute } => {
                let name = DAYS.get(day.wrapping_sub(1) as usize).copied().unwrap_or("day ?");
                write!(f, "{} at {:02}:{:02}", name, hour, minute)
            }
        }
    }
}

fn check_time(hour: u32, minute: u32) -> Result<(), DaemonError> {
    if hour > 23 || minute > 59 {
        return Err(DaemonError::Validation(format!(
            "Schedule time {:02}:{:02} is out of range",
            hour, minute
        )));
    }
    Ok(())
}
