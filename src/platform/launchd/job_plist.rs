use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{BackupJobConfig, ManagerConfig, Schedule};
use crate::core::DaemonError;

const ARG_SOURCE: &str = "--backup-source";
const ARG_DESTINATION: &str = "--archive-destination";
const ARG_NAME_CONTAINS: &str = "--name-contains";
const ARG_BACKUPS_TO_LEAVE: &str = "--backups-to-leave";
const ARG_WARN_DAYS: &str = "--warn-days";

/// launchd job description, limited to the keys BackupMinder writes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct LaunchdJob {
    pub label: String,

    pub program_arguments: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_at_load: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_interval: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_calendar_interval: Option<CalendarInterval>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CalendarInterval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekday: Option<u32>,
    pub hour: u32,
    pub minute: u32,
}

impl LaunchdJob {
    /// Build the job description for a backup job
    pub fn from_config(manager: &ManagerConfig, job: &BackupJobConfig) -> Self {
        let program_arguments = vec![
            manager.backup_program.to_string_lossy().into_owned(),
            ARG_SOURCE.to_string(),
            job.source_path.to_string_lossy().into_owned(),
            ARG_DESTINATION.to_string(),
            job.destination_path.to_string_lossy().into_owned(),
            ARG_NAME_CONTAINS.to_string(),
            job.name_filter.clone(),
            ARG_BACKUPS_TO_LEAVE.to_string(),
            job.retention_count.to_string(),
            ARG_WARN_DAYS.to_string(),
            job.warning_days.to_string(),
        ];

        let (start_interval, start_calendar_interval) = match job.schedule {
            Schedule::Interval { seconds } => (Some(seconds), None),
            Schedule::Daily { hour, minute } => (
                None,
                Some(CalendarInterval { weekday: None, hour, minute }),
            ),
            Schedule::Weekly { day, hour, minute } => (
                None,
                Some(CalendarInterval { weekday: Some(day), hour, minute }),
            ),
        };

        Self {
            label: manager.label_for(&job.name),
            program_arguments,
            working_directory: Some(job.source_path.to_string_lossy().into_owned()),
            run_at_load: Some(false),
            start_interval,
            start_calendar_interval,
        }
    }

    /// Recover the backup job; `enabled` is left false since it lives in launchd
    pub fn to_config(&self, manager: &ManagerConfig) -> Result<BackupJobConfig, String> {
        let name = manager
            .name_for_label(&self.label)
            .ok_or_else(|| format!("label '{}' is not a BackupMinder label", self.label))?;

        let mut source = None;
        let mut destination = None;
        let mut name_filter = None;
        let mut retention = None;
        let mut warn_days = None;

        let mut args = self.program_arguments.iter().skip(1);
        while let Some(flag) = args.next() {
            let value = args
                .next()
                .ok_or_else(|| format!("argument '{}' has no value", flag))?;
            match flag.as_str() {
                ARG_SOURCE => source = Some(PathBuf::from(value)),
                ARG_DESTINATION => destination = Some(PathBuf::from(value)),
                ARG_NAME_CONTAINS => name_filter = Some(value.clone()),
                ARG_BACKUPS_TO_LEAVE => retention = Some(parse_count(flag, value)?),
                ARG_WARN_DAYS => warn_days = Some(parse_count(flag, value)?),
                other => return Err(format!("unknown argument '{}'", other)),
            }
        }

        let schedule = match (self.start_interval, &self.start_calendar_interval) {
            (Some(seconds), None) => Schedule::Interval { seconds },
            (None, Some(CalendarInterval { weekday: None, hour, minute })) => {
                Schedule::Daily { hour: *hour, minute: *minute }
            }
            (None, Some(CalendarInterval { weekday: Some(day), hour, minute })) => {
                Schedule::Weekly { day: *day, hour: *hour, minute: *minute }
            }
            (None, None) => return Err("no StartInterval or StartCalendarInterval".to_string()),
            (Some(_), Some(_)) => {
                return Err("both StartInterval and StartCalendarInterval are set".to_string());
            }
        };

        Ok(BackupJobConfig {
            name: name.to_string(),
            source_path: source.ok_or_else(|| missing(ARG_SOURCE))?,
            destination_path: destination.ok_or_else(|| missing(ARG_DESTINATION))?,
            name_filter: name_filter.unwrap_or_default(),
            retention_count: retention.ok_or_else(|| missing(ARG_BACKUPS_TO_LEAVE))?,
            warning_days: warn_days.ok_or_else(|| missing(ARG_WARN_DAYS))?,
            enabled: false,
            schedule,
        })
    }

    /// Encode as an XML property list
    pub fn to_xml(&self) -> Result<Vec<u8>, DaemonError> {
        let mut buffer = Vec::new();
        plist::to_writer_xml(&mut buffer, self).map_err(|e| {
            DaemonError::Validation(format!("Failed to serialize job '{}': {}", self.label, e))
        })?;
        Ok(buffer)
    }

    /// Decode a property list (XML or binary)
    pub fn from_bytes(path: &Path, bytes: &[u8]) -> Result<Self, DaemonError> {
        plist::from_bytes(bytes).map_err(|e| DaemonError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

fn parse_count(flag: &str, value: &str) -> Result<u32, String> {
    value
        .parse()
        .map_err(|_| format!("argument '{}' expects a non-negative integer, got '{}'", flag, value))
}

fn missing(flag: &str) -> String {
    format!("missing argument '{}'", flag)
}

/// Read and decode a BackupMinder job description
pub async fn read_job_file(
    manager: &ManagerConfig,
    name: &str,
) -> Result<(LaunchdJob, BackupJobConfig), DaemonError> {
    let path = manager.plist_path(name);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DaemonError::MissingFile {
                name: name.to_string(),
                path,
            });
        }
        Err(e) => return Err(DaemonError::io(format!("Failed to read {}", path.display()), e)),
    };

    let job = LaunchdJob::from_bytes(&path, &bytes)?;
    let config = job.to_config(manager).map_err(|reason| DaemonError::Malformed {
        path: path.clone(),
        reason,
    })?;

    if config.name != name {
        return Err(DaemonError::Malformed {
            path,
            reason: format!("label '{}' does not match job '{}'", job.label, name),
        });
    }

    Ok((job, config))
}
