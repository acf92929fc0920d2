//! CLI argument definitions using clap derive macros

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{BackupJobConfig, Schedule};

/// BackupMinder - manage scheduled backup daemons
#[derive(Parser)]
#[command(name = "backupminder")]
#[command(version)]
#[command(about = "Create, edit, enable, disable and remove scheduled backup daemons", long_about = None)]
pub struct Cli {
    /// Manager configuration file
    #[arg(long, short = 'c', env = "BACKUPMINDER_CONFIG", default_value = "backupminder.json")]
    pub config: PathBuf,

    /// Obtain elevated privileges through sudo before acting
    #[arg(long, global = true)]
    pub sudo: bool,

    /// Override the configured log level
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new backup job
    Add(JobArgs),

    /// Replace the settings of an existing backup job
    Edit(JobArgs),

    /// Schedule a backup job
    Enable {
        name: String,
    },

    /// Stop scheduling a backup job
    Disable {
        name: String,
    },

    /// Unload a backup job and delete its job description
    #[command(visible_alias = "rm")]
    Remove {
        name: String,
    },

    /// List backup jobs
    #[command(visible_alias = "ls")]
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one backup job
    Show {
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Describe an OS status code
    StatusText {
        #[arg(allow_hyphen_values = true)]
        code: i32,
    },
}

/// Fields of the add/edit form
#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Unique job name
    #[arg(long, short = 'n')]
    pub name: String,

    /// Directory to back up
    #[arg(long, short = 's')]
    pub source: PathBuf,

    /// Directory archives are written to
    #[arg(long, short = 'd')]
    pub destination: PathBuf,

    /// Only consider files whose name contains this text
    #[arg(long, short = 'f', default_value = "")]
    pub filter: String,

    /// Number of archives to keep
    #[arg(long, short = 'r', default_value = "5")]
    pub retain: u32,

    /// Warn when the newest archive is older than this many days
    #[arg(long, short = 'w', default_value = "1")]
    pub warn_days: u32,

    /// Write the job without scheduling it
    #[arg(long)]
    pub disabled: bool,

    /// Run every SECONDS instead of at a time of day
    #[arg(long, value_name = "SECONDS", conflicts_with_all = ["at", "weekday"])]
    pub every: Option<u64>,

    /// Time of day to run, HH:MM (default 00:00)
    #[arg(long, value_name = "HH:MM", value_parser = parse_time_of_day)]
    pub at: Option<(u32, u32)>,

    /// Run weekly on this day (1=Monday .. 7=Sunday)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=7))]
    pub weekday: Option<u32>,
}

impl JobArgs {
    pub fn schedule(&self) -> Schedule {
        if let Some(seconds) = self.every {
            return Schedule::Interval { seconds };
        }
        let (hour, minute) = self.at.unwrap_or((0, 0));
        match self.weekday {
            Some(day) => Schedule::Weekly { day, hour, minute },
            None => Schedule::Daily { hour, minute },
        }
    }

    /// Build the job record, resolving relative paths against the working directory
    pub fn to_config(&self) -> std::io::Result<BackupJobConfig> {
        Ok(BackupJobConfig {
            name: self.name.clone(),
            source_path: std::path::absolute(&self.source)?,
            destination_path: std::path::absolute(&self.destination)?,
            name_filter: self.filter.clone(),
            retention_count: self.retain,
            warning_days: self.warn_days,
            enabled: !self.disabled,
            schedule: self.schedule(),
        })
    }
}

fn parse_time_of_day(value: &str) -> Result<(u32, u32), String> {
    let (hour, minute) = value
        .split_once(':')
        .ok_or_else(|| format!("expected HH:MM, got '{}'", value))?;
    let hour: u32 = hour.parse().map_err(|_| format!("invalid hour '{}'", hour))?;
    let minute: u32 = minute.parse().map_err(|_| format!("invalid minute '{}'", minute))?;
    if hour > 23 || minute > 59 {
        return Err(format!("time {} is out of range", value));
    }
    Ok((hour, minute))
}
