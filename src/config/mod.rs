pub mod models;

pub use models::{
    check_job_name, BackupJobConfig, Domain, LogRotation, ManagerConfig, Schedule,
};
