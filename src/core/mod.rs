pub mod error;
pub mod outcome;
pub mod validation;

pub use error::{DaemonError, ErrorKind};
pub use outcome::{Outcome, Report};
pub use validation::{validate_backup_job, ValidationResult};
