pub mod event_log;
pub mod logger;

pub use event_log::{EventLog, JobEvent};
pub use logger::{init_logging, shutdown_logging, Rotation};
