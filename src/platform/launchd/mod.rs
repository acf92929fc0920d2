pub mod job_plist;
pub mod launchctl;
pub mod status;

pub use job_plist::{read_job_file, CalendarInterval, LaunchdJob};
pub use launchctl::LaunchctlScheduler;
pub use status::error_text_for_status;
