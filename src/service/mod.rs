pub mod daemon;

pub use daemon::{DaemonUtility, JobListing};
