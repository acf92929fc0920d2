pub mod authorization;
pub mod command;
pub mod file_ops;
pub mod launchd;
pub mod normalize;
pub mod traits;

pub use authorization::{Authorization, Privilege};
pub use launchd::{error_text_for_status, LaunchctlScheduler};
pub use normalize::CanonicalPathNormalizer;
pub use traits::{JobScheduler, PathNormalizer};
