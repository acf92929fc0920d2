use std::path::{Path, PathBuf};

use super::authorization::Authorization;
use crate::core::DaemonError;

/// Path normalization for platform-specific requirements
pub trait PathNormalizer {
    /// Normalize path for the platform (resolve symlinks, `..`, relative parts)
    fn normalize(&self, path: &Path) -> PathBuf;
}

/// The OS scheduler that loads and unloads job descriptions
pub trait JobScheduler {
    /// Register the job description at `plist` under `label`
    fn load(
        &self,
        label: &str,
        plist: &Path,
        auth: &Authorization,
    ) -> impl Future<Output = Result<(), DaemonError>> + Send;

    /// Deregister `label`; `plist` is the description file if it still exists
    fn unload(
        &self,
        label: &str,
        plist: Option<&Path>,
        auth: &Authorization,
    ) -> impl Future<Output = Result<(), DaemonError>> + Send;

    /// Whether `label` is currently registered
    fn is_loaded(
        &self,
        label: &str,
        auth: &Authorization,
    ) -> impl Future<Output = Result<bool, DaemonError>> + Send;
}
