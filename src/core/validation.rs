use anyhow::{bail, Result};
use std::path::Path;
use tracing::debug;

use crate::config::BackupJobConfig;
use crate::platform::{CanonicalPathNormalizer, PathNormalizer};

#[derive(Debug)]
pub struct ValidationResult {
    /// The job with normalized paths, ready to be written
    pub config: BackupJobConfig,
    pub warnings: Vec<String>,
}

/// Validate a job before any file or process operation touches it
pub async fn validate_backup_job(job: &BackupJobConfig) -> Result<ValidationResult> {
    let mut warnings = Vec::new();

    let normalizer = CanonicalPathNormalizer;
    let mut config = job.clone();
    config.source_path = normalizer.normalize(&job.source_path);
    config.destination_path = normalizer.normalize(&job.destination_path);

    let source = config.source_path.as_path();
    let target = config.destination_path.as_path();

    debug!("Validating backup job '{}': {:?} -> {:?}", job.name, source, target);

    // 1. Name, absolute paths and schedule
    config.check_fields()?;

    // 2. Source exists and is readable
    if !source.exists() {
        bail!("Source path does not exist: {}", source.display());
    }

    if !source.is_dir() {
        bail!("Source path is not a directory: {}", source.display());
    }

    match tokio::fs::read_dir(source).await {
        Ok(_) => debug!("Source is readable"),
        Err(e) => bail!("Cannot read source directory: {}", e),
    }

    // 3. Source and destination relationship
    if source == target {
        bail!("Source and destination directories cannot be the same");
    }

    if target.starts_with(source) {
        bail!("Destination directory cannot be inside source directory");
    }

    // 4. Destination exists or can be created
    if target.exists() {
        if !target.is_dir() {
            bail!("Destination path exists but is not a directory: {}", target.display());
        }

        let test_file = target.join(".backupminder_write_test");
        match tokio::fs::write(&test_file, b"test").await {
            Ok(_) => {
                let _ = tokio::fs::remove_file(&test_file).await;
                debug!("Destination is writable");
            }
            Err(e) => warnings.push(format!(
                "Destination is not writable by the current user ({}); the backup daemon must run with sufficient privileges",
                e
            )),
        }
    } else {
        match nearest_existing_ancestor(target) {
            Some(ancestor) if ancestor.is_dir() => warnings.push(format!(
                "Destination {} does not exist yet and will be created by the backup daemon",
                target.display()
            )),
            Some(ancestor) => bail!(
                "Destination cannot be created because {} is not a directory",
                ancestor.display()
            ),
            None => bail!("Destination cannot be created: {}", target.display()),
        }
    }

    // 5. Retention and staleness settings
    if config.retention_count == 0 {
        warnings.push("Retention count is 0; every archive will be purged".to_string());
    }

    if config.warning_days == 0 {
        warnings.push("Warning days is 0; staleness warnings are disabled".to_string());
    }

    Ok(ValidationResult { config, warnings })
}

fn nearest_existing_ancestor(path: &Path) -> Option<&Path> {
    path.ancestors().skip(1).find(|p| p.exists())
}
