use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::authorization::Authorization;
use super::command;
use crate::core::DaemonError;

const INSTALL: &str = "/usr/bin/install";
const MV: &str = "/bin/mv";
const RM: &str = "/bin/rm";
const MKDIR: &str = "/bin/mkdir";
const TEE: &str = "/usr/bin/tee";

fn denied(path: &Path, action: &str) -> DaemonError {
    DaemonError::Authorization(format!(
        "Permission denied {} {}; elevated authorization is required",
        action,
        path.display()
    ))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Atomically replace `path` with `contents` (temp file, fsync, rename)
pub async fn write_atomic(path: &Path, contents: &[u8], auth: &Authorization) -> Result<(), DaemonError> {
    match write_atomic_direct(path, contents).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            if !auth.is_privileged() {
                return Err(denied(path, "writing"));
            }
            debug!("Direct write denied, installing {} with elevation", path.display());
            write_atomic_elevated(path, contents, auth).await
        }
        Err(e) => Err(DaemonError::io(format!("Failed to write {}", path.display()), e)),
    }
}

async fn write_atomic_direct(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = temp_path_for(path);

    // 1. Write to temporary file
    tokio::fs::write(&temp_path, contents).await?;

    // 2. fsync temporary file
    let temp_file = tokio::fs::OpenOptions::new()
        .write(true)
        .open(&temp_path)
        .await?;
    temp_file.sync_all().await?;
    drop(temp_file);

    // 3. Atomic rename
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    Ok(())
}

/// Stage in the user's temp dir, install next to the target as root, rename into place
async fn write_atomic_elevated(path: &Path, contents: &[u8], auth: &Authorization) -> Result<(), DaemonError> {
    let file_name = path.file_name().unwrap_or_default().to_string_lossy().into_owned();
    let staged = std::env::temp_dir().join(format!("{}.{}.staged", file_name, std::process::id()));

    tokio::fs::write(&staged, contents)
        .await
        .map_err(|e| DaemonError::io(format!("Failed to stage {}", staged.display()), e))?;

    let temp_path = temp_path_for(path);
    let result = async {
        if let Some(parent) = path.parent() {
            command::run(auth, OsStr::new(MKDIR), [OsStr::new("-p"), parent.as_os_str()], None).await?;
        }
        command::run(
            auth,
            OsStr::new(INSTALL),
            [
                OsStr::new("-m"),
                OsStr::new("0644"),
                OsStr::new("-o"),
                OsStr::new("root"),
                OsStr::new("-g"),
                OsStr::new("wheel"),
                staged.as_os_str(),
                temp_path.as_os_str(),
            ],
            None,
        )
        .await?;
        command::run(
            auth,
            OsStr::new(MV),
            [OsStr::new("-f"), temp_path.as_os_str(), path.as_os_str()],
            None,
        )
        .await
        .map(|_| ())
    }
    .await;

    if let Err(e) = tokio::fs::remove_file(&staged).await {
        warn!("Failed to remove staged file {}: {}", staged.display(), e);
    }

    result
}

/// Remove `path`; a missing file is reported as NotFound through `DaemonError::Io`
pub async fn remove_file(path: &Path, auth: &Authorization) -> Result<(), DaemonError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            if !auth.is_privileged() {
                return Err(denied(path, "removing"));
            }
            command::run(auth, OsStr::new(RM), [OsStr::new("-f"), path.as_os_str()], None)
                .await
                .map(|_| ())
        }
        Err(e) => Err(DaemonError::io(format!("Failed to remove {}", path.display()), e)),
    }
}

/// Append exactly one line (newline added) to `path`, creating it if needed
pub async fn append_line(path: &Path, line: &str, auth: &Authorization) -> Result<(), DaemonError> {
    let record = format!("{}\n", line.trim_end_matches('\n'));

    match append_direct(path, record.as_bytes()).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            if !auth.is_privileged() {
                return Err(denied(path, "appending to"));
            }
            command::run(
                auth,
                OsStr::new(TEE),
                [OsStr::new("-a"), path.as_os_str()],
                Some(record.as_bytes()),
            )
            .await
            .map(|_| ())
        }
        Err(e) => Err(DaemonError::io(format!("Failed to append to {}", path.display()), e)),
    }
}

async fn append_direct(path: &Path, record: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(record).await?;
    file.flush().await?;
    Ok(())
}
