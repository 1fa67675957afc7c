use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Failed to back up {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// Sibling path used for the backup: the full file name with `suffix` appended.
///
/// `/etc/postfix/main.cf` with `.bak` becomes `/etc/postfix/main.cf.bak`.
pub fn backup_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Copy `path` byte-for-byte to its sibling backup, overwriting any previous one.
pub fn backup_file(path: &Path, suffix: &str) -> Result<PathBuf, BackupError> {
    let target = backup_path(path, suffix);
    let bytes = fs::copy(path, &target).map_err(|source| BackupError::Copy {
        from: path.to_path_buf(),
        to: target.clone(),
        source,
    })?;
    info!(from = %path.display(), to = %target.display(), bytes, "Backup complete");
    Ok(target)
}
