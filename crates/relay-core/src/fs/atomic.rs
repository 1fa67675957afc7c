use std::fs::{self, File};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AtomicWriteError {
    #[error("Failed to persist temp file: {0}")]
    TempFile(#[from] tempfile::PersistError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Parent directory does not exist: {0}")]
    NoParentDir(PathBuf),
}

/// Atomically replace the content of a file.
///
/// Process: write to temp file in same directory -> fsync -> rename over target.
/// The file is either fully written or not changed at all.
pub fn atomic_write(
    path: &Path,
    content: &[u8],
    mode: Option<u32>,
) -> Result<(), AtomicWriteError> {
    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => return Err(AtomicWriteError::NoParentDir(path.to_path_buf())),
    };

    if !parent.exists() {
        return Err(AtomicWriteError::NoParentDir(parent.to_path_buf()));
    }

    // Same filesystem as the target so the rename is atomic
    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Some(m) = mode {
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(m))?;
    }

    debug!("Atomic write: persisting temp file to {:?}", path);
    temp.persist(path)?;

    // fsync the parent directory so the new directory entry is durable
    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }

    Ok(())
}
