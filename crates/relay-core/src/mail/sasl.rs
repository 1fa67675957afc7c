use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::config::relay::RelayConfig;

#[derive(Debug, Error)]
pub enum SaslError {
    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Overwrite the SASL password map source with the single relay entry.
///
/// The file is created with the process umask and holds the password in
/// clear text until ownership and mode are tightened afterwards.
pub fn write_password_map(path: &Path, relay: &RelayConfig) -> Result<(), SaslError> {
    let write = || -> io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(relay.sasl_map_entry().as_bytes())?;
        file.sync_all()
    };
    write().map_err(|source| SaslError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), relay_host = %relay.relay_host, "SASL password map written");
    Ok(())
}
