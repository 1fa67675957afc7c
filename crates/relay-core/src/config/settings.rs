use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::fs::backup::backup_path;

pub const DEFAULT_MAIN_CF: &str = "/etc/postfix/main.cf";
pub const DEFAULT_SASL_PASSWORD: &str = "/etc/postfix/sasl_password";
pub const DEFAULT_SERVICE: &str = "postfix";
pub const DEFAULT_MAIL_LOG: &str = "/var/log/mail.log";

/// Paths and names the relay workflow operates on.
///
/// Everything the workflow touches on disk or passes to external commands
/// comes from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Postfix main.cf to rewrite.
    pub main_cf: PathBuf,
    /// Appended to the main.cf path to form the backup path.
    pub backup_suffix: String,
    /// SASL password map source file.
    pub sasl_password: PathBuf,
    /// Appended by `postmap` to the map source for `hash:` tables.
    pub db_suffix: String,
    /// `owner:group` applied to the map files.
    pub owner: String,
    /// Octal mode applied to the map files.
    pub mode: String,
    /// systemd unit restarted at the end of the run.
    pub service: String,
    /// Prefix the restart with `sudo`.
    pub use_sudo: bool,
    /// Where the operator should look when the restart fails.
    pub mail_log: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            main_cf: PathBuf::from(DEFAULT_MAIN_CF),
            backup_suffix: ".bak".to_string(),
            sasl_password: PathBuf::from(DEFAULT_SASL_PASSWORD),
            db_suffix: ".db".to_string(),
            owner: "root:root".to_string(),
            mode: "600".to_string(),
            service: DEFAULT_SERVICE.to_string(),
            use_sudo: true,
            mail_log: PathBuf::from(DEFAULT_MAIL_LOG),
        }
    }
}

impl Settings {
    pub fn main_cf_backup(&self) -> PathBuf {
        backup_path(&self.main_cf, &self.backup_suffix)
    }

    /// The database `postmap` builds next to the SASL password map.
    pub fn sasl_password_db(&self) -> PathBuf {
        with_suffix(&self.sasl_password, &self.db_suffix)
    }

    /// Both files holding the relay credentials.
    pub fn credential_files(&self) -> [PathBuf; 2] {
        [self.sasl_password.clone(), self.sasl_password_db()]
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
