use super::parser::parse_config;
use crate::fs::atomic::{self, AtomicWriteError};
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lines left behind by earlier hand-edits of main.cf that conflict with the
/// relay block. Matched against the full line with only its terminator removed.
pub const CONFLICTING_LINES: [&str; 8] = [
    "inet_protocols = all",
    "myhostname = mail.whispr.dev",
    "myorigin = /etc/mailname",
    "mydestination = whispr.dev,localhost",
    "relayhost = ",
    "mailbox_size_limit = 0",
    "recipient_delimiter = +",
    "inet_interfaces = all",
];

const RELAY_HEADER: &str = "# SMTP RELAY CONFIGURATION";
const RELAY_HEADER_NOTE: &str =
    "# This section was added to route all outbound mail through a relay host";

#[derive(Debug, Error)]
pub enum MainCfError {
    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: AtomicWriteError,
    },
}

/// What the relay-related parameters of a main.cf currently look like.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelayInspection {
    /// Every `relayhost` definition, in file order. Postfix uses the last one.
    pub relayhost: Vec<String>,
    /// Every `smtp_sasl_*` parameter, in file order.
    pub sasl: Vec<(String, String)>,
}

impl RelayInspection {
    /// The value Postfix will actually use.
    pub fn effective_relayhost(&self) -> Option<&str> {
        self.relayhost.last().map(String::as_str)
    }

    pub fn has_duplicate_relayhost(&self) -> bool {
        self.relayhost.len() > 1
    }
}

/// Whether a raw line (terminator included) is one of the known conflicting lines.
pub fn is_conflicting_line(line: &str) -> bool {
    let content = line.strip_suffix('\n').unwrap_or(line);
    let content = content.strip_suffix('\r').unwrap_or(content);
    CONFLICTING_LINES.contains(&content)
}

/// The block appended to main.cf, one entry per line without terminators.
pub fn relay_block(relay_host: &str, sasl_password_path: &Path) -> Vec<String> {
    vec![
        String::new(),
        RELAY_HEADER.to_string(),
        RELAY_HEADER_NOTE.to_string(),
        format!("relayhost = {}", relay_host),
        "smtp_sasl_auth_enable = yes".to_string(),
        format!(
            "smtp_sasl_password_maps = hash:{}",
            sasl_password_path.display()
        ),
        "smtp_sasl_security_options = noanonymous".to_string(),
        "smtp_sasl_tls_security_options = noanonymous".to_string(),
    ]
}

/// Produce the new main.cf content.
///
/// Every line that is not an exact conflicting line is kept verbatim,
/// including its original terminator. The relay block is appended after.
/// When the original does not end in a newline, the block's leading blank
/// line terminates that last line instead of adding an empty one.
pub fn rewrite_main_cf(original: &str, relay_host: &str, sasl_password_path: &Path) -> String {
    let mut output = String::with_capacity(original.len() + 512);
    let mut removed = 0usize;

    for line in original.split_inclusive('\n') {
        if is_conflicting_line(line) {
            removed += 1;
            debug!(line = %line.trim_end(), "Dropping conflicting main.cf line");
            continue;
        }
        output.push_str(line);
    }

    for line in relay_block(relay_host, sasl_password_path) {
        output.push_str(&line);
        output.push('\n');
    }

    debug!(removed, "Rewrote main.cf content");
    output
}

/// Read `main_cf`, rewrite it for the relay, and write it back in place.
///
/// The file's permission bits are carried over to the new content. Returns
/// the content that was written.
pub fn apply_relay(
    main_cf: &Path,
    relay_host: &str,
    sasl_password_path: &Path,
) -> Result<String, MainCfError> {
    let original = fs::read_to_string(main_cf).map_err(|source| MainCfError::Read {
        path: main_cf.to_path_buf(),
        source,
    })?;
    let mode = fs::metadata(main_cf)
        .map(|m| m.permissions().mode() & 0o7777)
        .map_err(|source| MainCfError::Read {
            path: main_cf.to_path_buf(),
            source,
        })?;

    let updated = rewrite_main_cf(&original, relay_host, sasl_password_path);

    atomic::atomic_write(main_cf, updated.as_bytes(), Some(mode)).map_err(|source| {
        MainCfError::Write {
            path: main_cf.to_path_buf(),
            source,
        }
    })?;

    info!(path = %main_cf.display(), relay_host = %relay_host, "main.cf configured");
    Ok(updated)
}

/// Parse main.cf content and collect the relay-related parameters.
pub fn inspect_relay(content: &str) -> Result<RelayInspection, String> {
    let cfg = parse_config(content)?;
    Ok(RelayInspection {
        relayhost: cfg
            .get_all("relayhost")
            .into_iter()
            .map(str::to_string)
            .collect(),
        sasl: cfg
            .with_prefix("smtp_sasl_")
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    })
}

/// Log warnings for rewritten content that will not behave as intended.
///
/// Exact-line matching leaves variants such as `relayhost = foo` or
/// `relayhost =  ` in place, which then sit alongside the appended block.
/// Returns the warnings so callers can surface them.
pub fn check_rewritten(content: &str) -> Vec<String> {
    let mut warnings = Vec::new();
    match inspect_relay(content) {
        Ok(found) => {
            if found.has_duplicate_relayhost() {
                let msg = format!(
                    "relayhost is defined {} times; Postfix will use the last one ({})",
                    found.relayhost.len(),
                    found.effective_relayhost().unwrap_or_default()
                );
                warn!("{}", msg);
                warnings.push(msg);
            }
        }
        Err(e) => {
            let msg = format!("Could not parse rewritten main.cf for checking: {}", e);
            warn!("{}", msg);
            warnings.push(msg);
        }
    }
    warnings
}
