//! Advisory checks on operator input.
//!
//! Nothing here rejects a value: the relay host, username and password are
//! written exactly as typed. The checks only produce warnings for values that
//! are likely mistakes, so the operator can abort and rerun.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::config::relay::RelayConfig;

/// `host`, `[host]`, `host:port` or `[host]:port`, where host is a DNS name
/// or IPv4 literal. Brackets suppress MX lookups in Postfix.
static RELAY_HOST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\[[a-zA-Z0-9]([a-zA-Z0-9.-]{0,253}[a-zA-Z0-9])?\]|[a-zA-Z0-9]([a-zA-Z0-9.-]{0,253}[a-zA-Z0-9])?)(:[0-9]{1,5})?$",
    )
    .expect("relay host pattern is valid")
});

/// Return a warning for each field that looks wrong. Never fails.
pub fn advisories(relay: &RelayConfig) -> Vec<String> {
    let mut found = Vec::new();

    if relay.relay_host.is_empty() {
        found.push("relay host is empty; Postfix will deliver directly".to_string());
    } else if !RELAY_HOST_RE.is_match(&relay.relay_host) {
        found.push(format!(
            "relay host {:?} does not look like host, [host] or [host]:port",
            relay.relay_host
        ));
    } else if let Some(port) = relay.relay_host.rsplit_once(':').map(|(_, p)| p) {
        if port.parse::<u16>().map_or(true, |p| p == 0) {
            found.push(format!("relay host port {} is out of range", port));
        }
    }

    if relay.username.is_empty() {
        found.push("username is empty".to_string());
    }
    if relay.password.is_empty() {
        found.push("password is empty".to_string());
    }
    if relay.username.chars().any(char::is_whitespace) {
        found.push("username contains whitespace".to_string());
    }

    found
}

/// Log every advisory as a warning and return how many there were.
pub fn warn_advisories(relay: &RelayConfig) -> usize {
    let found = advisories(relay);
    for msg in &found {
        warn!("{}", msg);
    }
    found.len()
}
