use std::fmt;

/// Operator-supplied relay credentials for one run.
///
/// Never persisted as a structure; only flattened into main.cf and the SASL
/// password map.
#[derive(Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub relay_host: String,
    pub username: String,
    pub password: String,
}

impl RelayConfig {
    pub fn new(
        relay_host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            relay_host: relay_host.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// The single `sasl_password` map entry: `<relay_host> <username>:<password>`.
    pub fn sasl_map_entry(&self) -> String {
        format!("{} {}:{}\n", self.relay_host, self.username, self.password)
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("relay_host", &self.relay_host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
