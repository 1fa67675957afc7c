use crate::process::runner::{run_logged, CommandError, CommandRunner, CommandSpec};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service not in whitelist: {0}")]
    NotWhitelisted(String),
    #[error("systemctl command failed: {0}")]
    CommandFailed(#[from] CommandError),
}

/// Mail services this tool is allowed to restart.
const MAIL_SERVICES: &[&str] = &["postfix"];

/// Return the list of services a [`ServiceManager`] may control
pub fn list_mail_services() -> &'static [&'static str] {
    MAIL_SERVICES
}

/// Verify that a service name is in the whitelist
pub fn check_whitelist(service: &str) -> Result<(), ServiceError> {
    if !list_mail_services().contains(&service) {
        return Err(ServiceError::NotWhitelisted(service.to_string()));
    }
    Ok(())
}

/// Restarts mail services through systemctl.
///
/// Never escalates privileges by itself beyond the optional `sudo` prefix;
/// the caller decides whether that prefix is wanted.
pub struct ServiceManager<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    use_sudo: bool,
}

impl<'a, R: CommandRunner + ?Sized> ServiceManager<'a, R> {
    pub fn new(runner: &'a R, use_sudo: bool) -> Self {
        Self { runner, use_sudo }
    }

    /// Restart a service, logging `error_message` if systemctl fails.
    pub fn restart(&self, service: &str, error_message: &str) -> Result<(), ServiceError> {
        check_whitelist(service)?;
        let cmd = self.systemctl("restart", service);
        run_logged(self.runner, &cmd, error_message)?;
        info!("Restarted service: {}", service);
        Ok(())
    }

    fn systemctl(&self, action: &str, service: &str) -> CommandSpec {
        if self.use_sudo {
            CommandSpec::new("sudo").args(["systemctl", action, service])
        } else {
            CommandSpec::new("systemctl").args([action, service])
        }
    }
}
