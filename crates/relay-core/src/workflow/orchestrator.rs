use crate::config::postfix::{self, MainCfError};
use crate::config::relay::RelayConfig;
use crate::config::settings::Settings;
use crate::fs::backup::{self, BackupError};
use crate::mail::sasl::{self, SaslError};
use crate::process::runner::{run_logged, CommandError, CommandRunner, CommandSpec};
use crate::service::manager::{self, ServiceError, ServiceManager};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Backup(#[from] BackupError),
    #[error(transparent)]
    MainCf(#[from] MainCfError),
    #[error(transparent)]
    Credentials(#[from] SaslError),
    #[error("{message}")]
    Command {
        message: String,
        #[source]
        source: CommandError,
    },
    #[error(transparent)]
    UnsupportedService(ServiceError),
    #[error("{message}")]
    Service {
        message: String,
        #[source]
        source: ServiceError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct StepState {
    pub name: String,
    pub label: String,
    pub status: StepStatus,
    pub message: String,
}

/// Drives one relay reconfiguration: backup, rewrite main.cf, write the SASL
/// map, hash and lock it down, restart Postfix.
///
/// Steps run strictly in order. The first failure stops the run and nothing
/// already changed is rolled back; the main.cf backup is the recovery path.
pub struct RelayOrchestrator<'a, R: CommandRunner + ?Sized> {
    settings: Settings,
    relay: RelayConfig,
    runner: &'a R,
    steps: Vec<StepState>,
    warnings: Vec<String>,
}

impl<'a, R: CommandRunner + ?Sized> RelayOrchestrator<'a, R> {
    pub fn new(settings: Settings, relay: RelayConfig, runner: &'a R) -> Self {
        let step_names = vec![
            (
                "backup",
                format!(
                    "Backing up {} to {}",
                    settings.main_cf.display(),
                    settings.main_cf_backup().display()
                ),
            ),
            ("configure_main_cf", "Cleaning and configuring main.cf".to_string()),
            ("write_credentials", "Creating the SASL password file".to_string()),
            ("secure_credentials", "Securing the SASL password file".to_string()),
            ("restart_service", format!("Restarting {} service", settings.service)),
        ];

        let steps = step_names
            .into_iter()
            .map(|(name, label)| StepState {
                name: name.to_string(),
                label,
                status: StepStatus::Pending,
                message: String::new(),
            })
            .collect();

        Self {
            settings,
            relay,
            runner,
            steps,
            warnings: Vec::new(),
        }
    }

    /// Return a reference to the current step states.
    pub fn get_steps(&self) -> &[StepState] {
        &self.steps
    }

    /// Non-fatal findings collected while running.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Run all steps sequentially, invoking `on_progress` after each status
    /// change.
    ///
    /// A service outside the restart whitelist is rejected before any step
    /// runs, so nothing on disk is touched.
    pub fn run_all<F>(&mut self, mut on_progress: F) -> Result<(), RelayError>
    where
        F: FnMut(&StepState),
    {
        manager::check_whitelist(&self.settings.service)
            .map_err(RelayError::UnsupportedService)?;

        for i in 0..self.steps.len() {
            self.steps[i].status = StepStatus::InProgress;
            on_progress(&self.steps[i]);

            let result = match self.steps[i].name.as_str() {
                "backup" => self.step_backup(),
                "configure_main_cf" => self.step_configure_main_cf(),
                "write_credentials" => self.step_write_credentials(),
                "secure_credentials" => self.step_secure_credentials(),
                "restart_service" => self.step_restart_service(),
                other => unreachable!("unknown relay step {}", other),
            };

            match result {
                Ok(msg) => {
                    self.steps[i].status = StepStatus::Completed;
                    self.steps[i].message = msg;
                }
                Err(e) => {
                    debug!(step = %self.steps[i].name, error = %e, "Relay step failed");
                    self.steps[i].status = StepStatus::Failed(e.to_string());
                    self.steps[i].message = e.to_string();
                    on_progress(&self.steps[i]);
                    return Err(e);
                }
            }

            on_progress(&self.steps[i]);
        }

        info!(relay_host = %self.relay.relay_host, "Relay configuration complete");
        Ok(())
    }

    // =====================================================================
    // Individual step implementations
    // =====================================================================

    fn step_backup(&mut self) -> Result<String, RelayError> {
        backup::backup_file(&self.settings.main_cf, &self.settings.backup_suffix)?;
        Ok("Backup complete.".to_string())
    }

    fn step_configure_main_cf(&mut self) -> Result<String, RelayError> {
        let written = postfix::apply_relay(
            &self.settings.main_cf,
            &self.relay.relay_host,
            &self.settings.sasl_password,
        )?;
        self.warnings.extend(postfix::check_rewritten(&written));
        Ok("main.cf configured.".to_string())
    }

    fn step_write_credentials(&mut self) -> Result<String, RelayError> {
        sasl::write_password_map(&self.settings.sasl_password, &self.relay)?;
        Ok("sasl_password created.".to_string())
    }

    fn step_secure_credentials(&mut self) -> Result<String, RelayError> {
        let map = self.settings.sasl_password.display().to_string();
        let files: Vec<String> = self
            .settings
            .credential_files()
            .iter()
            .map(|p| p.display().to_string())
            .collect();

        let commands = [
            (CommandSpec::new("postmap").arg(map), "Failed to run postmap"),
            (
                CommandSpec::new("chown")
                    .arg(self.settings.owner.as_str())
                    .args(files.iter().cloned()),
                "Failed to change file ownership",
            ),
            (
                CommandSpec::new("chmod")
                    .arg(self.settings.mode.as_str())
                    .args(files.iter().cloned()),
                "Failed to set file permissions",
            ),
        ];

        for (cmd, message) in &commands {
            run_logged(self.runner, cmd, message).map_err(|source| RelayError::Command {
                message: message.to_string(),
                source,
            })?;
        }

        Ok("sasl_password created and secured.".to_string())
    }

    fn step_restart_service(&mut self) -> Result<String, RelayError> {
        let message = format!(
            "Failed to restart Postfix. Check logs with 'sudo tail -f {}'",
            self.settings.mail_log.display()
        );
        ServiceManager::new(self.runner, self.settings.use_sudo)
            .restart(&self.settings.service, &message)
            .map_err(|source| match source {
                ServiceError::NotWhitelisted(_) => RelayError::UnsupportedService(source),
                ServiceError::CommandFailed(_) => RelayError::Service { message, source },
            })?;
        Ok(format!("{} restarted successfully.", self.settings.service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::runner::testing::RecordingRunner;
    use std::error::Error as _;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const ORIGINAL: &str = concat!(
        "# See /usr/share/postfix/main.cf.dist for a commented, more complete version\n",
        "smtpd_banner = $myhostname ESMTP $mail_name (Ubuntu)\n",
        "biff = no\n",
        "relayhost = \n",
        "inet_interfaces = all\n",
        "inet_protocols = all\n",
    );

    fn test_settings(dir: &Path) -> Settings {
        let main_cf = dir.join("main.cf");
        fs::write(&main_cf, ORIGINAL).unwrap();
        Settings {
            main_cf,
            sasl_password: dir.join("sasl_password"),
            ..Settings::default()
        }
    }

    fn test_relay() -> RelayConfig {
        RelayConfig::new("[smtp.example.com]:587", "bob", "secret")
    }

    fn statuses<R: CommandRunner + ?Sized>(orch: &RelayOrchestrator<'_, R>) -> Vec<StepStatus> {
        orch.get_steps().iter().map(|s| s.status.clone()).collect()
    }

    #[test]
    fn test_orchestrator_initialization() {
        let runner = RecordingRunner::new();
        let orch = RelayOrchestrator::new(Settings::default(), test_relay(), &runner);
        let names: Vec<&str> = orch.get_steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "backup",
                "configure_main_cf",
                "write_credentials",
                "secure_credentials",
                "restart_service",
            ]
        );
        assert!(orch
            .get_steps()
            .iter()
            .all(|s| s.status == StepStatus::Pending));
        assert_eq!(
            orch.get_steps()[0].label,
            "Backing up /etc/postfix/main.cf to /etc/postfix/main.cf.bak"
        );
    }

    #[test]
    fn test_full_run() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(dir.path());
        let sasl = settings.sasl_password.clone();
        let main_cf = settings.main_cf.clone();
        let runner = RecordingRunner::new();

        let mut orch = RelayOrchestrator::new(settings, test_relay(), &runner);
        orch.run_all(|_| {}).unwrap();

        assert!(statuses(&orch).iter().all(|s| *s == StepStatus::Completed));
        assert!(orch.warnings().is_empty());

        assert_eq!(
            fs::read_to_string(dir.path().join("main.cf.bak")).unwrap(),
            ORIGINAL
        );

        let cf = fs::read_to_string(&main_cf).unwrap();
        let expected_tail = format!(
            "biff = no\n\n# SMTP RELAY CONFIGURATION\n\
             # This section was added to route all outbound mail through a relay host\n\
             relayhost = [smtp.example.com]:587\n\
             smtp_sasl_auth_enable = yes\n\
             smtp_sasl_password_maps = hash:{}\n\
             smtp_sasl_security_options = noanonymous\n\
             smtp_sasl_tls_security_options = noanonymous\n",
            sasl.display()
        );
        assert!(cf.ends_with(&expected_tail), "unexpected main.cf:\n{}", cf);
        assert!(!cf.contains("inet_interfaces = all"));

        assert_eq!(
            fs::read_to_string(&sasl).unwrap(),
            "[smtp.example.com]:587 bob:secret\n"
        );

        let s = sasl.display();
        assert_eq!(
            runner.command_lines(),
            vec![
                format!("postmap {}", s),
                format!("chown root:root {} {}.db", s, s),
                format!("chmod 600 {} {}.db", s, s),
                "sudo systemctl restart postfix".to_string(),
            ]
        );
    }

    #[test]
    fn test_postmap_failure_stops_run() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(dir.path());
        let runner = RecordingRunner::failing_on("postmap");

        let mut orch = RelayOrchestrator::new(settings, test_relay(), &runner);
        let err = orch.run_all(|_| {}).unwrap_err();

        assert_eq!(err.to_string(), "Failed to run postmap");
        assert!(err.source().is_some());
        assert_eq!(runner.calls.borrow().len(), 1);
        assert_eq!(runner.calls.borrow()[0].program, "postmap");

        let st = statuses(&orch);
        assert_eq!(st[2], StepStatus::Completed);
        assert!(matches!(st[3], StepStatus::Failed(_)));
        assert_eq!(st[4], StepStatus::Pending);
    }

    #[test]
    fn test_chmod_failure_reports_message() {
        let dir = TempDir::new().unwrap();
        let runner = RecordingRunner::failing_on("chmod");
        let mut orch =
            RelayOrchestrator::new(test_settings(dir.path()), test_relay(), &runner);
        let err = orch.run_all(|_| {}).unwrap_err();
        assert_eq!(err.to_string(), "Failed to set file permissions");
        assert_eq!(runner.calls.borrow().len(), 3);
    }

    #[test]
    fn test_restart_failure_leaves_changes_in_place() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(dir.path());
        let main_cf = settings.main_cf.clone();
        let sasl = settings.sasl_password.clone();
        let runner = RecordingRunner::failing_on("systemctl");

        let mut orch = RelayOrchestrator::new(settings, test_relay(), &runner);
        let err = orch.run_all(|_| {}).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to restart Postfix. Check logs with 'sudo tail -f /var/log/mail.log'"
        );
        assert!(fs::read_to_string(&main_cf)
            .unwrap()
            .contains("relayhost = [smtp.example.com]:587\n"));
        assert_eq!(
            fs::read_to_string(&sasl).unwrap(),
            "[smtp.example.com]:587 bob:secret\n"
        );
        assert!(matches!(statuses(&orch)[4], StepStatus::Failed(_)));
    }

    #[test]
    fn test_missing_main_cf_fails_before_any_change() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            main_cf: dir.path().join("main.cf"),
            sasl_password: dir.path().join("sasl_password"),
            ..Settings::default()
        };
        let runner = RecordingRunner::new();

        let mut orch = RelayOrchestrator::new(settings, test_relay(), &runner);
        let err = orch.run_all(|_| {}).unwrap_err();

        assert!(matches!(err, RelayError::Backup(_)));
        assert!(!dir.path().join("sasl_password").exists());
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn test_duplicate_relayhost_warning() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(dir.path());
        fs::write(&settings.main_cf, "relayhost = [old.example.com]:25\n").unwrap();
        let runner = RecordingRunner::new();

        let mut orch = RelayOrchestrator::new(settings, test_relay(), &runner);
        orch.run_all(|_| {}).unwrap();

        assert_eq!(orch.warnings().len(), 1);
        assert!(orch.warnings()[0].contains("relayhost"));
    }

    #[test]
    fn test_unknown_service_rejected_before_any_change() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            service: "postfix@-".to_string(),
            ..test_settings(dir.path())
        };
        let main_cf = settings.main_cf.clone();
        let runner = RecordingRunner::new();

        let mut orch = RelayOrchestrator::new(settings, test_relay(), &runner);
        let mut seen = 0;
        let err = orch.run_all(|_| seen += 1).unwrap_err();

        assert!(matches!(
            err,
            RelayError::UnsupportedService(ServiceError::NotWhitelisted(_))
        ));
        assert_eq!(err.to_string(), "Service not in whitelist: postfix@-");
        assert!(!err.to_string().contains("tail -f"));
        assert_eq!(seen, 0);
        assert!(runner.calls.borrow().is_empty());
        assert_eq!(fs::read_to_string(&main_cf).unwrap(), ORIGINAL);
        assert!(!dir.path().join("main.cf.bak").exists());
        assert!(!dir.path().join("sasl_password").exists());
        assert!(statuses(&orch).iter().all(|s| *s == StepStatus::Pending));
    }

    #[test]
    fn test_unparseable_multibyte_line_warns_and_completes() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(dir.path());
        let content = format!("biff = no\n{}\n", "€".repeat(40));
        fs::write(&settings.main_cf, &content).unwrap();
        let sasl = settings.sasl_password.clone();
        let runner = RecordingRunner::new();

        let mut orch = RelayOrchestrator::new(settings, test_relay(), &runner);
        orch.run_all(|_| {}).unwrap();

        assert_eq!(orch.warnings().len(), 1);
        assert!(orch.warnings()[0].contains("Could not parse"));
        assert!(statuses(&orch).iter().all(|s| *s == StepStatus::Completed));
        assert_eq!(
            fs::read_to_string(&sasl).unwrap(),
            "[smtp.example.com]:587 bob:secret\n"
        );
        assert_eq!(runner.calls.borrow().len(), 4);
    }

    #[test]
    fn test_progress_callback_sequence() {
        let dir = TempDir::new().unwrap();
        let runner = RecordingRunner::failing_on("chown");
        let mut orch =
            RelayOrchestrator::new(test_settings(dir.path()), test_relay(), &runner);

        let mut seen = Vec::new();
        let _ = orch.run_all(|s| seen.push((s.name.clone(), s.status.clone())));

        let in_progress = seen
            .iter()
            .filter(|(_, st)| *st == StepStatus::InProgress)
            .count();
        assert_eq!(in_progress, 4);
        assert_eq!(seen.last().unwrap().0, "secure_credentials");
        assert!(matches!(seen.last().unwrap().1, StepStatus::Failed(_)));
    }
}
