use clap::builder::PossibleValuesParser;
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use relay_core::config::settings::{
    Settings, DEFAULT_MAIL_LOG, DEFAULT_MAIN_CF, DEFAULT_SASL_PASSWORD, DEFAULT_SERVICE,
};
use relay_core::console::prompt::Prefilled;
use relay_core::service::manager::list_mail_services;
use std::ffi::OsString;
use std::path::PathBuf;

/// Ids of the top-level relay value flags.
const RELAY_VALUE_IDS: [&str; 3] = ["relay_host", "username", "password"];

/// Route Postfix outbound mail through an authenticated SMTP relay
#[derive(Parser, Debug)]
#[command(name = "postfix-relay")]
#[command(version)]
pub struct Cli {
    /// Postfix main.cf to rewrite
    #[arg(long, global = true, env = "POSTFIX_MAIN_CF", default_value = DEFAULT_MAIN_CF)]
    pub main_cf: PathBuf,

    /// SASL password map written for the relay
    #[arg(long, global = true, env = "POSTFIX_SASL_PASSWORD", default_value = DEFAULT_SASL_PASSWORD)]
    pub sasl_password: PathBuf,

    /// systemd unit restarted after the change
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_SERVICE,
        value_parser = PossibleValuesParser::new(list_mail_services().iter().copied())
    )]
    pub service: String,

    /// Mail log shown in the hint when the restart fails
    #[arg(long, global = true, default_value = DEFAULT_MAIL_LOG)]
    pub mail_log: PathBuf,

    /// Run systemctl directly instead of through sudo
    #[arg(long, global = true)]
    pub no_sudo: bool,

    /// Relay values for the default `configure` command
    #[command(flatten)]
    pub configure: ConfigureArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Configure the relay (default). Prompts for any value not given.
    Configure(ConfigureArgs),
    /// Print the relay settings currently in main.cf
    Show,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigureArgs {
    /// Relay host, e.g. [smtp.sendgrid.net]:587
    #[arg(long, env = "RELAY_HOST")]
    pub relay_host: Option<String>,

    /// Relay SASL username
    #[arg(long, env = "RELAY_USERNAME")]
    pub username: Option<String>,

    /// Relay SASL password
    #[arg(long, env = "RELAY_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl ConfigureArgs {
    pub fn prefilled(&self) -> Prefilled {
        Prefilled {
            relay_host: self.relay_host.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl Cli {
    /// Parse `args`, rejecting relay values given before a subcommand.
    ///
    /// Path flags are global and may appear on either side of a subcommand.
    /// `--relay-host`, `--username` and `--password` at the top level only
    /// apply to a bare invocation; with a subcommand they must follow it.
    /// Values taken from the environment are not affected.
    pub fn try_parse_checked<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut cmd = Self::command();
        let matches = cmd.try_get_matches_from_mut(args)?;
        let cli = Self::from_arg_matches(&matches)?;

        if let Some(name) = matches.subcommand_name() {
            for id in RELAY_VALUE_IDS {
                if matches.value_source(id) == Some(ValueSource::CommandLine) {
                    return Err(cmd.error(
                        ErrorKind::ArgumentConflict,
                        format!(
                            "--{} must come after the `{}` subcommand",
                            id.replace('_', "-"),
                            name
                        ),
                    ));
                }
            }
        }
        Ok(cli)
    }

    /// The command to run; bare invocation means `configure`.
    pub fn resolved_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Configure(self.configure.clone()))
    }

    pub fn settings(&self) -> Settings {
        Settings {
            main_cf: self.main_cf.clone(),
            sasl_password: self.sasl_password.clone(),
            service: self.service.clone(),
            use_sudo: !self.no_sudo,
            mail_log: self.mail_log.clone(),
            ..Settings::default()
        }
    }
}
