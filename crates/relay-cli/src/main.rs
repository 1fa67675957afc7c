mod cli;

use anyhow::{Context, Result};
use relay_core::config::postfix::{inspect_relay, RelayInspection};
use relay_core::config::settings::Settings;
use relay_core::console::prompt::{Prefilled, Prompter};
use relay_core::process::runner::SystemCommandRunner;
use relay_core::security::input;
use relay_core::system::privilege;
use relay_core::workflow::orchestrator::{RelayOrchestrator, StepStatus};
use std::io;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    // RUST_LOG controls log levels, defaulting to info. Logs go to stderr so
    // prompts and step output on stdout stay readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::try_parse_checked(std::env::args_os()).unwrap_or_else(|e| e.exit());
    let settings = cli.settings();

    let result = match cli.resolved_command() {
        Commands::Configure(args) => configure(settings, args.prefilled()),
        Commands::Show => show(&settings),
    };

    if let Err(e) = result {
        error!("postfix-relay failed: {:#}", e);
        std::process::exit(1);
    }
}

fn configure(settings: Settings, known: Prefilled) -> Result<()> {
    privilege::preflight();

    let stdin = io::stdin();
    let relay = Prompter::new(stdin.lock(), io::stdout())
        .collect(known)
        .context("Failed to read relay settings")?;
    input::warn_advisories(&relay);

    info!(
        main_cf = %settings.main_cf.display(),
        sasl_password = %settings.sasl_password.display(),
        "Configuring Postfix relay"
    );

    let runner = SystemCommandRunner;
    let mut orchestrator = RelayOrchestrator::new(settings, relay, &runner);
    let mut number = 0;
    orchestrator.run_all(|step| match step.status {
        StepStatus::InProgress => {
            number += 1;
            println!("\n{}. {}...", number, step.label);
        }
        StepStatus::Completed => println!("   {}", step.message),
        _ => {}
    })?;

    for warning in orchestrator.warnings() {
        println!("   Warning: {}", warning);
    }
    println!(
        "\n\nPostfix has been reconfigured to use the SMTP relay. You can now try sending a test email."
    );
    Ok(())
}

fn show(settings: &Settings) -> Result<()> {
    let content = std::fs::read_to_string(&settings.main_cf)
        .with_context(|| format!("Failed to read {}", settings.main_cf.display()))?;
    let found = inspect_relay(&content)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Failed to parse {}", settings.main_cf.display()))?;

    print!("{}", render_relay(&found));
    Ok(())
}

/// Text printed by `show`, one line per finding.
fn render_relay(found: &RelayInspection) -> String {
    let mut out = String::new();
    match found.effective_relayhost() {
        Some(host) if !host.is_empty() => out.push_str(&format!("relayhost = {}\n", host)),
        _ => out.push_str("relayhost is not set\n"),
    }
    if found.has_duplicate_relayhost() {
        out.push_str(&format!(
            "warning: relayhost is defined {} times: {:?}\n",
            found.relayhost.len(),
            found.relayhost
        ));
    }
    for (key, value) in &found.sasl {
        out.push_str(&format!("{} = {}\n", key, value));
    }
    out
}
