use std::io::{self, BufRead, Write};
use thiserror::Error;

use crate::config::relay::RelayConfig;

pub const RELAY_HOST_PROMPT: &str = "Enter the SMTP relay host (e.g., [smtp.sendgrid.net]:587): ";
pub const USERNAME_PROMPT: &str = "Enter your SMTP relay username: ";
pub const PASSWORD_PROMPT: &str = "Enter your SMTP relay password: ";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Input ended before {0} was entered")]
    EndOfInput(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Values already known before prompting (flags or environment).
#[derive(Debug, Default, Clone)]
pub struct Prefilled {
    pub relay_host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Plain, echoing line prompts over any reader/writer pair.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `question`, then read one line. Only the line terminator is
    /// removed; surrounding spaces are part of the answer.
    pub fn ask(&mut self, question: &str, field: &'static str) -> Result<String, PromptError> {
        self.output.write_all(question.as_bytes())?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(PromptError::EndOfInput(field));
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(line)
    }

    fn ask_unless(
        &mut self,
        known: Option<String>,
        question: &str,
        field: &'static str,
    ) -> Result<String, PromptError> {
        match known {
            Some(v) => Ok(v),
            None => self.ask(question, field),
        }
    }

    /// Collect relay host, username and password, in that order, prompting
    /// only for the ones not already provided.
    pub fn collect(&mut self, known: Prefilled) -> Result<RelayConfig, PromptError> {
        let relay_host = self.ask_unless(known.relay_host, RELAY_HOST_PROMPT, "relay host")?;
        let username = self.ask_unless(known.username, USERNAME_PROMPT, "username")?;
        let password = self.ask_unless(known.password, PASSWORD_PROMPT, "password")?;
        Ok(RelayConfig {
            relay_host,
            username,
            password,
        })
    }
}
