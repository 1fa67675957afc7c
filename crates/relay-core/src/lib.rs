//! Core of `postfix-relay`: rewrite Postfix for an authenticated SMTP relay.
//!
//! The run is a fixed sequence driven by
//! [`workflow::orchestrator::RelayOrchestrator`]: back up main.cf, strip known
//! conflicting lines and append the relay block, write the SASL password map,
//! hash it and restrict it, then restart Postfix. External programs go through
//! [`process::runner::CommandRunner`] so the sequence can be exercised without
//! touching a real system.

pub mod config;
pub mod console;
pub mod fs;
pub mod mail;
pub mod process;
pub mod security;
pub mod service;
pub mod system;
pub mod workflow;
