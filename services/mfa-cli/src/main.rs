//! OAuth 2.0 MFA command-line client
//!
//! Single-binary demo of the Auth0-style MFA API:
//! 1. `token` runs the password grant and whatever MFA the tenant requires
//! 2. `associate` lists, enrolls and deletes authenticators
//! 3. `setup` stores the tenant domain and client ID
//! 4. `logout` forgets the stored access token

mod cli;
mod commands;
mod config;
mod terminal;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use mfa_auth::{HttpClient, RequestPrinter};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::config::{Config, LogFormat};
use crate::terminal::TerminalPrompter;

/// Exit status after an operator interrupt (128 + SIGINT).
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config =
        Config::load_or_default(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(config.logging.format, cli.verbose);

    tokio::spawn(exit_on_signal());

    let client = reqwest::Client::builder()
        .timeout(config.grant.timeout())
        .build()
        .context("failed to build HTTP client")?;
    let http = if cli.verbose {
        let printer: RequestPrinter = Arc::new(|message: &str| eprintln!("{message}"));
        HttpClient::with_printer(client, printer)
    } else {
        HttpClient::new(client)
    };

    let prompter = TerminalPrompter::stdio();
    match commands::run(command, &config, http, &prompter).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_reportable() => {
            error!(error = %e, "request failed");
            Ok(())
        }
        Err(e) => Err(e).context("command failed"),
    }
}

/// Logs go to stderr so stdout carries only what the operator asked for.
fn init_tracing(format: LogFormat, verbose: bool) {
    let default_directive = if verbose {
        "info,mfa_auth=debug,oauth2_mfa_cli=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .without_time()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

/// Quit immediately on SIGINT/SIGTERM, even mid-prompt or mid-poll.
async fn exit_on_signal() {
    shutdown_signal().await;
    eprintln!("Exit requested, quitting.");
    std::process::exit(INTERRUPTED_EXIT_CODE);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
