//! unsub - walks a Gmail mailbox and unsubscribes from newsletters
//!
//! This is the entry point for the `unsub` binary.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, warn};
use std::process::ExitCode;
use std::sync::Arc;
use unsub::models::SETTINGS_FILE;
use unsub::{
    AutomationLog, ChromiumDriver, GmailAuth, GmailClient, GmailCredentials, GmailMailbox,
    JsonFileLog, JsonLinesSink, LogSink, LogSummary, Pipeline, ProgressSink, RunSettings,
};

mod cli;

use cli::{Cli, Command, EventFormat};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    let result = match &cli.command {
        Some(Command::Logout) => logout(),
        Some(Command::Log { entries }) => show_log(&cli, *entries),
        None => run(&cli).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// settings.json overlaid with command-line flags
fn layered_settings(cli: &Cli) -> RunSettings {
    let file = config::load_json_or_default::<RunSettings>(SETTINGS_FILE).unwrap_or_else(|e| {
        warn!("Ignoring unreadable {}: {:#}", SETTINGS_FILE, e);
        RunSettings::default()
    });
    file.merge(cli.settings())
}

async fn run(cli: &Cli) -> Result<()> {
    let sink: Arc<dyn ProgressSink> = match cli.events {
        EventFormat::Text => Arc::new(LogSink),
        EventFormat::Json => Arc::new(JsonLinesSink::new(std::io::stdout())),
    };

    let pipeline = Pipeline::from_settings(layered_settings(cli), sink.clone())?;

    let creds = GmailCredentials::load(cli.credentials.as_deref()).inspect_err(|e| {
        sink.line(&format!("Configuration error: {:#}", e));
        if let Some(path) = GmailCredentials::default_credentials_path() {
            warn!(
                "To configure Gmail access, either:\n\
                 1. Place your Google OAuth credentials at: {}\n\
                 2. Pass --credentials <file>\n\
                 3. Or set environment variables: GMAIL_CLIENT_ID and GMAIL_CLIENT_SECRET",
                path.display()
            );
        }
    })?;

    let auth = GmailAuth::new(creds.client_id, creds.client_secret)?;
    let mailbox = Arc::new(GmailMailbox::new(GmailClient::new(auth)));

    // Authenticate before the walk so the OAuth prompt is not raced by listing retries
    let probe = mailbox.clone();
    tokio::task::spawn_blocking(move || probe.client().authenticate())
        .await
        .context("Authentication task panicked")??;

    let mut driver = ChromiumDriver::new();
    if let Some(path) = &cli.run.browser {
        driver = driver.with_executable(path);
    }
    if cli.run.no_sandbox {
        driver = driver.without_sandbox();
    }
    let log = Arc::new(JsonFileLog::new(&pipeline.config().log_path));

    pipeline.run(mailbox, driver, log).await?;
    Ok(())
}

fn logout() -> Result<()> {
    let path = GmailAuth::default_token_path()?;
    if unsub::gmail::remove_token_file(&path)? {
        println!("Removed stored Gmail tokens ({})", path.display());
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

fn show_log(cli: &Cli, list_entries: bool) -> Result<()> {
    let config = layered_settings(cli).into_config()?;
    let log = JsonFileLog::new(&config.log_path);
    let entries = log.entries()?;

    println!("{}", config.log_path.display());
    println!("{}", LogSummary::from_entries(&entries));

    if list_entries {
        for entry in &entries {
            println!(
                "{}  {:<16}  {}  {}",
                entry.timestamp.format("%Y-%m-%d %H:%M"),
                entry.status.to_string(),
                entry.subject,
                entry.link
            );
        }
    }
    Ok(())
}
