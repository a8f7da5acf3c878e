//! Command-line interface

use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use unsub::{LinkPolicy, RunMode, RunSettings};

#[derive(Parser, Debug)]
#[command(name = "unsub", version)]
#[command(about = "Walks a Gmail mailbox and unsubscribes from newsletters", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,

    /// Path to Google OAuth client credentials (installed or web app JSON)
    #[arg(long, global = true)]
    pub credentials: Option<PathBuf>,

    /// Automation log location (default: ~/.config/unsub/unsubscribe_log.json)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Progress output: log lines, or one JSON event per line on stdout
    #[arg(long, value_enum, default_value_t = EventFormat::Text)]
    pub events: EventFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Remove stored Gmail tokens
    Logout,

    /// Summarize the automation log
    Log {
        /// Also list every entry
        #[arg(long)]
        entries: bool,
    },
}

/// Flags that override settings.json for one run
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Stop after this many messages (a started page is always finished)
    #[arg(short = 'n', long, env = "EMAIL_CHECK_LIMIT")]
    pub max_messages: Option<usize>,

    /// Run the browser without a window
    #[arg(long, env = "RUN_HEADLESS", value_parser = FalseyValueParser::new())]
    pub headless: bool,

    /// unsubscribe, or invoices to only report invoice links
    #[arg(long)]
    pub mode: Option<RunMode>,

    /// Message ids requested per listing call (1-500)
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Messages processed at the same time
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Where the unsubscribe keyword may appear: href (anywhere) or path
    #[arg(long)]
    pub link_policy: Option<LinkPolicy>,

    /// Refuse to start while another run holds the automation log
    #[arg(long)]
    pub exclusive: bool,

    /// Give up after this many consecutive listing failures
    #[arg(long)]
    pub max_list_retries: Option<u32>,

    /// Chrome or Chromium binary to drive
    #[arg(long, env = "CHROME_BIN")]
    pub browser: Option<PathBuf>,

    /// Start the browser without its sandbox (containers, CI)
    #[arg(long, env = "NO_SANDBOX", value_parser = FalseyValueParser::new())]
    pub no_sandbox: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventFormat {
    Text,
    Json,
}

impl Cli {
    /// The command-line layer of the run settings; unset flags leave lower layers alone
    pub fn settings(&self) -> RunSettings {
        RunSettings {
            max_messages: self.run.max_messages,
            page_size: self.run.page_size,
            headless: self.run.headless.then_some(true),
            mode: self.run.mode,
            concurrency: self.run.concurrency,
            link_policy: self.run.link_policy,
            log_path: self.log_file.clone(),
            exclusive_log: self.run.exclusive.then_some(true),
            max_list_retries: self.run.max_list_retries,
            ..Default::default()
        }
    }
}
