use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Terminal console for a real-time command server.
#[derive(Parser, Debug)]
#[command(name = "webterm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Console config file (defaults to ./console.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Server url (http, https, ws or wss)
    #[arg(long)]
    pub url: Option<String>,

    /// Directory holding persisted history, output and sound preference
    #[arg(long = "state-dir")]
    pub state_dir: Option<PathBuf>,

    /// Access UID sent with `login` after every connect
    #[arg(long, requires = "key")]
    pub uid: Option<String>,

    /// Access key sent with `login` after every connect
    #[arg(long, requires = "uid")]
    pub key: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    /// Read-only console: no typing, `q` or Esc quits
    #[arg(long = "no-input")]
    pub no_input: bool,

    /// Keep state in memory only
    #[arg(long)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Clear persisted state and exit
    ResetState,
}
