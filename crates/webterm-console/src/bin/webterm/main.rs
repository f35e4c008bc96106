//! `webterm` console binary.

mod cli;

use std::fs::{self, OpenOptions};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use webterm_console::config::validate_server_url;
use webterm_console::ui::run_console;
use webterm_console::{
    CommandRegistry, ConsoleConfig, ConsoleError, Credentials, CsrfToken, FileStorage,
    InterceptedTransport, MemoryStorage, PersistedState, Session, SocketIoTransport, Storage,
};

use crate::cli::{Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;

    if cli.command == Some(Command::ResetState) {
        let mut state = PersistedState::new(Box::new(FileStorage::new(&config.terminal.state_dir)));
        state.clear();
        println!(
            "Cleared console state in {}",
            config.terminal.state_dir.display()
        );
        return Ok(());
    }

    init_logging(&config)?;

    let storage: Box<dyn Storage> = if cli.ephemeral {
        Box::new(MemoryStorage::new())
    } else {
        Box::new(FileStorage::new(&config.terminal.state_dir))
    };
    let transport = SocketIoTransport::connect(&config.server)
        .with_context(|| format!("cannot reach {}", config.server.url))?;
    let transport = InterceptedTransport::with_csrf(transport, CsrfToken::new());
    let credentials = match (cli.uid, cli.key) {
        (Some(uid), Some(key)) => Some(Credentials { uid, key }),
        _ => None,
    };

    let mut session = Session::start(
        &config,
        storage,
        transport,
        CommandRegistry::with_builtins(),
        credentials,
    );
    info!(url = %config.server.url, "console started");
    run_console(&mut session, cli.no_input)
}

fn load_config(cli: &Cli) -> Result<ConsoleConfig, ConsoleError> {
    let mut config = ConsoleConfig::load_or_default(cli.config.as_deref())?;
    if let Some(url) = cli.url.as_deref() {
        validate_server_url(url)?;
        config.server.url = url.trim().into();
    }
    if let Some(dir) = cli.state_dir.as_ref() {
        config.terminal.state_dir.clone_from(dir);
    }
    if let Some(level) = cli.log_level.as_deref() {
        if level.trim().is_empty() {
            return Err(ConsoleError::InvalidConfig(
                "--log-level must not be empty".into(),
            ));
        }
        config.log.level = level.trim().into();
    }
    Ok(config)
}

/// Logs go to a file; the terminal belongs to the UI.
fn init_logging(config: &ConsoleConfig) -> anyhow::Result<()> {
    let path = &config.log.file;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create log directory '{}'", parent.display())
            })?;
        }
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file '{}'", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log.level.as_str())),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .init();
    Ok(())
}
