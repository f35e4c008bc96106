//! Console configuration loading (`console.toml`).

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use smol_str::SmolStr;

use crate::error::ConsoleError;

pub const DEFAULT_CONFIG_FILE: &str = "console.toml";
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_PROMPT: &str = "$ ";
pub const DEFAULT_TYPING_DELAY_MS: u64 = 10;
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;
pub const DEFAULT_PING_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_STATE_DIR: &str = ".webterm";
pub const DEFAULT_LOG_FILE: &str = "webterm.log";

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub server: ServerConfig,
    pub terminal: TerminalConfig,
    pub panel: PanelConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub url: SmolStr,
    pub forward_event: ForwardEvent,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    /// `None` disables the latency probe.
    pub ping_interval: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct TerminalConfig {
    pub prompt: SmolStr,
    pub typing_delay: Duration,
    pub state_dir: PathBuf,
    pub sound: bool,
}

#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub roles: Vec<SmolStr>,
    pub split_role: SmolStr,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: SmolStr,
    pub file: PathBuf,
}

/// Event used to forward non-local command lines to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardEvent {
    /// `terminal_input { command }`
    TerminalInput,
    /// `sendmsg { message }`
    SendMsg,
}

impl ForwardEvent {
    fn parse(text: &str) -> Result<Self, ConsoleError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "terminal_input" => Ok(Self::TerminalInput),
            "sendmsg" => Ok(Self::SendMsg),
            _ => Err(ConsoleError::InvalidConfig(
                format!("invalid server.forward_event '{text}'").into(),
            )),
        }
    }

    #[must_use]
    pub fn event_name(self) -> &'static str {
        match self {
            Self::TerminalInput => "terminal_input",
            Self::SendMsg => "sendmsg",
        }
    }

    #[must_use]
    pub fn payload_key(self) -> &'static str {
        match self {
            Self::TerminalInput => "command",
            Self::SendMsg => "message",
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                url: DEFAULT_SERVER_URL.into(),
                forward_event: ForwardEvent::TerminalInput,
                reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
                reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
                ping_interval: Some(Duration::from_millis(DEFAULT_PING_INTERVAL_MS)),
            },
            terminal: TerminalConfig {
                prompt: DEFAULT_PROMPT.into(),
                typing_delay: Duration::from_millis(DEFAULT_TYPING_DELAY_MS),
                state_dir: PathBuf::from(DEFAULT_STATE_DIR),
                sound: true,
            },
            panel: PanelConfig {
                roles: vec!["operative".into(), "commander".into(), "syndicate".into()],
                split_role: "syndicate".into(),
            },
            log: LogConfig {
                level: "info".into(),
                file: PathBuf::from(DEFAULT_LOG_FILE),
            },
        }
    }
}

impl ConsoleConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConsoleError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            ConsoleError::InvalidConfig(format!("{}: {err}", path.display()).into())
        })?;
        parse_console_toml_from_text(&text, &path.display().to_string())
    }

    /// Loads `path` when given, else `./console.toml` when it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConsoleError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            return Self::load(fallback);
        }
        Ok(Self::default())
    }
}

pub fn validate_console_toml_text(text: &str) -> Result<(), ConsoleError> {
    parse_console_toml_from_text(text, DEFAULT_CONFIG_FILE).map(|_| ())
}

fn parse_console_toml_from_text(text: &str, file_name: &str) -> Result<ConsoleConfig, ConsoleError> {
    let raw: ConsoleToml = toml::from_str(text)
        .map_err(|err| ConsoleError::InvalidConfig(format!("{file_name}: {err}").into()))?;
    raw.into_config()
        .map_err(|err| prefix_invalid_config(file_name, err))
}

fn prefix_invalid_config(file_name: &str, err: ConsoleError) -> ConsoleError {
    match err {
        ConsoleError::InvalidConfig(message) => {
            ConsoleError::InvalidConfig(format!("{file_name}: {message}").into())
        }
        other => other,
    }
}

/// Checks the scheme of a server url; the transport maps it to a websocket url.
pub fn validate_server_url(url: &str) -> Result<(), ConsoleError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ConsoleError::InvalidConfig(
            "server.url must not be empty".into(),
        ));
    }
    let supported = ["http://", "https://", "ws://", "wss://"];
    if !supported.iter().any(|scheme| trimmed.starts_with(scheme)) {
        return Err(ConsoleError::InvalidConfig(
            format!("unsupported server.url '{trimmed}' (use http, https, ws or wss)").into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConsoleToml {
    server: Option<ServerSection>,
    terminal: Option<TerminalSection>,
    panel: Option<PanelSection>,
    log: Option<LogSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerSection {
    url: Option<String>,
    forward_event: Option<String>,
    reconnect_attempts: Option<u32>,
    reconnect_delay_ms: Option<u64>,
    ping_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TerminalSection {
    prompt: Option<String>,
    typing_delay_ms: Option<u64>,
    state_dir: Option<String>,
    sound: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PanelSection {
    roles: Option<Vec<String>>,
    split_role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogSection {
    level: Option<String>,
    file: Option<String>,
}

impl ConsoleToml {
    fn into_config(self) -> Result<ConsoleConfig, ConsoleError> {
        let mut config = ConsoleConfig::default();

        if let Some(server) = self.server {
            if let Some(url) = server.url {
                validate_server_url(&url)?;
                config.server.url = url.trim().into();
            }
            if let Some(event) = server.forward_event {
                config.server.forward_event = ForwardEvent::parse(&event)?;
            }
            if let Some(attempts) = server.reconnect_attempts {
                config.server.reconnect_attempts = attempts;
            }
            if let Some(delay) = server.reconnect_delay_ms {
                if delay == 0 {
                    return Err(ConsoleError::InvalidConfig(
                        "server.reconnect_delay_ms must be >= 1".into(),
                    ));
                }
                config.server.reconnect_delay = Duration::from_millis(delay);
            }
            if let Some(interval) = server.ping_interval_ms {
                config.server.ping_interval = (interval > 0).then(|| Duration::from_millis(interval));
            }
        }

        if let Some(terminal) = self.terminal {
            if let Some(prompt) = terminal.prompt {
                if prompt.trim().is_empty() {
                    return Err(ConsoleError::InvalidConfig(
                        "terminal.prompt must not be empty".into(),
                    ));
                }
                config.terminal.prompt = prompt.into();
            }
            if let Some(delay) = terminal.typing_delay_ms {
                if delay == 0 {
                    return Err(ConsoleError::InvalidConfig(
                        "terminal.typing_delay_ms must be >= 1".into(),
                    ));
                }
                config.terminal.typing_delay = Duration::from_millis(delay);
            }
            if let Some(dir) = terminal.state_dir {
                if dir.trim().is_empty() {
                    return Err(ConsoleError::InvalidConfig(
                        "terminal.state_dir must not be empty".into(),
                    ));
                }
                config.terminal.state_dir = PathBuf::from(dir);
            }
            if let Some(sound) = terminal.sound {
                config.terminal.sound = sound;
            }
        }

        if let Some(panel) = self.panel {
            if let Some(roles) = panel.roles {
                config.panel.roles = roles
                    .iter()
                    .map(|role| role.trim().to_ascii_lowercase())
                    .filter(|role| !role.is_empty())
                    .map(SmolStr::from)
                    .collect();
            }
            if let Some(split_role) = panel.split_role {
                config.panel.split_role = split_role.trim().to_ascii_lowercase().into();
            }
        }

        if let Some(log) = self.log {
            if let Some(level) = log.level {
                if level.trim().is_empty() {
                    return Err(ConsoleError::InvalidConfig(
                        "log.level must not be empty".into(),
                    ));
                }
                config.log.level = level.trim().into();
            }
            if let Some(file) = log.file {
                config.log.file = PathBuf::from(file);
            }
        }

        Ok(config)
    }
}
