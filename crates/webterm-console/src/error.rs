//! Console error type.

use smol_str::SmolStr;
use thiserror::Error;

/// Errors surfaced by configuration, persistence and the server connection.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Configuration file or CLI override rejected.
    #[error("invalid config: {0}")]
    InvalidConfig(SmolStr),
    /// Persisted state could not be read or written.
    #[error("storage error: {0}")]
    Storage(SmolStr),
    /// Websocket connection failed or was lost.
    #[error("transport error: {0}")]
    Transport(SmolStr),
    /// A frame did not follow the Engine.IO/Socket.IO framing.
    #[error("protocol error: {0}")]
    Protocol(SmolStr),
    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::Protocol(format!("json: {err}").into())
    }
}

impl From<tungstenite::Error> for ConsoleError {
    fn from(err: tungstenite::Error) -> Self {
        ConsoleError::Transport(err.to_string().into())
    }
}
