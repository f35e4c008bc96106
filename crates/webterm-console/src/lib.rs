//! Terminal console for a real-time command server.
//!
//! A [`Session`] owns the output renderer, the command dispatcher with its
//! history, the role/panel presenter, persisted state and the transport.
//! [`ui::run_console`] drives it from a ratatui full-screen view.

#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod history;
pub mod intercept;
pub mod presenter;
pub mod protocol;
pub mod renderer;
pub mod session;
pub mod storage;
pub mod testing;
pub mod transport;
pub mod ui;

pub use config::ConsoleConfig;
pub use dispatcher::{CommandDispatcher, CommandRegistry, Dispatch};
pub use error::ConsoleError;
pub use intercept::{CsrfToken, InterceptedTransport};
pub use renderer::OutputRenderer;
pub use session::{Credentials, Session};
pub use storage::{FileStorage, MemoryStorage, PersistedState, Storage};
pub use transport::{InboundEvent, SocketIoTransport, Transport};
