//! Local-first command dispatch.

#![allow(missing_docs)]

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::command::CommandLine;
use crate::error::ConsoleError;
use crate::history::{CommandHistory, HistoryCursor, HistoryDirection, InputLine};
use crate::renderer::OutputRenderer;

/// Handler for a command resolved entirely on the client.
pub type LocalHandler = Box<dyn Fn(&[String], &mut OutputRenderer)>;

/// Case-insensitive command names handled locally.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: IndexMap<SmolStr, LocalHandler>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `clear` and `echo`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.handlers.insert(
            "clear".into(),
            Box::new(|_args: &[String], out: &mut OutputRenderer| out.clear_screen()),
        );
        registry.handlers.insert(
            "echo".into(),
            Box::new(|args: &[String], out: &mut OutputRenderer| {
                out.append(&args.join(" "), true, true);
            }),
        );
        registry
    }

    pub fn register(&mut self, name: &str, handler: LocalHandler) -> Result<(), ConsoleError> {
        let key = SmolStr::from(name.trim().to_lowercase());
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(ConsoleError::InvalidConfig(
                format!("invalid local command name '{name}'").into(),
            ));
        }
        if self.handlers.contains_key(&key) {
            return Err(ConsoleError::InvalidConfig(
                format!("local command '{key}' registered twice").into(),
            ));
        }
        self.handlers.insert(key, handler);
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name.to_lowercase().as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(SmolStr::as_str)
    }

    fn get(&self, name: &str) -> Option<&LocalHandler> {
        self.handlers.get(name)
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

/// What [`CommandDispatcher::submit`] did with a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Blank input; only the prompt was redrawn.
    Empty,
    /// Handled by a registered local command.
    Local(SmolStr),
    /// Must be sent to the server; carries the trimmed line.
    Forward(String),
}

#[derive(Debug)]
pub struct CommandDispatcher {
    registry: CommandRegistry,
    history: CommandHistory,
    cursor: HistoryCursor,
    input: InputLine,
    history_dirty: bool,
}

impl CommandDispatcher {
    #[must_use]
    pub fn new(registry: CommandRegistry, history: CommandHistory) -> Self {
        Self {
            registry,
            history,
            cursor: HistoryCursor::default(),
            input: InputLine::default(),
            history_dirty: false,
        }
    }

    #[must_use]
    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    #[must_use]
    pub fn cursor(&self) -> HistoryCursor {
        self.cursor
    }

    #[must_use]
    pub fn input(&self) -> &InputLine {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputLine {
        &mut self.input
    }

    #[must_use]
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Returns `true` once after each history mutation.
    pub fn take_history_dirty(&mut self) -> bool {
        std::mem::take(&mut self.history_dirty)
    }

    /// Submits the current input field.
    pub fn submit_input(&mut self, out: &mut OutputRenderer) -> Dispatch {
        let raw = self.input.text().to_string();
        self.submit(&raw, out)
    }

    pub fn submit(&mut self, raw: &str, out: &mut OutputRenderer) -> Dispatch {
        let Some(line) = CommandLine::parse(raw) else {
            out.redraw_prompt();
            self.input.clear();
            return Dispatch::Empty;
        };

        if self.history.push(line.raw()) {
            self.history_dirty = true;
        }
        self.cursor.reset();
        out.echo_command(line.raw());

        if let Some(handler) = self.registry.get(line.name()) {
            handler(line.args(), out);
            self.input.clear();
            if !out.is_prompt_open() {
                out.redraw_prompt();
            }
            return Dispatch::Local(line.name().into());
        }

        self.input.clear();
        Dispatch::Forward(line.raw().to_string())
    }

    pub fn navigate_history(&mut self, direction: HistoryDirection) {
        self.cursor
            .navigate(direction, &self.history, &mut self.input);
    }
}
