//! Key/value persistence for console state between sessions.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConsoleError;
use crate::history::CommandHistory;

pub const HISTORY_KEY: &str = "terminal_history";
pub const OUTPUT_KEY: &str = "terminal_output";
pub const SOUND_KEY: &str = "sound_enabled";
pub const STATE_FILE: &str = "state.json";

/// String key/value store with the semantics of browser local storage.
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>, ConsoleError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), ConsoleError>;
    fn clear(&mut self) -> Result<(), ConsoleError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: BTreeMap<String, String>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ConsoleError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConsoleError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ConsoleError> {
        self.values.clear();
        Ok(())
    }
}

/// Stores all keys as one JSON object in `<dir>/state.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(STATE_FILE),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, ConsoleError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(ConsoleError::Storage(
                    format!("{}: {err}", self.path.display()).into(),
                ))
            }
        };
        serde_json::from_str(&text).map_err(|err| {
            ConsoleError::Storage(format!("{}: {err}", self.path.display()).into())
        })
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), ConsoleError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(values).map_err(|err| {
            ConsoleError::Storage(format!("{}: {err}", self.path.display()).into())
        })?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ConsoleError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConsoleError> {
        // An unreadable file is replaced rather than blocking every later write.
        let mut values = self.read_all().unwrap_or_default();
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)
    }

    fn clear(&mut self) -> Result<(), ConsoleError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Values restored at session start; missing or unreadable keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoredState {
    pub history: Option<CommandHistory>,
    pub output: Option<String>,
    pub sound_enabled: Option<bool>,
}

/// Best-effort typed access to the console keys. Failures are logged and dropped.
pub struct PersistedState {
    storage: Box<dyn Storage>,
}

impl PersistedState {
    #[must_use]
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self { storage }
    }

    #[must_use]
    pub fn restore(&self) -> RestoredState {
        let history = self
            .read(HISTORY_KEY)
            .and_then(|text| match serde_json::from_str::<Vec<String>>(&text) {
                Ok(entries) => Some(CommandHistory::from_entries(entries)),
                Err(err) => {
                    debug!("ignoring persisted history: {err}");
                    None
                }
            });
        let output = self.read(OUTPUT_KEY);
        let sound_enabled = self
            .read(SOUND_KEY)
            .and_then(|text| match serde_json::from_str::<bool>(&text) {
                Ok(value) => Some(value),
                Err(err) => {
                    debug!("ignoring persisted sound flag: {err}");
                    None
                }
            });
        RestoredState {
            history,
            output,
            sound_enabled,
        }
    }

    pub fn save_history(&mut self, history: &CommandHistory) {
        match serde_json::to_string(history.entries()) {
            Ok(text) => self.write(HISTORY_KEY, &text),
            Err(err) => debug!("history not persisted: {err}"),
        }
    }

    pub fn save_output(&mut self, buffer: &str) {
        self.write(OUTPUT_KEY, buffer);
    }

    pub fn save_sound(&mut self, enabled: bool) {
        self.write(SOUND_KEY, if enabled { "true" } else { "false" });
    }

    pub fn clear(&mut self) {
        if let Err(err) = self.storage.clear() {
            debug!("state not cleared: {err}");
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(err) => {
                debug!("storage read failed for {key}: {err}");
                None
            }
        }
    }

    fn write(&mut self, key: &str, value: &str) {
        if let Err(err) = self.storage.set(key, value) {
            debug!("storage write failed for {key}: {err}");
        }
    }
}

impl std::fmt::Debug for PersistedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedState").finish_non_exhaustive()
    }
}
