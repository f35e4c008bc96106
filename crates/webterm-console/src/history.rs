//! Command history and the editable input line.

#![allow(missing_docs)]

/// Direction for history navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryDirection {
    Older,
    Newer,
}

/// Submitted lines, most recent first.
///
/// Entries are only ever prepended; a line equal to the current head is not
/// inserted again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandHistory {
    entries: Vec<String>,
}

impl CommandHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_entries(entries: Vec<String>) -> Self {
        Self { entries }
    }

    /// Returns `true` when the entry was inserted.
    pub fn push(&mut self, entry: &str) -> bool {
        if entry.is_empty() || self.head() == Some(entry) {
            return false;
        }
        self.entries.insert(0, entry.to_string());
        true
    }

    #[must_use]
    pub fn head(&self) -> Option<&str> {
        self.entries.first().map(String::as_str)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

/// Text being typed plus the caret position (in characters).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputLine {
    text: String,
    cursor: usize,
}

impl InputLine {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Replaces the text and places the caret at the end.
    pub fn set(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
        self.cursor = self.text.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn insert(&mut self, ch: char) {
        let at = self.byte_index(self.cursor);
        self.text.insert(at, ch);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.text.remove(at);
    }

    pub fn delete(&mut self) {
        if self.cursor >= self.text.chars().count() {
            return;
        }
        let at = self.byte_index(self.cursor);
        self.text.remove(at);
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.text.chars().count() {
            self.cursor += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    fn byte_index(&self, chars: usize) -> usize {
        self.text
            .char_indices()
            .nth(chars)
            .map_or(self.text.len(), |(idx, _)| idx)
    }
}

/// Position inside [`CommandHistory`]; `None` means the user is editing a fresh draft.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryCursor {
    index: Option<usize>,
}

impl HistoryCursor {
    #[must_use]
    pub fn index(self) -> Option<usize> {
        self.index
    }

    pub fn reset(&mut self) {
        self.index = None;
    }

    /// Moves through `history` and loads the selected entry into `input`.
    pub fn navigate(
        &mut self,
        direction: HistoryDirection,
        history: &CommandHistory,
        input: &mut InputLine,
    ) {
        match direction {
            HistoryDirection::Older => {
                if history.is_empty() {
                    return;
                }
                let last = history.len() - 1;
                let next = match self.index {
                    None => 0,
                    Some(idx) if idx < last => idx + 1,
                    Some(_) => return,
                };
                self.index = Some(next);
                if let Some(entry) = history.get(next) {
                    input.set(entry);
                }
            }
            HistoryDirection::Newer => {
                let Some(idx) = self.index else {
                    return;
                };
                if idx == 0 {
                    self.index = None;
                    input.clear();
                    return;
                }
                self.index = Some(idx - 1);
                if let Some(entry) = history.get(idx - 1) {
                    input.set(entry);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(entries: &[&str]) -> CommandHistory {
        CommandHistory::from_entries(entries.iter().map(|s| (*s).to_string()).collect())
    }

    #[test]
    fn consecutive_duplicates_keep_a_single_head() {
        let mut history = CommandHistory::new();
        assert!(history.push("status"));
        assert!(!history.push("status"));
        assert!(history.push("help"));
        assert!(history.push("status"));
        assert_eq!(history.entries(), ["status", "help", "status"]);
    }

    #[test]
    fn older_stops_at_last_index() {
        let history = history(&["help", "status"]);
        let mut cursor = HistoryCursor::default();
        let mut input = InputLine::default();

        for _ in 0..5 {
            cursor.navigate(HistoryDirection::Older, &history, &mut input);
        }
        assert_eq!(cursor.index(), Some(1));
        assert_eq!(input.text(), "status");
        assert_eq!(input.cursor(), "status".len());
    }

    #[test]
    fn newer_walks_back_to_empty_draft() {
        let history = history(&["help", "status"]);
        let mut cursor = HistoryCursor::default();
        let mut input = InputLine::default();

        cursor.navigate(HistoryDirection::Newer, &history, &mut input);
        assert_eq!(cursor.index(), None);
        assert_eq!(input.text(), "");

        input.set("draft");
        cursor.navigate(HistoryDirection::Older, &history, &mut input);
        cursor.navigate(HistoryDirection::Older, &history, &mut input);
        cursor.navigate(HistoryDirection::Newer, &history, &mut input);
        assert_eq!(cursor.index(), Some(0));
        assert_eq!(input.text(), "help");
        cursor.navigate(HistoryDirection::Newer, &history, &mut input);
        assert_eq!(cursor.index(), None);
        assert_eq!(input.text(), "");
    }

    #[test]
    fn input_line_edits_multibyte_text() {
        let mut input = InputLine::default();
        for ch in "привет".chars() {
            input.insert(ch);
        }
        input.move_left();
        input.backspace();
        assert_eq!(input.text(), "привет".replace('е', ""));
        input.move_home();
        input.delete();
        assert_eq!(input.text(), "ривт");
        input.move_end();
        assert_eq!(input.cursor(), 4);
    }
}
