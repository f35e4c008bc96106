//! Terminal output buffer with instant and typewriter appends.

#![allow(missing_docs)]

use std::time::{Duration, Instant};

use smol_str::SmolStr;
use tracing::debug;

/// Output payload that clears the screen instead of being printed.
pub const CLEAR_SENTINEL: &str = "<CLEAR_TERMINAL>";

#[must_use]
pub fn is_clear_sentinel(text: &str) -> bool {
    text.trim() == CLEAR_SENTINEL
}

/// Character-by-character reveal, advanced by [`OutputRenderer::tick`].
#[derive(Debug, Clone)]
struct Reveal {
    chars: Vec<char>,
    next: usize,
    add_newline: bool,
    next_due: Instant,
    cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct OutputRenderer {
    buffer: String,
    prompt: SmolStr,
    typing_delay: Duration,
    reveal: Option<Reveal>,
    prompt_open: bool,
    pending_save: bool,
    scroll_back: usize,
}

impl OutputRenderer {
    #[must_use]
    pub fn new(prompt: impl Into<SmolStr>, typing_delay: Duration) -> Self {
        Self {
            buffer: String::new(),
            prompt: prompt.into(),
            typing_delay,
            reveal: None,
            prompt_open: false,
            pending_save: false,
            scroll_back: 0,
        }
    }

    #[must_use]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn is_typing(&self) -> bool {
        self.reveal.is_some()
    }

    #[must_use]
    pub fn is_prompt_open(&self) -> bool {
        self.prompt_open
    }

    /// Lines scrolled up from the end of the buffer.
    #[must_use]
    pub fn scroll_back(&self) -> usize {
        self.scroll_back
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_back = self.scroll_back.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_back = self.scroll_back.saturating_sub(lines);
    }

    /// Clamps the scroll position once the view knows how many lines exist.
    pub fn clamp_scroll(&mut self, max: usize) {
        self.scroll_back = self.scroll_back.min(max);
    }

    /// Returns `true` once after each change that should be persisted.
    pub fn take_pending_save(&mut self) -> bool {
        std::mem::take(&mut self.pending_save)
    }

    /// Replaces the buffer with restored content; no save is scheduled.
    pub fn restore(&mut self, buffer: String) {
        self.prompt_open = ends_with_prompt(&buffer, &self.prompt);
        self.buffer = buffer;
        self.scroll_back = 0;
    }

    /// Returns `false` when the text was dropped because a reveal is running.
    pub fn append(&mut self, text: &str, add_newline: bool, instant: bool) -> bool {
        self.append_at(text, add_newline, instant, Instant::now())
    }

    /// Same as [`append`](Self::append) with an explicit start time for the reveal.
    pub fn append_at(&mut self, text: &str, add_newline: bool, instant: bool, now: Instant) -> bool {
        if instant {
            self.append_instant(text, add_newline);
            return true;
        }
        if self.reveal.is_some() {
            debug!(len = text.len(), "reveal in progress, dropping output");
            return false;
        }
        self.retract_idle_prompt();
        self.reveal = Some(Reveal {
            chars: text.chars().collect(),
            next: 0,
            add_newline,
            next_due: now,
            cancelled: false,
        });
        true
    }

    fn append_instant(&mut self, text: &str, add_newline: bool) {
        self.buffer.push_str(text);
        if add_newline && !text.ends_with('\n') {
            self.buffer.push('\n');
        }
        self.prompt_open = false;
        self.scroll_back = 0;
        self.pending_save = true;
    }

    /// Reveals every character whose slot has elapsed by `now`.
    pub fn tick(&mut self, now: Instant) {
        let Some(reveal) = self.reveal.as_mut() else {
            return;
        };
        if reveal.cancelled {
            self.reveal = None;
            return;
        }
        while reveal.next < reveal.chars.len() && reveal.next_due <= now {
            self.buffer.push(reveal.chars[reveal.next]);
            reveal.next += 1;
            reveal.next_due += self.typing_delay;
            self.scroll_back = 0;
        }
        if reveal.next < reveal.chars.len() {
            return;
        }
        let add_newline = reveal.add_newline;
        self.reveal = None;
        if add_newline && !self.buffer.ends_with('\n') {
            self.buffer.push('\n');
        }
        self.redraw_prompt();
    }

    /// Time at which the running reveal wants its next tick.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.reveal.as_ref().map(|reveal| reveal.next_due)
    }

    /// Stops the running reveal at its next tick; no newline or prompt follows.
    pub fn cancel_reveal(&mut self) {
        if let Some(reveal) = self.reveal.as_mut() {
            reveal.cancelled = true;
        }
    }

    /// Starts a fresh prompt line.
    pub fn redraw_prompt(&mut self) {
        if !self.buffer.is_empty() && !self.buffer.ends_with('\n') {
            self.buffer.push('\n');
        }
        let prompt = self.prompt.clone();
        self.append_instant(&prompt, false);
        self.prompt_open = true;
    }

    /// Echoes a submitted line after the prompt marker.
    pub fn echo_command(&mut self, line: &str) {
        if self.prompt_open {
            self.append_instant(line, true);
        } else {
            let echoed = format!("{}{line}", self.prompt);
            self.append_instant(&echoed, true);
        }
    }

    /// Empties the buffer and redraws the prompt.
    pub fn clear_screen(&mut self) {
        self.cancel_reveal();
        self.buffer.clear();
        self.prompt_open = false;
        self.redraw_prompt();
    }

    fn retract_idle_prompt(&mut self) {
        if self.prompt_open && self.buffer.ends_with(self.prompt.as_str()) {
            let len = self.buffer.len() - self.prompt.len();
            self.buffer.truncate(len);
            self.prompt_open = false;
        }
    }
}

fn ends_with_prompt(buffer: &str, prompt: &str) -> bool {
    buffer
        .strip_suffix(prompt)
        .is_some_and(|rest| rest.is_empty() || rest.ends_with('\n'))
}
