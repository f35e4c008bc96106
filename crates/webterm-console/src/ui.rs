//! Full-screen terminal console driving a [`Session`].

#![allow(missing_docs)]

use std::io;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Terminal,
};

use crate::history::HistoryDirection;
use crate::session::Session;
use crate::transport::Transport;

mod input;
mod render;

const COLOR_TEAL: Color = Color::Rgb(0, 168, 150);
const COLOR_GREEN: Color = Color::Rgb(46, 204, 113);
const COLOR_AMBER: Color = Color::Rgb(243, 156, 18);
const COLOR_RED: Color = Color::Rgb(231, 76, 60);
const COLOR_INFO: Color = Color::Rgb(142, 142, 147);
const COLOR_YELLOW: Color = Color::Rgb(245, 196, 66);
const COLOR_CYAN: Color = Color::Rgb(64, 212, 255);
const COLOR_PROMPT_BG: Color = Color::Rgb(24, 24, 24);

const IDLE_POLL: Duration = Duration::from_millis(50);
const PAGE_LINES: usize = 10;

/// Runs the console until the user quits.
pub fn run_console<T: Transport>(session: &mut Session<T>, no_input: bool) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = (|| -> anyhow::Result<()> {
        let mut drawn = false;
        loop {
            let now = Instant::now();
            session.poll(now);
            if session.take_bell() {
                execute!(terminal.backend_mut(), Print('\u{7}'))?;
            }

            terminal.draw(|frame| render::render_ui(frame.size(), frame, session, no_input, now))?;
            if !drawn {
                session.mark_ui_ready();
                drawn = true;
            }

            let wait = session
                .renderer()
                .next_deadline()
                .map_or(IDLE_POLL, |due| {
                    due.saturating_duration_since(Instant::now()).min(IDLE_POLL)
                });
            if event::poll(wait)? {
                if let Event::Key(key) = event::read()? {
                    if handle_key(key, session, no_input)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    })();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn handle_key<T: Transport>(
    key: KeyEvent,
    session: &mut Session<T>,
    no_input: bool,
) -> anyhow::Result<bool> {
    input::handle_key(key, session, no_input)
}

fn connection_chip(connected: bool) -> (String, Style) {
    let (label, bg, fg) = if connected {
        ("ONLINE", COLOR_TEAL, Color::White)
    } else {
        ("OFFLINE", COLOR_RED, Color::White)
    };
    (
        format!("[{label}]"),
        Style::default().bg(bg).fg(fg).add_modifier(Modifier::BOLD),
    )
}

fn panel_block(title: &str) -> Block<'static> {
    Block::default()
        .title(Span::styled(
            format!(" {title} "),
            Style::default()
                .fg(COLOR_YELLOW)
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Plain)
        .border_style(Style::default().fg(COLOR_INFO))
}

fn label_style() -> Style {
    Style::default().fg(COLOR_CYAN)
}

fn value_style() -> Style {
    Style::default().fg(Color::White)
}

fn label_value_spans(label: &str, value: &str) -> Vec<Span<'static>> {
    vec![
        Span::styled(format!("{label} "), label_style()),
        Span::styled(value.to_string(), value_style()),
        Span::raw("   "),
    ]
}

fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )
}

fn utc_clock(now: SystemTime) -> String {
    let secs = now
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
        % 86_400;
    format!(
        "{:02}:{:02}:{:02} UTC",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )
}

fn format_latency(latency: Option<Duration>) -> String {
    match latency {
        Some(latency) => format!("{}ms", latency.as_millis()),
        None => "--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsoleConfig;
    use crate::dispatcher::CommandRegistry;
    use crate::storage::MemoryStorage;
    use crate::testing::RecordingTransport;
    use ratatui::backend::TestBackend;
    use serde_json::json;

    fn session() -> Session<RecordingTransport> {
        let mut config = ConsoleConfig::default();
        config.server.ping_interval = None;
        Session::start(
            &config,
            Box::new(MemoryStorage::new()),
            RecordingTransport::new(),
            CommandRegistry::with_builtins(),
            None,
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(session: &mut Session<RecordingTransport>, text: &str) {
        for ch in text.chars() {
            handle_key(key(KeyCode::Char(ch)), session, false).expect("type");
        }
    }

    fn render_snapshot(
        session: &Session<RecordingTransport>,
        no_input: bool,
        width: u16,
        height: u16,
    ) -> String {
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).expect("create test terminal");
        let now = Instant::now();
        terminal
            .draw(|frame| render::render_ui(frame.size(), frame, session, no_input, now))
            .expect("draw ui");
        let mut lines = Vec::new();
        let buffer = terminal.backend().buffer();
        for y in 0..height {
            let mut line = String::new();
            for x in 0..width {
                line.push_str(buffer.get(x, y).symbol());
            }
            lines.push(line.trim_end().to_string());
        }
        lines.join("\n")
    }

    #[test]
    fn enter_forwards_typed_command() {
        let mut session = session();
        type_text(&mut session, "status");
        assert_eq!(session.dispatcher().input().text(), "status");
        handle_key(key(KeyCode::Enter), &mut session, false).expect("enter");
        assert_eq!(
            session.transport().sent(),
            [(
                "terminal_input".to_string(),
                Some(json!({ "command": "status" }))
            )]
        );
        assert_eq!(session.dispatcher().input().text(), "");
    }

    #[test]
    fn arrows_walk_history_and_edit_caret() {
        let mut session = session();
        session.submit("first");
        session.submit("second");
        handle_key(key(KeyCode::Up), &mut session, false).expect("up");
        assert_eq!(session.dispatcher().input().text(), "second");
        handle_key(key(KeyCode::Up), &mut session, false).expect("up");
        assert_eq!(session.dispatcher().input().text(), "first");
        handle_key(key(KeyCode::Home), &mut session, false).expect("home");
        handle_key(key(KeyCode::Delete), &mut session, false).expect("delete");
        assert_eq!(session.dispatcher().input().text(), "irst");
        handle_key(key(KeyCode::Down), &mut session, false).expect("down");
        assert_eq!(session.dispatcher().input().text(), "second");
    }

    #[test]
    fn quit_keys_and_sound_toggle() {
        let mut session = session();
        assert!(!handle_key(key(KeyCode::F(2)), &mut session, false).expect("f2"));
        assert!(!session.sound_enabled());
        assert!(handle_key(key(KeyCode::Esc), &mut session, false).expect("esc"));
        assert!(handle_key(
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            &mut session,
            false
        )
        .expect("ctrl-c"));
    }

    #[test]
    fn read_only_mode_ignores_typing() {
        let mut session = session();
        assert!(!handle_key(key(KeyCode::Char('x')), &mut session, true).expect("type"));
        assert_eq!(session.dispatcher().input().text(), "");
        assert!(handle_key(key(KeyCode::Char('q')), &mut session, true).expect("quit"));
    }

    #[test]
    fn renders_banner_prompt_and_input() {
        let mut session = session();
        type_text(&mut session, "help");
        let snapshot = render_snapshot(&session, false, 80, 20);
        assert!(snapshot.contains("[ONLINE]"));
        assert!(snapshot.contains("SESSION LOCKED"));
        assert!(snapshot.contains("login <UID> <KEY>"));
        assert!(snapshot.contains("$ help"));
        assert!(!snapshot.contains("Frequency"));
    }

    #[test]
    fn typing_stays_visible_while_awaiting_reply() {
        let mut session = session();
        session.submit("status");
        assert!(!session.renderer().is_prompt_open());
        type_text(&mut session, "abc");
        let snapshot = render_snapshot(&session, false, 80, 20);
        assert!(snapshot.contains("$ status"));
        assert!(snapshot.contains("$ abc"));
    }

    #[test]
    fn typing_stays_visible_after_failed_send() {
        let mut session = session();
        session.transport_mut().set_connected(false);
        type_text(&mut session, "status");
        handle_key(key(KeyCode::Enter), &mut session, false).expect("enter");
        type_text(&mut session, "typedtext");
        session.poll(Instant::now());
        assert!(session.renderer().is_prompt_open());
        let snapshot = render_snapshot(&session, false, 80, 20);
        assert!(snapshot.contains("[OFFLINE]"));
        assert!(snapshot.contains("$ typedtext"));
    }

    #[test]
    fn renders_info_panel_for_allowed_role() {
        let mut session = session();
        session.mark_ui_ready();
        session.transport_mut().push_event(
            "update_ui_state",
            json!({
                "show_ui_panel": true,
                "role": "syndicate",
                "callsign": "RAVEN",
                "squad_frequencies": { "alpha": "142.7", "beta": "148.8" }
            }),
        );
        session.poll(Instant::now());
        let snapshot = render_snapshot(&session, true, 100, 20);
        assert!(snapshot.contains("RAVEN"));
        assert!(snapshot.contains("Alpha 142.7"));
        assert!(snapshot.contains("Beta 148.8"));
        assert!(snapshot.contains("Read-only mode"));
    }

    #[test]
    fn clock_and_uptime_format() {
        assert_eq!(format_uptime(Duration::from_secs(3725)), "01:02:05");
        assert_eq!(
            utc_clock(UNIX_EPOCH + Duration::from_secs(86_400 + 61)),
            "00:01:01 UTC"
        );
        assert_eq!(format_latency(None), "--");
        assert_eq!(format_latency(Some(Duration::from_millis(42))), "42ms");
    }

    #[test]
    fn page_keys_scroll_output() {
        let mut session = session();
        for idx in 0..30 {
            session.submit(&format!("echo line {idx}"));
        }
        handle_key(key(KeyCode::PageUp), &mut session, false).expect("page up");
        assert_eq!(session.renderer().scroll_back(), PAGE_LINES);
        handle_key(key(KeyCode::PageDown), &mut session, false).expect("page down");
        assert_eq!(session.renderer().scroll_back(), 0);
    }
}
