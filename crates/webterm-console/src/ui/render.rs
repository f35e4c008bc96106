use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::*;

pub(super) fn render_ui<T: Transport>(
    area: Rect,
    frame: &mut ratatui::Frame<'_>,
    session: &Session<T>,
    no_input: bool,
    now: Instant,
) {
    let view = session.panels();
    let info_height = if view.session_panel || view.info_panel {
        3
    } else {
        0
    };
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(info_height),
            Constraint::Length(1),
        ])
        .split(area);
    render_header(layout[0], frame, session, now);
    render_output(layout[1], frame, session, no_input);
    if info_height > 0 {
        render_info(layout[2], frame, session);
    }
    render_footer(layout[3], frame, no_input);
}

fn render_header<T: Transport>(
    area: Rect,
    frame: &mut ratatui::Frame<'_>,
    session: &Session<T>,
    now: Instant,
) {
    let (chip, chip_style) = connection_chip(session.is_connected());
    let (lock, lock_style) = if session.panels().session_panel {
        ("SESSION ACTIVE", Style::default().fg(COLOR_GREEN))
    } else {
        ("SESSION LOCKED", Style::default().fg(COLOR_AMBER))
    };
    let mut spans = vec![
        Span::styled(chip, chip_style),
        Span::raw(" "),
        Span::styled(lock, lock_style.add_modifier(Modifier::BOLD)),
        Span::raw("   "),
    ];
    spans.extend(label_value_spans("UP", &format_uptime(session.uptime(now))));
    spans.extend(label_value_spans("", &utc_clock(SystemTime::now())));
    spans.extend(label_value_spans("PING", &format_latency(session.latency())));
    spans.extend(label_value_spans(
        "SND",
        if session.sound_enabled() { "ON" } else { "OFF" },
    ));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_output<T: Transport>(
    area: Rect,
    frame: &mut ratatui::Frame<'_>,
    session: &Session<T>,
    no_input: bool,
) {
    let block = panel_block("Terminal");
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let renderer = session.renderer();
    let input = session.dispatcher().input();
    let mut text = renderer.buffer().to_string();
    let mut before_caret = None;
    if !no_input {
        if !renderer.is_prompt_open() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(renderer.prompt());
        }
        let line_start = text.rfind('\n').map_or(0, |idx| idx + 1);
        let mut before = text[line_start..].to_string();
        before.extend(input.text().chars().take(input.cursor()));
        before_caret = Some(before);
        text.push_str(input.text());
    }

    let width = usize::from(inner.width);
    let height = usize::from(inner.height);
    let logical: Vec<&str> = text.split('\n').collect();
    let mut wrapped: Vec<String> = Vec::new();
    for line in &logical[..logical.len() - 1] {
        wrapped.extend(wrap_line(line, width));
    }
    let last_start = wrapped.len();
    wrapped.extend(wrap_line(logical[logical.len() - 1], width));

    let caret = before_caret.map(|before| {
        let (row, col) = caret_position(&before, width);
        (last_start + row, col)
    });
    if let Some((row, _)) = caret {
        while wrapped.len() <= row {
            wrapped.push(String::new());
        }
    }

    let total = wrapped.len();
    let scroll = renderer.scroll_back().min(total.saturating_sub(height));
    let end = total - scroll;
    let start = end.saturating_sub(height);
    let lines = wrapped[start..end]
        .iter()
        .map(|line| Line::from(Span::styled(line.clone(), Style::default().fg(COLOR_GREEN))))
        .collect::<Vec<_>>();
    frame.render_widget(Paragraph::new(lines), inner);

    if let Some((row, col)) = caret {
        if (start..end).contains(&row) {
            let x = inner.x + u16::try_from(col).unwrap_or(0);
            let y = inner.y + u16::try_from(row - start).unwrap_or(0);
            frame.set_cursor(x, y);
        }
    }
}

/// Splits `line` into rows of at most `width` display columns.
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = vec![String::new()];
    let mut used = 0;
    for ch in line.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if used + ch_width > width && used > 0 {
            rows.push(String::new());
            used = 0;
        }
        if let Some(row) = rows.last_mut() {
            row.push(ch);
        }
        used += ch_width;
    }
    rows
}

/// Row and column just after `before`, wrapped the same way as [`wrap_line`].
fn caret_position(before: &str, width: usize) -> (usize, usize) {
    let width = width.max(1);
    let rows = wrap_line(before, width);
    let row = rows.len() - 1;
    let col = rows[row].width();
    if col >= width {
        (row + 1, 0)
    } else {
        (row, col)
    }
}

fn render_info<T: Transport>(area: Rect, frame: &mut ratatui::Frame<'_>, session: &Session<T>) {
    let view = session.panels();
    let mut spans = Vec::new();
    spans.extend(label_value_spans(
        "Role",
        view.role.as_deref().unwrap_or("--"),
    ));
    spans.extend(label_value_spans(
        "Callsign",
        view.callsign.as_deref().unwrap_or("--"),
    ));
    spans.extend(label_value_spans(
        "Squad",
        view.squad.as_deref().unwrap_or("--"),
    ));
    if view.info_panel {
        if view.squad_frequencies {
            spans.extend(label_value_spans("Alpha", &view.alpha_frequency));
            spans.extend(label_value_spans("Beta", &view.beta_frequency));
        }
        if view.shared_frequency {
            spans.extend(label_value_spans("Frequency", &view.channel_frequency));
        }
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).block(panel_block("Session")),
        area,
    );
}

fn render_footer(area: Rect, frame: &mut ratatui::Frame<'_>, no_input: bool) {
    let hint = if no_input {
        "Read-only mode  PgUp/PgDn scroll  F2 sound  q quit"
    } else {
        "Enter send  Up/Down history  PgUp/PgDn scroll  F2 sound  Esc quit"
    };
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            hint,
            Style::default().fg(COLOR_INFO).add_modifier(Modifier::DIM),
        )))
        .style(Style::default().bg(COLOR_PROMPT_BG)),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_lines_wrap_at_width() {
        assert_eq!(wrap_line("abcdefg", 3), ["abc", "def", "g"]);
        assert_eq!(wrap_line("", 3), [""]);
    }

    #[test]
    fn wide_glyphs_wrap_by_display_width() {
        assert_eq!(wrap_line("\u{2705}ok", 3), ["\u{2705}o", "k"]);
        assert_eq!(wrap_line("a\u{2705}\u{2705}", 3), ["a\u{2705}", "\u{2705}"]);
        assert_eq!(wrap_line("\u{2705}", 1), ["\u{2705}"]);
    }

    #[test]
    fn caret_follows_display_columns() {
        assert_eq!(caret_position("$ ", 10), (0, 2));
        assert_eq!(caret_position("$ \u{2705}", 10), (0, 4));
        assert_eq!(caret_position("abc", 3), (1, 0));
        assert_eq!(caret_position("a\u{2705}\u{2705}", 3), (1, 2));
    }
}
