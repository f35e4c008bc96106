use super::*;

use crossterm::event::KeyEventKind;

pub(super) fn handle_key<T: Transport>(
    key: KeyEvent,
    session: &mut Session<T>,
    no_input: bool,
) -> anyhow::Result<bool> {
    if key.kind == KeyEventKind::Release {
        return Ok(false);
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if key.code == KeyCode::Esc || (ctrl && key.code == KeyCode::Char('c')) {
        return Ok(true);
    }

    match key.code {
        KeyCode::PageUp => {
            let lines = session.renderer().buffer().lines().count();
            let renderer = session.renderer_mut();
            renderer.scroll_up(PAGE_LINES);
            renderer.clamp_scroll(lines);
            return Ok(false);
        }
        KeyCode::PageDown => {
            session.renderer_mut().scroll_down(PAGE_LINES);
            return Ok(false);
        }
        KeyCode::F(2) => {
            session.toggle_sound();
            return Ok(false);
        }
        _ => {}
    }

    if no_input {
        return Ok(matches!(key.code, KeyCode::Char('q' | 'Q')));
    }
    handle_prompt_key(key, session, ctrl);
    Ok(false)
}

fn handle_prompt_key<T: Transport>(key: KeyEvent, session: &mut Session<T>, ctrl: bool) {
    match key.code {
        KeyCode::Enter => {
            session.submit_input();
        }
        KeyCode::Up => session.navigate_history(HistoryDirection::Older),
        KeyCode::Down => session.navigate_history(HistoryDirection::Newer),
        KeyCode::Left => session.dispatcher_mut().input_mut().move_left(),
        KeyCode::Right => session.dispatcher_mut().input_mut().move_right(),
        KeyCode::Home => session.dispatcher_mut().input_mut().move_home(),
        KeyCode::End => session.dispatcher_mut().input_mut().move_end(),
        KeyCode::Backspace => session.dispatcher_mut().input_mut().backspace(),
        KeyCode::Delete => session.dispatcher_mut().input_mut().delete(),
        KeyCode::Char(ch) if !ctrl => session.dispatcher_mut().input_mut().insert(ch),
        _ => {}
    }
}
