use std::time::Duration;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crate::loader::MediaMode;
use crate::shared::ControlEvent;
use super::mode::TuiState;

const JUMP_PX: f64 = 10.0;

// poll for terminal input, resolving keys against the panel selection into
// control events for the loop
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<ControlEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => Ok(handle_key(key.code, ts)),
        // the terminal equivalent of the page being hidden
        Event::FocusLost => Ok(vec![ControlEvent::Hidden]),
        _ => Ok(vec![]),
    }
}

fn handle_key(code: KeyCode, ts: &mut TuiState) -> Vec<ControlEvent> {
    match code {
        KeyCode::Esc | KeyCode::Char('q') => vec![ControlEvent::Quit],
        KeyCode::Char(' ') => vec![ControlEvent::TogglePlay],
        KeyCode::Char('s') => vec![ControlEvent::Stop],
        KeyCode::Home | KeyCode::Backspace => vec![ControlEvent::Rewind],
        KeyCode::Char(',') => vec![ControlEvent::Jump(-JUMP_PX)],
        KeyCode::Char('.') => vec![ControlEvent::Jump(JUMP_PX)],

        // panel: pick a row, then step its value
        KeyCode::Up => { ts.selected = ts.selected.step(-1); vec![] }
        KeyCode::Down => { ts.selected = ts.selected.step(1); vec![] }
        KeyCode::Left => vec![ControlEvent::Adjust(ts.selected, -1)],
        KeyCode::Right => vec![ControlEvent::Adjust(ts.selected, 1)],

        // input sources
        KeyCode::Char('1') => vec![ControlEvent::SelectSource(MediaMode::Image)],
        KeyCode::Char('2') => vec![ControlEvent::SelectSource(MediaMode::Video)],
        KeyCode::Char('3') => vec![ControlEvent::SelectSource(MediaMode::Webcam)],
        KeyCode::Char('4') => vec![ControlEvent::SelectSource(MediaMode::Screen)],

        KeyCode::Char('m') => vec![ControlEvent::NextMidiInput],
        KeyCode::Char('?') => { ts.show_help = !ts.show_help; vec![] }

        _ => vec![],
    }
}
