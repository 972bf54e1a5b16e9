use crate::shared::{DisplayState, PanelField};
use super::canvas::draw_frame;
use super::mode::TuiState;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

const PANEL_WIDTH: u16 = 30;

const HELP: [&str; 8] = [
    "space  play / pause",
    "s      stop   home  rewind",
    ", .    jump back / ahead",
    "up dn  select row",
    "lt rt  change value",
    "1-4    image video cam screen",
    "m      next midi input",
    "esc    quit",
];

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),    // canvas + panel
            Constraint::Length(3), // status
        ])
        .split(area);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(PANEL_WIDTH)])
        .split(rows[0]);

    draw_canvas(frame, cols[0], state);
    draw_panel(frame, cols[1], state, ts);
    draw_status(frame, rows[1], state);
}

fn draw_canvas(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", state.source.label()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if state.ready {
        draw_frame(frame, inner, &state.overlay);
    } else {
        let msg = Paragraph::new("no frame").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(msg, inner);
    }
}

fn draw_panel(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let block = Block::default().borders(Borders::ALL).title(" panel ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = if ts.show_help {
        HELP.iter().map(|h| Line::from(*h)).collect()
    } else {
        PanelField::ALL
            .iter()
            .map(|&field| {
                let style = if field == ts.selected {
                    Style::default().fg(Color::Black).bg(Color::LightMagenta)
                } else {
                    Style::default()
                };
                Line::from(vec![
                    Span::styled(format!("{:<8}", field.label()), style.add_modifier(Modifier::BOLD)),
                    Span::styled(format!(" {}", field.value(&state.config)), style),
                ])
            })
            .collect()
    };

    lines.push(Line::from(""));
    for (i, r) in state.readings.iter().enumerate() {
        lines.push(Line::styled(
            format!("v{:<2} {:>4},{:<4} {:.2} {:>7.1}Hz", i + 1, r.x, r.y, r.brightness, r.frequency),
            Style::default().fg(Color::Gray),
        ));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let (label, color) = if state.playing {
        ("PLAY", Color::Green)
    } else {
        ("STOP", Color::DarkGray)
    };
    let midi = state.midi_input.as_deref().unwrap_or("no midi");
    let line = Line::from(vec![
        Span::styled(format!(" {label} "), Style::default().fg(Color::Black).bg(color)),
        Span::raw(format!("  {}  ", state.status)),
        Span::styled(format!("[{midi}]"), Style::default().fg(Color::DarkGray)),
        Span::styled("  ? help", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(line).block(Block::default().borders(Borders::ALL)), area);
}
