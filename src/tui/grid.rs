use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use super::mode::TuiState;
use crate::shared::{DisplayState, NUM_TRACKS, STEPS_PER_BEAT, STEPS_PER_PATTERN};

const LABEL_WIDTH: u16 = 16;

// one row per track: its sample label, then a cell per step
pub fn draw_step_grid(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1); NUM_TRACKS])
        .split(area);

    for (track, row_area) in rows.iter().enumerate() {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(LABEL_WIDTH), Constraint::Min(STEPS_PER_PATTERN as u16 * 3)])
            .split(*row_area);

        frame.render_widget(Paragraph::new(track_label(state, track)), cols[0]);

        let cells: Vec<Span> = (0..STEPS_PER_PATTERN)
            .map(|step| cell(state, ts, track, step))
            .collect();
        frame.render_widget(Paragraph::new(Line::from(cells)), cols[1]);
    }
}

fn track_label(state: &DisplayState, track: usize) -> Line<'static> {
    let Some(view) = state.tracks.get(track) else {
        return Line::from("");
    };
    let mut name: String = view.label.chars().take(LABEL_WIDTH as usize - 2).collect();
    if view.mute {
        name = format!("({name})");
    }
    let style = if view.mute {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };
    Line::from(Span::styled(name, style))
}

fn cell(state: &DisplayState, ts: &TuiState, track: usize, step: usize) -> Span<'static> {
    let on = state.grid[track][step];
    let playhead = state.playing_step == Some(step);
    let cursor = ts.cursor_track == track && ts.cursor_step == step;

    let mut style = match (on, playhead) {
        (true, true) => Style::default().fg(Color::White).bg(Color::LightMagenta),
        (true, false) => Style::default().fg(Color::LightMagenta).bg(Color::Magenta),
        (false, true) => Style::default().bg(Color::DarkGray),
        (false, false) if step % STEPS_PER_BEAT == 0 => Style::default().fg(Color::Gray),
        (false, false) => Style::default().fg(Color::DarkGray),
    };
    if cursor {
        style = style.add_modifier(Modifier::REVERSED);
    }
    let glyph = if on { "[#]" } else { "[ ]" };
    Span::styled(glyph, style)
}
