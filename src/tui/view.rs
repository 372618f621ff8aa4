use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use super::grid::draw_step_grid;
use super::mode::TuiState;
use crate::shared::{DisplayState, NUM_TRACKS, SlotId};

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // transport + song
            Constraint::Length(NUM_TRACKS as u16 + 2), // step grid
            Constraint::Length(3), // selected track
            Constraint::Min(2), // status + key help
        ])
        .split(area);

    draw_header(frame, sections[0], state);
    let grid_block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" pattern {} ", state.active_slot));
    let inner = grid_block.inner(sections[1]);
    frame.render_widget(grid_block, sections[1]);
    draw_step_grid(frame, inner, state, ts);
    draw_track_line(frame, sections[2], state, ts);
    draw_footer(frame, sections[3], state);
}

fn draw_header(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let play = if state.playing { ">> PLAY" } else { "[] STOP" };
    let slots: String = SlotId::ALL
        .iter()
        .map(|s| if *s == state.active_slot { format!("[{s}]") } else { format!(" {s} ") })
        .collect();
    let chain = if state.chain.is_empty() {
        "(A)".to_string()
    } else {
        state.chain.iter().map(|s| s.letter()).collect::<Vec<_>>().join(" ")
    };
    let lines = vec![
        Line::from(format!(
            "{play}   {:>5.1} bpm   swing {:>3.0}%   humanize {:>3.0}%",
            state.tempo,
            state.swing * 100.0,
            state.humanize * 100.0
        )),
        Line::from(format!(
            "slots {slots}   song {}   loop {}   chain {chain}",
            on_off(state.song_mode),
            on_off(state.loop_song)
        )),
    ];
    let block = Block::default().borders(Borders::ALL).title(" padloop ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_track_line(frame: &mut Frame, area: Rect, state: &DisplayState, ts: &TuiState) {
    let text = match state.tracks.get(ts.cursor_track) {
        Some(t) => format!(
            "track {}  {}  vol {:>3.0}%  prob {:>3.0}%{}",
            ts.cursor_track + 1,
            t.label,
            t.volume * 100.0,
            t.probability * 100.0,
            if t.mute { "  MUTED" } else { "" }
        ),
        None => String::new(),
    };
    let block = Block::default().borders(Borders::ALL);
    frame.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_footer(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let lines = vec![
        Line::styled(state.status.clone(), Style::default().fg(Color::Yellow)),
        Line::styled(
            "arrows move  enter toggle  space play  m mute  [] vol  -= prob  ,. bpm  sS swing  hH humanize  1-4 slot  g song  l loop  c/x chain  n/N sample  bksp reset  esc quit",
            Style::default().fg(Color::DarkGray),
        ),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}
