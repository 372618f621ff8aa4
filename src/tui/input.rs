use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use super::mode::TuiState;
use crate::shared::{InputEvent, SlotId};

const VOLUME_STEP: f32 = 0.05;
const PROBABILITY_STEP: f32 = 0.1;
const TEMPO_STEP: f32 = 1.0;
const AMOUNT_STEP: f32 = 0.05; // swing and humanize

// poll for a key, move the cursor locally, and resolve everything else into
// input events for the middle layer
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code, ts));
    }
    Ok(vec![])
}

pub fn handle_key(code: KeyCode, ts: &mut TuiState) -> Vec<InputEvent> {
    let track = ts.cursor_track;
    match code {
        KeyCode::Esc => vec![InputEvent::Quit],
        KeyCode::Char(' ') => vec![InputEvent::PlayPress],

        // cursor never leaves the tui
        KeyCode::Up => { ts.move_cursor(-1, 0); vec![] }
        KeyCode::Down => { ts.move_cursor(1, 0); vec![] }
        KeyCode::Left => { ts.move_cursor(0, -1); vec![] }
        KeyCode::Right => { ts.move_cursor(0, 1); vec![] }
        KeyCode::Enter => vec![InputEvent::ToggleStep { track, step: ts.cursor_step }],

        // per-track params, always on the cursor's track
        KeyCode::Char('m') => vec![InputEvent::ToggleMute(track)],
        KeyCode::Char('[') => vec![InputEvent::AdjustVolume(track, -VOLUME_STEP)],
        KeyCode::Char(']') => vec![InputEvent::AdjustVolume(track, VOLUME_STEP)],
        KeyCode::Char('-') => vec![InputEvent::AdjustProbability(track, -PROBABILITY_STEP)],
        KeyCode::Char('=') => vec![InputEvent::AdjustProbability(track, PROBABILITY_STEP)],
        KeyCode::Char('n') => vec![InputEvent::CycleSample(track, 1)],
        KeyCode::Char('N') => vec![InputEvent::CycleSample(track, -1)],

        // transport, lowercase = down and shifted = up
        KeyCode::Char(',') => vec![InputEvent::AdjustTempo(-TEMPO_STEP)],
        KeyCode::Char('.') => vec![InputEvent::AdjustTempo(TEMPO_STEP)],
        KeyCode::Char('s') => vec![InputEvent::AdjustSwing(-AMOUNT_STEP)],
        KeyCode::Char('S') => vec![InputEvent::AdjustSwing(AMOUNT_STEP)],
        KeyCode::Char('h') => vec![InputEvent::AdjustHumanize(-AMOUNT_STEP)],
        KeyCode::Char('H') => vec![InputEvent::AdjustHumanize(AMOUNT_STEP)],

        // slots and song
        KeyCode::Char(c @ '1'..='4') => char_to_slot(c)
            .map(|slot| vec![InputEvent::SelectSlot(slot)])
            .unwrap_or_default(),
        KeyCode::Char('g') => vec![InputEvent::ToggleSongMode],
        KeyCode::Char('l') => vec![InputEvent::ToggleLoop],
        KeyCode::Char('c') => vec![InputEvent::ChainAppend],
        KeyCode::Char('x') => vec![InputEvent::ChainClear],
        KeyCode::Backspace => vec![InputEvent::ResetSlot],

        _ => vec![],
    }
}

fn char_to_slot(c: char) -> Option<SlotId> {
    let idx = c.to_digit(10)? as usize;
    SlotId::from_index(idx.checked_sub(1)?)
}
