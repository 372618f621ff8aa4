use crate::shared::{NUM_TRACKS, STEPS_PER_PATTERN};

// state local to the tui: where the cursor sits on the grid.
// `playing` is synced from DisplayState every frame
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TuiState {
    pub cursor_track: usize,
    pub cursor_step: usize,
    pub playing: bool,
}

impl TuiState {
    // moves wrap around the grid edges
    pub fn move_cursor(&mut self, d_track: i32, d_step: i32) {
        self.cursor_track = wrap(self.cursor_track, d_track, NUM_TRACKS);
        self.cursor_step = wrap(self.cursor_step, d_step, STEPS_PER_PATTERN);
    }
}

fn wrap(value: usize, delta: i32, len: usize) -> usize {
    (value as i64 + delta as i64).rem_euclid(len as i64) as usize
}
