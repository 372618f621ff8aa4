// Key plan (resolved by tui/input.rs into the InputEvents below):
//
//   arrows        //  move the cursor over the 8x16 grid (tui-local)
//   Enter         //  ToggleStep(track, step) under the cursor
//   Space         //  PlayPress
//   m             //  ToggleMute(track)
//   [ / ]         //  AdjustVolume(track, -/+)
//   - / =         //  AdjustProbability(track, -/+)
//   , / .         //  AdjustTempo(-/+)
//   s / S         //  AdjustSwing(-/+)
//   h / H         //  AdjustHumanize(-/+)
//   1 2 3 4       //  SelectSlot(A..D)
//   g             //  ToggleSongMode
//   l             //  ToggleLoop
//   c / x         //  ChainAppend / ChainClear
//   n / N         //  CycleSample(track, +1 / -1), previews the new sample
//   Backspace     //  ResetSlot
//   Esc           //  Quit
//
// The middle layer owns every bit of sequencer state; the tui only draws the
// DisplayState it gets back each frame.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// Grid dimensions. Every pattern has exactly NUM_TRACKS rows of
// STEPS_PER_PATTERN cells, normalization pads or truncates to these.
pub const NUM_TRACKS: usize = 8;
pub const STEPS_PER_PATTERN: usize = 16;
pub const STEPS_PER_BEAT: usize = 4; // 16th notes

pub const MIN_TEMPO: f32 = 40.0;
pub const MAX_TEMPO: f32 = 240.0;
pub const DEFAULT_TEMPO: f32 = 120.0;

pub const DEFAULT_VOLUME: f32 = 0.7;

// Largest humanize offset in seconds, scaled by the humanize amount
pub const MAX_HUMANIZE_SECONDS: f64 = 0.03;

pub fn clamp_tempo(bpm: f32) -> f32 {
    if bpm.is_nan() {
        return DEFAULT_TEMPO;
    }
    bpm.clamp(MIN_TEMPO, MAX_TEMPO)
}

// Clamp into [0, 1]; NaN falls back to `fallback`
pub fn clamp_unit(value: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        return fallback;
    }
    value.clamp(0.0, 1.0)
}

/// One of the four independently stored pattern slots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SlotId {
    #[default]
    A,
    B,
    C,
    D,
}

impl SlotId {
    pub const ALL: [SlotId; 4] = [SlotId::A, SlotId::B, SlotId::C, SlotId::D];

    pub fn index(self) -> usize {
        match self {
            SlotId::A => 0,
            SlotId::B => 1,
            SlotId::C => 2,
            SlotId::D => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn letter(self) -> &'static str {
        match self {
            SlotId::A => "A",
            SlotId::B => "B",
            SlotId::C => "C",
            SlotId::D => "D",
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

impl FromStr for SlotId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(SlotId::A),
            "B" | "b" => Ok(SlotId::B),
            "C" | "c" => Ok(SlotId::C),
            "D" | "d" => Ok(SlotId::D),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    ToggleStep { track: usize, step: usize },
    PlayPress,
    ToggleMute(usize),
    AdjustVolume(usize, f32),
    AdjustProbability(usize, f32),
    AdjustTempo(f32),
    AdjustSwing(f32),
    AdjustHumanize(f32),
    SelectSlot(SlotId),
    ToggleSongMode,
    ToggleLoop,
    ChainAppend,
    ChainClear,
    CycleSample(usize, i32), // track, direction
    ResetSlot,
    Quit,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackView {
    pub label: String, // sample name or "--"
    pub volume: f32,
    pub mute: bool,
    pub probability: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DisplayState {
    pub grid: [[bool; STEPS_PER_PATTERN]; NUM_TRACKS],
    pub tracks: Vec<TrackView>,
    pub playing: bool,
    pub playing_step: Option<usize>, // last step handed to the audio clock
    pub active_slot: SlotId,
    pub tempo: f32,
    pub swing: f32,
    pub humanize: f32,
    pub song_mode: bool,
    pub loop_song: bool,
    pub chain: Vec<SlotId>,
    pub status: String, // last error or notice, empty when there's nothing to say
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tempo_is_clamped_to_range() {
        assert_eq!(clamp_tempo(10.0), MIN_TEMPO);
        assert_eq!(clamp_tempo(999.0), MAX_TEMPO);
        assert_eq!(clamp_tempo(f32::NAN), DEFAULT_TEMPO);
        assert_eq!(clamp_tempo(133.0), 133.0);
    }

    #[test]
    fn slot_ids_parse_and_print() {
        for slot in SlotId::ALL {
            assert_eq!(slot.letter().parse::<SlotId>(), Ok(slot));
            assert_eq!(SlotId::from_index(slot.index()), Some(slot));
        }
        assert!("E".parse::<SlotId>().is_err());
        assert_eq!(SlotId::from_index(4), None);
    }
}
