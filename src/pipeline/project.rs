// The data the sequencer plays from, and the on-disk project that holds it.
//
// "track": one row of the grid, bound to one sample.
// "pattern": every track plus the grid of on/off steps.
// "slot": one of A-D, each owning exactly one pattern.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audio::SampleId;
use crate::shared::{
    clamp_tempo, clamp_unit, SlotId, DEFAULT_TEMPO, DEFAULT_VOLUME, NUM_TRACKS, STEPS_PER_PATTERN,
};

use super::song::SongChain;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub sample_id: Option<SampleId>,
    pub volume: f32,      // 0.0 to 1.0
    pub mute: bool,
    pub probability: f32, // chance a set step actually fires
}

impl Default for Track {
    fn default() -> Self {
        Self {
            sample_id: None,
            volume: DEFAULT_VOLUME,
            mute: false,
            probability: 1.0,
        }
    }
}

impl Track {
    pub fn has_sample(&self) -> bool {
        self.sample_id.as_ref().is_some_and(|id| !id.is_empty())
    }

    fn from_value(value: &Value) -> Self {
        let defaults = Self::default();
        let sample_id = value
            .get("sample_id")
            .and_then(Value::as_str)
            .map(SampleId::from)
            .filter(|id| !id.is_empty());
        Self {
            sample_id,
            volume: unit_field(value, "volume", defaults.volume),
            mute: value.get("mute").and_then(Value::as_bool).unwrap_or(false),
            probability: unit_field(value, "probability", defaults.probability),
        }
    }
}

/// Partial update for one track. `None` leaves the field alone; the sample
/// is doubly optional so it can be cleared.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackPatch {
    pub sample_id: Option<Option<SampleId>>,
    pub volume: Option<f32>,
    pub mute: Option<bool>,
    pub probability: Option<f32>,
}

impl TrackPatch {
    pub fn sample(id: Option<SampleId>) -> Self {
        Self { sample_id: Some(id), ..Self::default() }
    }

    pub fn volume(volume: f32) -> Self {
        Self { volume: Some(volume), ..Self::default() }
    }

    pub fn mute(mute: bool) -> Self {
        Self { mute: Some(mute), ..Self::default() }
    }

    pub fn probability(probability: f32) -> Self {
        Self { probability: Some(probability), ..Self::default() }
    }

    pub fn apply(&self, track: &Track) -> Track {
        let mut next = track.clone();
        if let Some(id) = &self.sample_id {
            next.sample_id = id.clone().filter(|id| !id.is_empty());
        }
        if let Some(volume) = self.volume {
            next.volume = clamp_unit(volume, track.volume);
        }
        if let Some(mute) = self.mute {
            next.mute = mute;
        }
        if let Some(probability) = self.probability {
            next.probability = clamp_unit(probability, track.probability);
        }
        next
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub tracks: Vec<Track>,
    pub step_grid: Vec<Vec<bool>>, // [track][step]
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            tracks: vec![Track::default(); NUM_TRACKS],
            step_grid: vec![vec![false; STEPS_PER_PATTERN]; NUM_TRACKS],
        }
    }
}

impl Pattern {
    pub fn is_set(&self, track: usize, step: usize) -> bool {
        self.step_grid
            .get(track)
            .and_then(|row| row.get(step))
            .copied()
            .unwrap_or(false)
    }

    pub fn with_track(&self, track: usize, patch: &TrackPatch) -> Self {
        assert!(track < self.tracks.len(), "track {track} out of range");
        let mut next = self.clone();
        next.tracks[track] = patch.apply(&self.tracks[track]);
        next
    }

    pub fn with_step_toggled(&self, track: usize, step: usize) -> Self {
        assert!(track < self.step_grid.len(), "track {track} out of range");
        assert!(step < self.step_grid[track].len(), "step {step} out of range");
        let mut next = self.clone();
        next.step_grid[track][step] = !next.step_grid[track][step];
        next
    }

    // Pads/truncates to NUM_TRACKS x STEPS_PER_PATTERN and clamps track fields
    pub fn normalized(mut self) -> Self {
        self.tracks.resize_with(NUM_TRACKS, Track::default);
        for track in self.tracks.iter_mut() {
            track.volume = clamp_unit(track.volume, DEFAULT_VOLUME);
            track.probability = clamp_unit(track.probability, 1.0);
            if !track.has_sample() {
                track.sample_id = None;
            }
        }
        self.step_grid.resize_with(NUM_TRACKS, Vec::new);
        for row in self.step_grid.iter_mut() {
            row.resize(STEPS_PER_PATTERN, false);
        }
        self
    }

    /// Every sample a track in this pattern refers to.
    pub fn sample_ids(&self) -> Vec<SampleId> {
        self.tracks
            .iter()
            .filter_map(|t| t.sample_id.clone())
            .filter(|id| !id.is_empty())
            .collect()
    }

    fn from_value(value: &Value) -> Self {
        let tracks = value
            .get("tracks")
            .and_then(Value::as_array)
            .map(|tracks| tracks.iter().map(Track::from_value).collect())
            .unwrap_or_default();
        let step_grid = value
            .get("step_grid")
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| cells.iter().map(|c| c.as_bool().unwrap_or(false)).collect())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Pattern { tracks, step_grid }.normalized()
    }
}

/// Everything that gets saved between sessions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub tempo: f32,
    pub swing: f32,
    pub humanize: f32,
    pub slots: BTreeMap<SlotId, Pattern>,
    pub active_slot: SlotId,
    pub song_mode: bool,
    pub loop_song: bool,
    pub song_chain: Vec<SlotId>,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self {
            tempo: DEFAULT_TEMPO,
            swing: 0.0,
            humanize: 0.0,
            slots: SlotId::ALL.iter().map(|&s| (s, Pattern::default())).collect(),
            active_slot: SlotId::A,
            song_mode: false,
            loop_song: true,
            song_chain: vec![SlotId::A],
        }
    }
}

impl ProjectState {
    /// Builds a project from arbitrary JSON without ever failing: missing or
    /// mistyped fields fall back to defaults, numbers clamp into range, grids
    /// are reshaped, and unknown slots or chain entries are dropped.
    pub fn from_json_value(value: &Value) -> Self {
        let defaults = Self::default();

        let tempo = value
            .get("tempo")
            .and_then(Value::as_f64)
            .map(|t| clamp_tempo(t as f32))
            .unwrap_or(defaults.tempo);

        let mut slots = defaults.slots.clone();
        if let Some(saved) = value.get("slots").and_then(Value::as_object) {
            for (key, pattern) in saved {
                if let Ok(slot) = key.parse::<SlotId>() {
                    slots.insert(slot, Pattern::from_value(pattern));
                }
            }
        }

        let active_slot = value
            .get("active_slot")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.active_slot);

        let chain: Vec<SlotId> = value
            .get("song_chain")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.as_str()?.parse().ok())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            tempo,
            swing: unit_field(value, "swing", defaults.swing),
            humanize: unit_field(value, "humanize", defaults.humanize),
            slots,
            active_slot,
            song_mode: value.get("song_mode").and_then(Value::as_bool).unwrap_or(defaults.song_mode),
            loop_song: value.get("loop_song").and_then(Value::as_bool).unwrap_or(defaults.loop_song),
            song_chain: SongChain::new(chain, true).slots().to_vec(),
        }
    }

    pub fn pattern(&self, slot: SlotId) -> Pattern {
        self.slots.get(&slot).cloned().unwrap_or_default()
    }

    pub fn chain(&self) -> SongChain {
        SongChain::new(self.song_chain.clone(), self.loop_song)
    }
}

fn unit_field(value: &Value, key: &str, fallback: f32) -> f32 {
    value
        .get(key)
        .and_then(Value::as_f64)
        .map(|v| clamp_unit(v as f32, fallback))
        .unwrap_or(fallback)
}
