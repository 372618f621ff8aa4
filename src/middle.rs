// Sits between the tui and the engine. Holds the editable copy of every
// pattern, publishes a fresh snapshot to the engine after each edit, and
// turns engine state back into a DisplayState for drawing.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::audio::SampleId;
use crate::error::EngineError;
use crate::pipeline::{PatternStore, ProjectState, SongChain, TrackPatch};
use crate::sequencer::Engine;
use crate::shared::{
    DisplayState, InputEvent, SlotId, TrackView, NUM_TRACKS, STEPS_PER_PATTERN,
};

const NO_STEP: usize = usize::MAX;

// First matching prefix wins, so Drill_Bass lands in Kicks before Drill_ can
// claim it for Percs.
const CATEGORIES: &[(&str, &[&str])] = &[
    ("Kicks", &["Kick_", "Drill_Bass"]),
    ("Snares", &["Snare_"]),
    ("Claps", &["Clap_"]),
    ("Hats", &["Hat_"]),
    ("Percs", &["Perc_", "Rim_", "Tom_", "Drill_"]),
    ("Effects", &["Fill_", "Glitch_"]),
    ("Loops", &["Loop_"]),
];

/// Index into CATEGORIES by filename prefix, None for anything unprefixed.
fn category_of(id: &SampleId) -> Option<usize> {
    CATEGORIES
        .iter()
        .position(|(_, prefixes)| prefixes.iter().any(|p| id.0.starts_with(p)))
}

/// "Kicks/Kick_808.wav" for categorised samples, the bare name otherwise.
fn sample_label(id: &SampleId) -> String {
    match category_of(id) {
        Some(c) => format!("{}/{id}", CATEGORIES[c].0),
        None => id.to_string(),
    }
}

pub struct Middle {
    engine: Engine,
    store: PatternStore,
    song_mode: bool,
    loop_song: bool,
    chain: Vec<SlotId>, // may be empty while editing; plays as [A] then
    samples: Vec<SampleId>,
    last_step: Arc<AtomicUsize>,
    status: String,
}

impl Middle {
    pub fn new(engine: Engine, state: &ProjectState, samples: Vec<SampleId>) -> Self {
        let store = state.to_store();
        engine.set_store(store.clone());
        engine.set_settings(state.transport());

        // grouped by category, uncategorised last, listing order kept within a group
        let mut samples = samples;
        samples.sort_by_key(|id| category_of(id).unwrap_or(CATEGORIES.len()));

        let last_step = Arc::new(AtomicUsize::new(NO_STEP));
        let sink = last_step.clone();
        engine.set_on_step(move |step| sink.store(step, Ordering::Release));

        Self {
            engine,
            store,
            song_mode: state.song_mode,
            loop_song: state.loop_song,
            chain: state.song_chain.clone(),
            samples,
            last_step,
            status: String::new(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    pub fn chain(&self) -> SongChain {
        SongChain::new(self.chain.clone(), self.loop_song)
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    // Errors end up in the status line and the log, never back in the tui
    pub fn handle_input(&mut self, event: InputEvent) {
        if let Err(e) = self.apply(event) {
            log::warn!("{e}");
            self.status = e.to_string();
        }
    }

    pub fn apply(&mut self, event: InputEvent) -> Result<(), EngineError> {
        match event {
            InputEvent::ToggleStep { track, step } => {
                self.store.toggle_step(track, step);
                self.publish();
            }
            InputEvent::PlayPress => self.play_pause()?,
            InputEvent::ToggleMute(track) => {
                let muted = self.store.active_pattern().tracks[track].mute;
                self.patch_track(track, TrackPatch::mute(!muted));
            }
            InputEvent::AdjustVolume(track, delta) => {
                let volume = self.store.active_pattern().tracks[track].volume;
                self.patch_track(track, TrackPatch::volume(volume + delta));
            }
            InputEvent::AdjustProbability(track, delta) => {
                let p = self.store.active_pattern().tracks[track].probability;
                self.patch_track(track, TrackPatch::probability(p + delta));
            }
            InputEvent::AdjustTempo(delta) => {
                self.engine.set_bpm(self.engine.settings().tempo + delta);
            }
            InputEvent::AdjustSwing(delta) => {
                self.engine.set_swing(self.engine.settings().swing + delta);
            }
            InputEvent::AdjustHumanize(delta) => {
                self.engine.set_humanize(self.engine.settings().humanize + delta);
            }
            InputEvent::SelectSlot(slot) => self.select_slot(slot)?,
            InputEvent::ToggleSongMode => {
                self.song_mode = !self.song_mode;
                if self.engine.is_running() {
                    self.status = "song mode applies from the next start".into();
                }
            }
            InputEvent::ToggleLoop => self.loop_song = !self.loop_song,
            InputEvent::ChainAppend => self.chain.push(self.store.active_slot()),
            InputEvent::ChainClear => self.chain.clear(),
            InputEvent::CycleSample(track, dir) => self.cycle_sample(track, dir)?,
            InputEvent::ResetSlot => {
                self.store.reset_slot(self.store.active_slot());
                self.publish();
            }
            InputEvent::Quit => {}
        }
        Ok(())
    }

    fn publish(&self) {
        self.engine.set_store(self.store.clone());
    }

    fn patch_track(&mut self, track: usize, patch: TrackPatch) {
        self.store.set_track(track, &patch);
        self.publish();
    }

    fn song_playing(&self) -> bool {
        self.engine.is_running() && self.engine.song().is_some()
    }

    fn select_slot(&mut self, slot: SlotId) -> Result<(), EngineError> {
        if self.song_playing() {
            return Err(EngineError::SlotLockedBySong(slot));
        }
        self.store.set_active_slot(slot);
        self.publish();
        Ok(())
    }

    fn play_pause(&mut self) -> Result<(), EngineError> {
        if self.engine.is_running() {
            self.engine.stop(true);
            self.last_step.store(NO_STEP, Ordering::Release);
            return Ok(());
        }
        let song = self.song_mode.then(|| self.chain());
        self.engine.set_song(song);
        let preload: Vec<SampleId> = self
            .store
            .iter()
            .flat_map(|(_, pattern)| pattern.sample_ids())
            .collect();
        self.engine.start(&preload)?;
        self.status.clear();
        Ok(())
    }

    // Steps the track's sample through the categorised listing and plays it
    fn cycle_sample(&mut self, track: usize, dir: i32) -> Result<(), EngineError> {
        if self.samples.is_empty() {
            self.status = "no samples found".into();
            return Ok(());
        }
        let current = self.store.active_pattern().tracks[track].clone();
        let len = self.samples.len() as i64;
        let next = match current
            .sample_id
            .as_ref()
            .and_then(|id| self.samples.iter().position(|s| s == id))
        {
            Some(pos) => (pos as i64 + dir as i64).rem_euclid(len) as usize,
            None if dir < 0 => self.samples.len() - 1,
            None => 0,
        };
        let id = self.samples[next].clone();
        self.patch_track(track, TrackPatch::sample(Some(id.clone())));
        self.status = format!("track {} <- {id}", track + 1);
        self.engine.preview(&id, current.volume)
    }

    pub fn display_state(&self) -> DisplayState {
        let pattern = self.store.active_pattern();
        let mut grid = [[false; STEPS_PER_PATTERN]; NUM_TRACKS];
        for (t, row) in grid.iter_mut().enumerate() {
            for (s, cell) in row.iter_mut().enumerate() {
                *cell = pattern.is_set(t, s);
            }
        }
        let tracks = pattern
            .tracks
            .iter()
            .map(|t| TrackView {
                label: t.sample_id.as_ref().map(sample_label).unwrap_or_else(|| "--".into()),
                volume: t.volume,
                mute: t.mute,
                probability: t.probability,
            })
            .collect();

        let playing = self.engine.is_running();
        let step = self.last_step.load(Ordering::Acquire);
        let settings = self.engine.settings();
        DisplayState {
            grid,
            tracks,
            playing,
            playing_step: (playing && step != NO_STEP).then_some(step),
            active_slot: self.store.active_slot(),
            tempo: settings.tempo,
            swing: settings.swing,
            humanize: settings.humanize,
            song_mode: self.song_mode,
            loop_song: self.loop_song,
            chain: self.chain.clone(),
            status: self.status.clone(),
        }
    }

    pub fn to_project(&self) -> ProjectState {
        ProjectState::capture(&self.store, self.engine.settings(), self.song_mode, &self.chain())
    }

    pub fn dispose(self) {
        self.engine.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{OfflineOutput, SampleBuffer, StereoFrame};
    use crate::config::EngineConfig;
    use crate::error::LoadError;
    use crate::loader::{SampleCache, SampleSource};

    struct Blips;

    impl SampleSource for Blips {
        fn load(&self, _: &SampleId) -> Result<SampleBuffer, LoadError> {
            Ok(SampleBuffer::from_frames(vec![StereoFrame::mono(0.5); 32]))
        }
    }

    fn middle(state: &ProjectState) -> (Arc<OfflineOutput>, Middle) {
        let output = Arc::new(OfflineOutput::new(44100));
        let cache = Arc::new(SampleCache::new(Arc::new(Blips)));
        let engine = Engine::new(output.clone(), cache, EngineConfig::default());
        let samples = vec![SampleId::from("hat.wav"), SampleId::from("kick.wav")];
        (output, Middle::new(engine, state, samples))
    }

    #[test]
    fn edits_reach_the_engine() {
        let (_, mut m) = middle(&ProjectState::default());
        m.apply(InputEvent::ToggleStep { track: 2, step: 5 }).unwrap();
        m.apply(InputEvent::AdjustVolume(2, 0.5)).unwrap();
        m.apply(InputEvent::ToggleMute(3)).unwrap();

        let published = m.engine().store().active_pattern();
        assert!(published.is_set(2, 5));
        assert_eq!(published.tracks[2].volume, 1.0);
        assert!(published.tracks[3].mute);
        assert!(m.display_state().grid[2][5]);
    }

    #[test]
    fn transport_knobs_clamp() {
        let (_, mut m) = middle(&ProjectState::default());
        m.apply(InputEvent::AdjustTempo(500.0)).unwrap();
        m.apply(InputEvent::AdjustSwing(-1.0)).unwrap();
        m.apply(InputEvent::AdjustHumanize(0.25)).unwrap();
        let ds = m.display_state();
        assert_eq!((ds.tempo, ds.swing, ds.humanize), (240.0, 0.0, 0.25));
    }

    #[test]
    fn play_press_toggles_and_resets() {
        let (_, mut m) = middle(&ProjectState::default());
        m.apply(InputEvent::PlayPress).unwrap();
        assert!(m.display_state().playing);
        m.apply(InputEvent::PlayPress).unwrap();
        let ds = m.display_state();
        assert!(!ds.playing);
        assert_eq!(ds.playing_step, None);
        assert_eq!(m.engine().current_step(), 0);
    }

    #[test]
    fn slot_switch_is_refused_while_a_song_plays() {
        let (_, mut m) = middle(&ProjectState::default());
        m.apply(InputEvent::ToggleSongMode).unwrap();
        m.apply(InputEvent::PlayPress).unwrap();
        assert!(matches!(
            m.apply(InputEvent::SelectSlot(SlotId::C)),
            Err(EngineError::SlotLockedBySong(SlotId::C))
        ));
        m.handle_input(InputEvent::SelectSlot(SlotId::C));
        assert!(!m.status().is_empty());
        assert_eq!(m.store().active_slot(), SlotId::A);

        m.apply(InputEvent::PlayPress).unwrap();
        m.apply(InputEvent::SelectSlot(SlotId::C)).unwrap();
        assert_eq!(m.engine().active_slot(), SlotId::C);
    }

    #[test]
    fn chain_editing() {
        let (_, mut m) = middle(&ProjectState::default());
        m.apply(InputEvent::ChainClear).unwrap();
        m.apply(InputEvent::SelectSlot(SlotId::B)).unwrap();
        m.apply(InputEvent::ChainAppend).unwrap();
        m.apply(InputEvent::SelectSlot(SlotId::D)).unwrap();
        m.apply(InputEvent::ChainAppend).unwrap();
        m.apply(InputEvent::ToggleLoop).unwrap();
        assert_eq!(m.chain(), SongChain::new(vec![SlotId::B, SlotId::D], false));

        m.apply(InputEvent::ChainClear).unwrap();
        assert_eq!(m.chain().slots(), &[SlotId::A]);
    }

    #[test]
    fn cycling_samples_assigns_and_previews() {
        let (output, mut m) = middle(&ProjectState::default());
        m.apply(InputEvent::CycleSample(0, 1)).unwrap();
        m.apply(InputEvent::CycleSample(0, 1)).unwrap();
        m.apply(InputEvent::CycleSample(1, -1)).unwrap();

        let pattern = m.engine().store().active_pattern();
        assert_eq!(pattern.tracks[0].sample_id, Some(SampleId::from("kick.wav")));
        assert_eq!(pattern.tracks[1].sample_id, Some(SampleId::from("kick.wav")));
        assert_eq!(output.hits().len(), 3);
        assert_eq!(m.display_state().tracks[0].label, "kick.wav");
    }

    #[test]
    fn samples_cycle_in_category_order() {
        let output = Arc::new(OfflineOutput::new(44100));
        let cache = Arc::new(SampleCache::new(Arc::new(Blips)));
        let engine = Engine::new(output, cache, EngineConfig::default());
        let listing = [
            "Drill_02.wav",
            "Hat_open.wav",
            "Kick_808.wav",
            "Snare_1.wav",
            "Drill_Bass.wav",
            "zap.wav",
        ];
        let samples = listing.iter().copied().map(SampleId::from).collect();
        let mut m = Middle::new(engine, &ProjectState::default(), samples);

        let mut labels = Vec::new();
        for _ in 0..listing.len() {
            m.apply(InputEvent::CycleSample(0, 1)).unwrap();
            labels.push(m.display_state().tracks[0].label.clone());
        }
        assert_eq!(
            labels,
            vec![
                "Kicks/Kick_808.wav",
                "Kicks/Drill_Bass.wav",
                "Snares/Snare_1.wav",
                "Hats/Hat_open.wav",
                "Percs/Drill_02.wav",
                "zap.wav",
            ]
        );
        m.dispose();
    }

    #[test]
    fn reset_clears_only_the_active_slot() {
        let (_, mut m) = middle(&ProjectState::default());
        m.apply(InputEvent::ToggleStep { track: 0, step: 0 }).unwrap();
        m.apply(InputEvent::SelectSlot(SlotId::B)).unwrap();
        m.apply(InputEvent::ToggleStep { track: 0, step: 0 }).unwrap();
        m.apply(InputEvent::ResetSlot).unwrap();
        assert!(!m.store().pattern(SlotId::B).is_set(0, 0));
        assert!(m.store().pattern(SlotId::A).is_set(0, 0));
    }

    #[test]
    fn project_state_survives_a_session() {
        let mut state = ProjectState::default();
        state.tempo = 150.0;
        state.song_mode = true;
        state.song_chain = vec![SlotId::C, SlotId::A];
        let (_, mut m) = middle(&state);
        m.apply(InputEvent::ToggleStep { track: 7, step: 15 }).unwrap();

        let saved = m.to_project();
        assert_eq!(saved.tempo, 150.0);
        assert!(saved.song_mode);
        assert_eq!(saved.song_chain, vec![SlotId::C, SlotId::A]);
        assert!(saved.pattern(SlotId::A).is_set(7, 15));
        m.dispose();
    }
}
