use crate::shared::{clamp_tempo, clamp_unit, DEFAULT_TEMPO, STEPS_PER_BEAT};

/// The knobs the UI turns while the transport runs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransportSettings {
    pub tempo: f32,    // bpm
    pub swing: f32,    // 0.0 to 1.0, fraction of a step odd steps are pushed late
    pub humanize: f32, // 0.0 to 1.0, scales the random per-hit delay
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            tempo: DEFAULT_TEMPO,
            swing: 0.0,
            humanize: 0.0,
        }
    }
}

impl TransportSettings {
    pub fn clamped(self) -> Self {
        Self {
            tempo: clamp_tempo(self.tempo),
            swing: clamp_unit(self.swing, 0.0),
            humanize: clamp_unit(self.humanize, 0.0),
        }
    }

    /// Seconds per 16th note.
    pub fn step_interval(&self) -> f64 {
        60.0 / clamp_tempo(self.tempo) as f64 / STEPS_PER_BEAT as f64
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepTick {
    pub step: usize,
    /// Audio clock time the step sounds at, swing included.
    pub time: f64,
}

// Step counter on the audio clock. Knows nothing about threads: whoever
// drives it asks for the next step due before some horizon, one at a time.
//
// The grid position of a step is the previous grid position plus the interval
// at the moment the step is asked for, so a tempo change lands on the very
// next step that hasn't been handed out yet.
#[derive(Clone, Debug)]
pub struct Transport {
    settings: TransportSettings,
    step_count: usize,
    current_step: usize,
    start_time: f64,
    last_grid_time: Option<f64>,
}

impl Transport {
    pub fn new(settings: TransportSettings, step_count: usize) -> Self {
        Self {
            settings: settings.clamped(),
            step_count: step_count.max(1),
            current_step: 0,
            start_time: 0.0,
            last_grid_time: None,
        }
    }

    pub fn settings(&self) -> TransportSettings {
        self.settings
    }

    pub fn apply(&mut self, settings: TransportSettings) {
        self.settings = settings.clamped();
    }

    pub fn set_tempo(&mut self, bpm: f32) {
        self.settings.tempo = clamp_tempo(bpm);
    }

    /// Index of the step that will be handed out next.
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Step 0 will sound at `at`.
    pub fn begin(&mut self, at: f64) {
        self.current_step = 0;
        self.start_time = at;
        self.last_grid_time = None;
    }

    pub fn reset(&mut self) {
        self.current_step = 0;
        self.last_grid_time = None;
    }

    fn next_grid_time(&self) -> f64 {
        match self.last_grid_time {
            Some(t) => t + self.settings.step_interval(),
            None => self.start_time,
        }
    }

    /// When the next step will sound, if nothing changes before it's due.
    pub fn peek(&self) -> StepTick {
        let step = self.current_step;
        let grid = self.next_grid_time();
        let swing = if step % 2 == 1 {
            self.settings.swing as f64 * self.settings.step_interval()
        } else {
            0.0
        };
        StepTick { step, time: grid + swing }
    }

    /// Hands out the next step if it sounds before `horizon`, and advances.
    pub fn next_due(&mut self, horizon: f64) -> Option<StepTick> {
        let tick = self.peek();
        if tick.time >= horizon {
            return None;
        }
        self.last_grid_time = Some(self.next_grid_time());
        self.current_step = (tick.step + 1) % self.step_count;
        Some(tick)
    }
}
