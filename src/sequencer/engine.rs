use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use arc_swap::{ArcSwap, ArcSwapOption};

use crate::audio::SampleId;
use crate::audio_api::{gain_to_db, AudioOutput, ScheduledHit};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::loader::SampleCache;
use crate::pipeline::{BarOutcome, Pattern, PatternStore, SongArranger, SongChain};
use crate::shared::{clamp_unit, SlotId, STEPS_PER_PATTERN};

use super::transport::{Transport, TransportSettings};
use super::trigger::{evaluate_step, RandomSource};

type OnStep = Box<dyn Fn(usize) + Send + Sync>;

// Everything the scheduler thread reads while playing. The UI side writes,
// the scheduler only ever loads snapshots.
struct Shared {
    store: ArcSwap<PatternStore>,
    settings: ArcSwap<TransportSettings>,
    song: ArcSwapOption<SongChain>,
    on_step: ArcSwapOption<OnStep>,
    current_step: AtomicUsize,
    running: AtomicBool,
    epoch: AtomicU64, // bumped on every stop; hits from older epochs never sound
}

impl Shared {
    fn notify(&self, step: usize) {
        if let Some(cb) = self.on_step.load_full() {
            cb(step);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Pump {
    Continue,
    Finished,
}

// The part of playback that runs on the scheduling timeline. The thread loop
// just calls `pump` with the audio clock; tests call it with a hand-set clock.
pub(crate) struct Scheduler {
    shared: Arc<Shared>,
    output: Arc<dyn AudioOutput>,
    cache: Arc<SampleCache>,
    transport: Transport,
    arranger: Option<SongArranger>,
    rng: Box<dyn RandomSource>,
    epoch: u64,
    lookahead: f64,
    max_jitter: f64,
}

impl Scheduler {
    fn begin(&mut self, at: f64) {
        self.transport.apply(**self.shared.settings.load());
        self.transport.begin(at);
        if let Some(arranger) = self.arranger.as_mut() {
            let slot = arranger.start();
            log::info!("song mode: starting chain at slot {slot}");
        }
    }

    fn is_current(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
            && self.shared.epoch.load(Ordering::Acquire) == self.epoch
    }

    fn playing_pattern(&self) -> Arc<Pattern> {
        let store = self.shared.store.load();
        let slot = self
            .arranger
            .as_ref()
            .and_then(|a| a.current_slot())
            .unwrap_or_else(|| store.active_slot());
        store.pattern(slot)
    }

    /// Schedules every step due before `now + lookahead`.
    pub(crate) fn pump(&mut self, now: f64) -> Pump {
        let horizon = now + self.lookahead;
        loop {
            if !self.is_current() {
                return Pump::Finished;
            }
            // tempo/swing/humanize are re-read per step so edits land on the next one
            let settings = **self.shared.settings.load();
            self.transport.apply(settings);
            let Some(tick) = self.transport.next_due(horizon) else {
                return Pump::Continue;
            };

            let pattern = self.playing_pattern();
            let hits = evaluate_step(
                tick.step,
                tick.time,
                &pattern,
                &*self.cache,
                settings.humanize,
                self.max_jitter,
                &mut *self.rng,
            );
            for hit in hits {
                self.output.schedule(ScheduledHit {
                    sample_id: hit.sample_id,
                    buffer: hit.buffer,
                    at: hit.time,
                    volume_db: hit.volume_db,
                    epoch: self.epoch,
                });
            }

            let next = self.transport.current_step();
            self.shared.current_step.store(next, Ordering::Release);
            self.shared.notify(tick.step);

            if next == 0 {
                if let Some(arranger) = self.arranger.as_mut() {
                    if arranger.on_bar_end() == BarOutcome::Stop {
                        self.finish_song();
                        return Pump::Finished;
                    }
                }
            }
        }
    }

    // The chain ran out: playback stops at the bar line as if stop() was called
    fn finish_song(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.transport.reset();
        self.shared.current_step.store(0, Ordering::Release);
        self.shared.notify(0);
        log::info!("song finished, transport stopped");
    }
}

/// Step-sequencer playback engine. Explicitly owned: build one per session,
/// `dispose` it when done, build another later if needed.
pub struct Engine {
    output: Arc<dyn AudioOutput>,
    cache: Arc<SampleCache>,
    config: EngineConfig,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    rng_seed: Option<u64>,
}

impl Engine {
    pub fn new(output: Arc<dyn AudioOutput>, cache: Arc<SampleCache>, config: EngineConfig) -> Self {
        let shared = Arc::new(Shared {
            store: ArcSwap::from_pointee(PatternStore::default()),
            settings: ArcSwap::from_pointee(TransportSettings::default()),
            song: ArcSwapOption::empty(),
            on_step: ArcSwapOption::empty(),
            current_step: AtomicUsize::new(0),
            running: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        });
        Self {
            output,
            cache,
            config: config.sanitized(),
            shared,
            worker: None,
            rng_seed: None,
        }
    }

    /// Makes probability and humanize draws repeatable from the next start.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn cache(&self) -> &Arc<SampleCache> {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_on_step(&self, on_step: impl Fn(usize) + Send + Sync + 'static) {
        let cb: OnStep = Box::new(on_step);
        self.shared.on_step.store(Some(Arc::new(cb)));
    }

    /// Replaces the pattern in the active slot. Read at the next step.
    pub fn set_pattern(&self, pattern: Pattern) {
        let pattern = pattern.normalized();
        self.shared.store.rcu(|store| {
            let mut next = PatternStore::clone(store);
            next.set_pattern(next.active_slot(), pattern.clone());
            next
        });
    }

    /// Publishes a whole store snapshot (all slots plus the active one).
    pub fn set_store(&self, store: PatternStore) {
        self.shared.store.store(Arc::new(store));
    }

    pub fn store(&self) -> Arc<PatternStore> {
        self.shared.store.load_full()
    }

    /// Engages (or with `None` disengages) song mode from the next start.
    pub fn set_song(&self, chain: Option<SongChain>) {
        self.shared.song.store(chain.map(Arc::new));
    }

    pub fn song(&self) -> Option<SongChain> {
        self.shared.song.load_full().map(|c| SongChain::clone(&c))
    }

    pub fn set_bpm(&self, bpm: f32) {
        self.update_settings(|s| s.tempo = bpm);
    }

    pub fn set_swing(&self, amount: f32) {
        self.update_settings(|s| s.swing = clamp_unit(amount, s.swing));
    }

    pub fn set_humanize(&self, amount: f32) {
        self.update_settings(|s| s.humanize = clamp_unit(amount, s.humanize));
    }

    pub fn set_settings(&self, settings: TransportSettings) {
        self.shared.settings.store(Arc::new(settings.clamped()));
    }

    fn update_settings(&self, edit: impl Fn(&mut TransportSettings)) {
        self.shared.settings.rcu(|current| {
            let mut next = **current;
            edit(&mut next);
            next.clamped()
        });
    }

    pub fn settings(&self) -> TransportSettings {
        **self.shared.settings.load()
    }

    pub fn current_step(&self) -> usize {
        self.shared.current_step.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Slot the scheduler would read right now, without song mode in play.
    pub fn active_slot(&self) -> SlotId {
        self.shared.store.load().active_slot()
    }

    /// Resumes the output, preloads `preload` (failures only logged), then
    /// starts stepping from 0. On error the engine stays stopped.
    pub fn start(&mut self, preload: &[SampleId]) -> Result<(), EngineError> {
        self.halt();

        if let Err(e) = self.output.resume() {
            log::error!("could not start playback: {e}");
            return Err(e);
        }
        self.cache.preload(preload);

        let scheduler = self.build_scheduler();
        self.shared.current_step.store(0, Ordering::Release);
        self.shared.running.store(true, Ordering::Release);
        self.spawn(scheduler)?;
        log::info!("transport started at {} bpm", self.settings().tempo);
        Ok(())
    }

    pub(crate) fn build_scheduler(&self) -> Scheduler {
        let rng = match self.rng_seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let mut scheduler = Scheduler {
            shared: self.shared.clone(),
            output: self.output.clone(),
            cache: self.cache.clone(),
            transport: Transport::new(self.settings(), STEPS_PER_PATTERN),
            arranger: self.song().map(SongArranger::new),
            rng: Box::new(rng),
            epoch: self.shared.epoch.load(Ordering::Acquire),
            lookahead: self.config.lookahead_secs,
            max_jitter: self.config.max_jitter_secs,
        };
        scheduler.begin(self.output.now() + self.config.start_delay_secs);
        scheduler
    }

    fn spawn(&mut self, mut scheduler: Scheduler) -> Result<(), EngineError> {
        let output = self.output.clone();
        let poll = self.config.poll_interval();
        let handle = std::thread::Builder::new()
            .name("padloop-scheduler".into())
            .spawn(move || {
                while scheduler.pump(output.now()) == Pump::Continue {
                    std::thread::sleep(poll);
                }
            });
        self.adopt_worker(handle)
    }

    // A scheduler that never got a thread is a failed start: back to stopped
    fn adopt_worker(&mut self, handle: std::io::Result<JoinHandle<()>>) -> Result<(), EngineError> {
        match handle {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                log::error!("could not spawn scheduler thread: {e}");
                self.shared.running.store(false, Ordering::Release);
                self.shared.current_step.store(0, Ordering::Release);
                Err(EngineError::PlaybackStart(format!("scheduler thread: {e}")))
            }
        }
    }

    // Stops the scheduler and voids everything it already queued. Returns
    // only once the thread is gone, so no step callback can follow.
    fn halt(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        let epoch = self.shared.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        self.output.cancel_before(epoch);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("scheduler thread panicked");
            }
        }
    }

    pub fn stop(&mut self, reset_step: bool) {
        let was_running = self.is_running();
        self.halt();
        if reset_step {
            self.shared.current_step.store(0, Ordering::Release);
            self.shared.notify(0);
        }
        if was_running {
            log::info!("transport stopped");
        }
    }

    /// Plays one sample right away, outside the grid.
    pub fn preview(&self, id: &SampleId, volume: f32) -> Result<(), EngineError> {
        if id.is_empty() {
            return Ok(());
        }
        self.output.resume()?;
        let buffer = self.cache.ensure_loaded(id)?;
        self.output.schedule(ScheduledHit {
            sample_id: id.clone(),
            buffer,
            at: self.output.now(),
            volume_db: gain_to_db(clamp_unit(volume, 0.0)),
            epoch: self.shared.epoch.load(Ordering::Acquire),
        });
        Ok(())
    }

    /// Stops playback and lets go of every loaded sample.
    pub fn dispose(mut self) {
        self.stop(true);
        self.cache.clear();
        log::debug!("engine disposed");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.halt();
    }
}
