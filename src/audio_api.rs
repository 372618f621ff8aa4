use std::sync::Arc;

pub use crate::audio::{SampleBuffer, SampleId};
use crate::error::EngineError;

// Below this a gain is treated as the quietest audible level
const MIN_GAIN: f32 = 0.0001;

// The engine speaks decibels to the output, like a mixer fader
pub fn gain_to_db(gain: f32) -> f32 {
    if !(gain > 0.0) {
        return f32::NEG_INFINITY;
    }
    20.0 * gain.max(MIN_GAIN).log10()
}

pub fn db_to_gain(db: f32) -> f32 {
    if db == f32::NEG_INFINITY {
        return 0.0;
    }
    10f32.powf(db / 20.0)
}

/// A sample hit pinned to a position on the output's audio clock.
#[derive(Clone, Debug)]
pub struct ScheduledHit {
    pub sample_id: SampleId,
    pub buffer: Arc<SampleBuffer>,
    /// Audio clock time in seconds.
    pub at: f64,
    pub volume_db: f32,
    /// Hits from an epoch older than the output's cutoff never sound.
    pub epoch: u64,
}

/// Render-side form of a hit: just what the callback needs, with the gain
/// already converted so nothing is computed or freed on the audio thread.
#[derive(Clone, Debug)]
pub struct Trigger {
    pub buffer: Arc<SampleBuffer>,
    pub at: f64,
    pub gain: f32,
    pub epoch: u64,
}

impl From<ScheduledHit> for Trigger {
    fn from(hit: ScheduledHit) -> Self {
        Self {
            buffer: hit.buffer,
            at: hit.at,
            gain: db_to_gain(hit.volume_db),
            epoch: hit.epoch,
        }
    }
}

#[derive(Clone, Debug)]
pub enum AudioCommand {
    // The render side can't touch the cache or the disk, so a hit carries
    // its decoded buffer along with it
    Schedule(Trigger),
}

/// What the engine needs from an audio backend: a monotonic clock that
/// advances with rendered audio, and a way to start samples against it.
pub trait AudioOutput: Send + Sync {
    /// Make sure the device is producing audio. Fails when it refuses.
    fn resume(&self) -> Result<(), EngineError>;

    /// Current audio clock in seconds.
    fn now(&self) -> f64;

    fn sample_rate(&self) -> u32;

    fn schedule(&self, hit: ScheduledHit);

    /// Drop every hit tagged with an epoch below `epoch`, including ones still
    /// queued. Takes effect before this call returns.
    fn cancel_before(&self, epoch: u64);
}
