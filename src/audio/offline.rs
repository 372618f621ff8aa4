// An output with no device behind it. The clock only moves when told to and
// every hit is recorded, so scheduling can be checked without a sound card.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::audio_api::{AudioOutput, ScheduledHit};
use crate::error::EngineError;

#[derive(Default)]
pub struct OfflineOutput {
    sample_rate: u32,
    now_bits: AtomicU64,
    cutoff: AtomicU64,
    refuse_resume: AtomicBool,
    hits: Mutex<Vec<ScheduledHit>>,
}

impl OfflineOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            now_bits: AtomicU64::new(0f64.to_bits()),
            ..Self::default()
        }
    }

    pub fn set_now(&self, secs: f64) {
        self.now_bits.store(secs.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, secs: f64) {
        self.set_now(self.now() + secs);
    }

    /// Make the next `resume` calls fail, as a device that won't start would.
    pub fn set_refuse_resume(&self, refuse: bool) {
        self.refuse_resume.store(refuse, Ordering::Release);
    }

    /// Hits that would still sound: anything cancelled by `cancel_before` is gone.
    pub fn hits(&self) -> Vec<ScheduledHit> {
        let cutoff = self.cutoff.load(Ordering::Acquire);
        self.hits
            .lock()
            .map(|h| h.iter().filter(|hit| hit.epoch >= cutoff).cloned().collect())
            .unwrap_or_default()
    }
}

impl AudioOutput for OfflineOutput {
    fn resume(&self) -> Result<(), EngineError> {
        if self.refuse_resume.load(Ordering::Acquire) {
            return Err(EngineError::PlaybackStart("offline output refused to resume".into()));
        }
        Ok(())
    }

    fn now(&self) -> f64 {
        f64::from_bits(self.now_bits.load(Ordering::Acquire))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn schedule(&self, hit: ScheduledHit) {
        if hit.epoch < self.cutoff.load(Ordering::Acquire) {
            return;
        }
        if let Ok(mut h) = self.hits.lock() {
            h.push(hit);
        }
    }

    fn cancel_before(&self, epoch: u64) {
        self.cutoff.fetch_max(epoch, Ordering::AcqRel);
    }
}
