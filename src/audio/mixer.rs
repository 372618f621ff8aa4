use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::audio_api::{AudioCommand, Trigger};

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use super::voice::Voice;

const MAX_VOICES: usize = 32; // hard cap so we wont malloc in audio callback
const MAX_PENDING: usize = 256;

struct PendingHit {
    start_frame: u64,
    trigger: Trigger,
}

// Render-side state. Lives inside the output callback and owns the frame
// counter that *is* the audio clock.
//
// Buffers the callback is done with go back over `retired` so the last Arc
// is never dropped (and the audio never freed) on the audio thread.
pub struct Mixer {
    sample_rate: f64,
    frames_rendered: u64,
    pending: Vec<PendingHit>,
    voices: Vec<Voice>,
    clock: Arc<AtomicU64>,   // frames rendered, read by the scheduler
    cutoff: Arc<AtomicU64>,  // lowest epoch still allowed to sound
    retired: Sender<Arc<SampleBuffer>>,
}

impl Mixer {
    pub fn new(
        sample_rate: u32,
        clock: Arc<AtomicU64>,
        cutoff: Arc<AtomicU64>,
        retired: Sender<Arc<SampleBuffer>>,
    ) -> Self {
        Self {
            sample_rate: sample_rate.max(1) as f64,
            frames_rendered: clock.load(Ordering::Acquire),
            pending: Vec::with_capacity(MAX_PENDING),
            voices: Vec::with_capacity(MAX_VOICES),
            clock,
            cutoff,
            retired,
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Schedule(trigger) => self.enqueue(trigger),
        }
    }

    // only falls back to dropping here when the channel is full
    fn retire(&self, buffer: Arc<SampleBuffer>) {
        let _ = self.retired.try_send(buffer);
    }

    fn enqueue(&mut self, trigger: Trigger) {
        if trigger.epoch < self.cutoff.load(Ordering::Acquire) || self.pending.len() >= MAX_PENDING {
            self.retire(trigger.buffer);
            return;
        }
        let start_frame = (trigger.at.max(0.0) * self.sample_rate).round() as u64;
        self.pending.push(PendingHit { start_frame, trigger });
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        for frame in out.iter_mut() {
            *frame = StereoFrame::zero();
        }
        let block_start = self.frames_rendered;
        let block_end = block_start + out.len() as u64;

        for voice in self.voices.iter_mut() {
            voice.render_into(out, 0);
        }
        // remove() keeps the oldest voice first, for stealing
        let mut i = 0;
        while i < self.voices.len() {
            if self.voices[i].active {
                i += 1;
            } else {
                let done = self.voices.remove(i);
                self.retire(done.into_buffer());
            }
        }

        let cutoff = self.cutoff.load(Ordering::Acquire);
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].trigger.epoch >= cutoff {
                i += 1;
            } else {
                let cancelled = self.pending.swap_remove(i);
                self.retire(cancelled.trigger.buffer);
            }
        }

        // start everything due inside this block, late hits start right away
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].start_frame < block_end {
                let due = self.pending.swap_remove(i);
                let offset = due.start_frame.saturating_sub(block_start) as usize;
                self.start_voice(due.trigger, offset, out);
            } else {
                i += 1;
            }
        }

        self.frames_rendered = block_end;
        self.clock.store(block_end, Ordering::Release);
    }

    fn start_voice(&mut self, trigger: Trigger, offset: usize, out: &mut [StereoFrame]) {
        let mut voice = Voice::new(trigger.buffer, trigger.gain);
        // the first partial block is rendered here, later blocks in the loop
        voice.render_into(out, offset);
        if !voice.active {
            self.retire(voice.into_buffer());
            return;
        }
        if self.voices.len() >= MAX_VOICES {
            let stolen = self.voices.remove(0); // steal the oldest
            self.retire(stolen.into_buffer());
        }
        self.voices.push(voice);
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn now(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate
    }
}
