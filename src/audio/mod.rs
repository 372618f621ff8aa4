use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::audio_api::{AudioCommand, AudioOutput, ScheduledHit, Trigger};
use crate::error::EngineError;

mod frame;
mod mixer;
pub mod offline;
mod sample_buffer;
mod sample_id;
mod voice;

pub use frame::StereoFrame;
pub use mixer::Mixer;
pub use offline::OfflineOutput;
pub use sample_buffer::SampleBuffer;
pub use sample_id::SampleId;
pub use voice::Voice;

#[cfg(test)]
pub(crate) use sample_buffer::tests::wav_bytes;

// Real output device. The stream is built once; `resume` plays it and the
// callback publishes the frame counter the engine schedules against.
pub struct CpalOutput {
    tx: Sender<AudioCommand>,
    clock: Arc<AtomicU64>,
    cutoff: Arc<AtomicU64>,
    sample_rate: u32,
    playing: AtomicBool,
    retired: Receiver<Arc<SampleBuffer>>, // buffers the callback let go of
    // cpal streams are not Sync on every host, so access goes through a lock
    stream: Mutex<cpal::Stream>,
}

pub fn start_audio() -> anyhow::Result<CpalOutput> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(1024);
    let (retire_tx, retired) = crossbeam_channel::bounded::<Arc<SampleBuffer>>(1024);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate = config.sample_rate();
    let channels = config.channels() as usize;

    let clock = Arc::new(AtomicU64::new(0));
    let cutoff = Arc::new(AtomicU64::new(0));

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let mixer = Mixer::new(sample_rate, clock.clone(), cutoff.clone(), retire_tx);
            let stream = build_output_stream_f32(&device, &config.into(), rx, mixer, channels)?;
            log::info!("audio output ready: {sample_rate} Hz, {channels} channels");
            Ok(CpalOutput {
                tx,
                clock,
                cutoff,
                sample_rate,
                playing: AtomicBool::new(false),
                retired,
                stream: Mutex::new(stream),
            })
        }
        _ => anyhow::bail!("unsupported sample format (only f32 supported for now)"),
    }
}

// ── Output stream ─────────────────────────────────────────────────

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    mut mixer: Mixer,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let err_fn = |err| log::error!("audio output stream error: {err}");

    // scratch stereo block, grown outside the hot path when the host asks for more
    let mut block: Vec<StereoFrame> = Vec::with_capacity(4096);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                mixer.handle_cmd(cmd);
            }

            let n_frames = data.len() / channels.max(1);
            block.resize(n_frames, StereoFrame::zero());
            mixer.render_block(&mut block);

            // fan the stereo block out to however many channels the device has
            for (out, frame) in data.chunks_exact_mut(channels.max(1)).zip(block.iter()) {
                match out.len() {
                    1 => out[0] = 0.5 * (frame.left + frame.right),
                    _ => {
                        out[0] = frame.left;
                        out[1] = frame.right;
                        for extra in out.iter_mut().skip(2) {
                            *extra = 0.0;
                        }
                    }
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

impl CpalOutput {
    // drops whatever the callback handed back, here rather than on the audio thread
    fn reclaim(&self) {
        self.retired.try_iter().for_each(drop);
    }
}

impl AudioOutput for CpalOutput {
    fn resume(&self) -> Result<(), EngineError> {
        if self.playing.load(Ordering::Acquire) {
            return Ok(());
        }
        let stream = self
            .stream
            .lock()
            .map_err(|_| EngineError::PlaybackStart("output stream lock poisoned".into()))?;
        stream
            .play()
            .map_err(|e| EngineError::PlaybackStart(e.to_string()))?;
        self.playing.store(true, Ordering::Release);
        Ok(())
    }

    fn now(&self) -> f64 {
        self.clock.load(Ordering::Acquire) as f64 / self.sample_rate.max(1) as f64
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn schedule(&self, hit: ScheduledHit) {
        self.reclaim();
        if self.tx.try_send(AudioCommand::Schedule(Trigger::from(hit))).is_err() {
            log::warn!("audio command queue full, dropping hit");
        }
    }

    fn cancel_before(&self, epoch: u64) {
        self.cutoff.fetch_max(epoch, Ordering::AcqRel);
        self.reclaim();
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        if let Ok(stream) = self.stream.lock() {
            let _ = stream.pause();
        }
    }
}
