use std::sync::Arc;

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;

// One playing sample. Plain one-shot playback at a fixed gain, the buffer is
// shared with the sample cache so starting a voice never allocates audio data.
#[derive(Clone, Debug)]
pub struct Voice {
    buffer: Arc<SampleBuffer>,
    pos: usize,
    gain: f32,
    pub active: bool,
}

impl Voice {
    pub fn new(buffer: Arc<SampleBuffer>, gain: f32) -> Self {
        let active = !buffer.is_empty() && gain > 0.0;
        Self { buffer, pos: 0, gain, active }
    }

    pub fn into_buffer(self) -> Arc<SampleBuffer> {
        self.buffer
    }

    // Mixes into `out` starting `offset` frames into the block
    pub fn render_into(&mut self, out: &mut [StereoFrame], offset: usize) {
        if !self.active {
            return;
        }
        let data = &self.buffer.data;
        for frame in out.iter_mut().skip(offset) {
            let Some(sample) = data.get(self.pos) else {
                self.active = false;
                break;
            };
            frame.left += sample.left * self.gain;
            frame.right += sample.right * self.gain;
            self.pos += 1;
        }
        if self.pos >= data.len() {
            self.active = false;
        }
    }
}
