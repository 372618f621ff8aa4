use std::sync::Arc;

use crate::audio::{SampleBuffer, SampleId};
use crate::audio_api::gain_to_db;
use crate::loader::SampleLookup;
use crate::pipeline::Pattern;

/// Uniform randomness for probability gates and humanize jitter. Tests swap
/// in fixed sequences, the engine uses a (optionally seeded) fastrand::Rng.
pub trait RandomSource: Send {
    /// Uniform in [0, 1).
    fn next_f64(&mut self) -> f64;
}

impl RandomSource for fastrand::Rng {
    fn next_f64(&mut self) -> f64 {
        self.f64()
    }
}

#[derive(Clone, Debug)]
pub struct Hit {
    pub track: usize,
    pub sample_id: SampleId,
    pub buffer: Arc<SampleBuffer>,
    pub time: f64,
    pub volume_db: f32,
}

// Decides which tracks sound on `step` and when. Pure apart from the random
// draws, and never waits on a sample that isn't loaded yet.
pub fn evaluate_step(
    step: usize,
    nominal_time: f64,
    pattern: &Pattern,
    samples: &dyn SampleLookup,
    humanize: f32,
    max_jitter: f64,
    rng: &mut dyn RandomSource,
) -> Vec<Hit> {
    let mut hits = Vec::new();
    for (index, track) in pattern.tracks.iter().enumerate() {
        if !pattern.is_set(index, step) || track.mute {
            continue;
        }
        let Some(sample_id) = track.sample_id.as_ref().filter(|id| !id.is_empty()) else {
            continue;
        };
        let Some(buffer) = samples.loaded(sample_id) else {
            continue;
        };

        // probability 1 always passes, 0 never does
        if rng.next_f64() >= track.probability as f64 {
            continue;
        }

        // hits may land late but never ahead of the grid
        let time = if humanize > 0.0 && max_jitter > 0.0 {
            let offset = (rng.next_f64() * 2.0 - 1.0) * humanize as f64 * max_jitter;
            nominal_time.max(nominal_time + offset)
        } else {
            nominal_time
        };

        hits.push(Hit {
            track: index,
            sample_id: sample_id.clone(),
            buffer,
            time,
            volume_db: gain_to_db(track.volume),
        });
    }
    hits
}
