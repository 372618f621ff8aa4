use std::io::Read;

use super::frame::StereoFrame;

#[derive(Clone, Debug, Default)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>, // decoded audio at the output rate
}

impl SampleBuffer {
    pub fn from_frames(data: Vec<StereoFrame>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn read_wav<R: Read>(source: R, target_rate: u32) -> anyhow::Result<Self> {
        let reader = hound::WavReader::new(source)?;
        Self::decode_wav(reader, target_rate)
    }

    fn decode_wav<R: Read>(mut reader: hound::WavReader<R>, target_rate: u32) -> anyhow::Result<Self> {
        let spec = reader.spec();
        let file_rate = spec.sample_rate;
        let file_channels = spec.channels as usize;
        if file_channels == 0 {
            anyhow::bail!("wav file declares zero channels");
        }

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader // float, just pass it through
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => { // int, convert to float
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        // mono is duplicated, anything past two channels is dropped
        let mut frames: Vec<StereoFrame> = samples
            .chunks_exact(file_channels)
            .map(|c| StereoFrame {
                left: c[0],
                right: if file_channels > 1 { c[1] } else { c[0] },
            })
            .collect();

        if file_rate != target_rate {
            frames = resample_linear(&frames, file_rate, target_rate);
        }

        Ok(Self { data: frames })
    }
}

fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    if source_rate == target_rate || source_rate == 0 {
        return frames.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (frames.len() as f64 * ratio).ceil() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos.floor() as usize;
        let frac = (src_pos - idx as f64) as f32;
        if idx >= frames.len().saturating_sub(1) {
            out.push(*frames.last().unwrap_or(&StereoFrame::zero()));
        } else {
            let a = frames[idx];
            let b = frames[idx + 1];
            out.push(StereoFrame {
                left: a.left * (1.0 - frac) + b.left * frac,
                right: a.right * (1.0 - frac) + b.right * frac,
            });
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    // Writes a 16-bit wav into memory
    pub(crate) fn wav_bytes(channels: u16, rate: u32, samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn mono_is_duplicated_to_both_sides() {
        let bytes = wav_bytes(1, 44100, &[0, 16384, -16384]);
        let buf = SampleBuffer::read_wav(Cursor::new(bytes), 44100).unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.data[1], StereoFrame::mono(0.5));
        assert_eq!(buf.data[2], StereoFrame::mono(-0.5));
    }

    #[test]
    fn stereo_keeps_channels_apart() {
        let bytes = wav_bytes(2, 44100, &[16384, -16384]);
        let buf = SampleBuffer::read_wav(Cursor::new(bytes), 44100).unwrap();
        assert_eq!(buf.data, vec![StereoFrame { left: 0.5, right: -0.5 }]);
    }

    #[test]
    fn resampling_scales_length() {
        let bytes = wav_bytes(1, 22050, &[0; 100]);
        let buf = SampleBuffer::read_wav(Cursor::new(bytes), 44100).unwrap();
        assert_eq!(buf.len(), 200);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(SampleBuffer::read_wav(Cursor::new(b"not a wav".to_vec()), 44100).is_err());
    }
}
