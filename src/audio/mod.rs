mod offset;
mod onset;
mod playback;
mod render;

use std::path::Path;
use std::sync::Arc;

pub use offset::{RenderFailurePolicy, Resolved, compute_offset, resolve};
pub use onset::{EnergyOnsetDetector, OnsetDetector};
pub use playback::AudioOutput;
pub use render::{AudioRenderer, CommandRenderer};

/// Decoded audio, interleaved.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    samples: Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
}

impl AudioTrack {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            channels: channels.max(1),
            sample_rate,
        }
    }

    pub fn open(path: &Path) -> Result<Self, hound::Error> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();

        let samples = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(Self::new(samples, spec.channels, spec.sample_rate))
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Sample at `frame` for output `channel`; channels beyond the source
    /// reuse its last channel, frames past the end are silent.
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        if frame >= self.frames() {
            return 0.0;
        }
        let channels = self.channels as usize;
        self.samples[frame * channels + channel.min(channels - 1)]
    }

    pub fn mono(&self) -> Vec<f32> {
        let channels = self.channels as usize;
        self.samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_averages_channels() {
        let track = AudioTrack::new(vec![1.0, 0.0, 0.5, 0.5], 2, 44_100);
        assert_eq!(track.mono(), vec![0.5, 0.5]);
        assert_eq!(track.frames(), 2);
    }

    #[test]
    fn extra_output_channels_reuse_the_last_source_channel() {
        let track = AudioTrack::new(vec![0.25, 0.75], 1, 8_000);
        assert_eq!(track.sample(0, 0), 0.25);
        assert_eq!(track.sample(0, 1), 0.25);
        assert_eq!(track.sample(1, 1), 0.75);
        assert_eq!(track.sample(2, 0), 0.0);
    }

    #[test]
    fn decodes_integer_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(i16::MAX).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.finalize().unwrap();

        let track = AudioTrack::open(&path).unwrap();
        assert_eq!(track.sample_rate(), 8_000);
        assert_eq!(track.frames(), 2);
        assert!((track.sample(0, 0) - 1.0).abs() < 1e-3);
        assert_eq!(track.duration(), 2.0 / 8_000.0);
    }
}
