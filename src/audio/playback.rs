use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{info, warn};

use super::AudioTrack;
use crate::error::PlaybackError;

/// Plays a rendered track on the default output device until dropped.
pub struct AudioOutput {
    _stream: cpal::Stream,
}

impl AudioOutput {
    pub fn start(track: &AudioTrack) -> Result<Self, PlaybackError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(PlaybackError::NoDevice)?;
        let config: cpal::StreamConfig = device.default_output_config()?.into();

        info!(
            "Audio output: {} channels, {} Hz",
            config.channels, config.sample_rate
        );

        let mut cursor = PlaybackCursor::new(
            track.clone(),
            config.channels as usize,
            config.sample_rate,
        );

        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| cursor.fill(data),
            |err| warn!("Audio output error: {}", err),
            None,
        )?;
        stream.play()?;

        Ok(Self { _stream: stream })
    }
}

/// Read position into a track, stepping at the ratio between the track's
/// rate and the device's.
struct PlaybackCursor {
    track: AudioTrack,
    channels: usize,
    position: f64,
    step: f64,
}

impl PlaybackCursor {
    fn new(track: AudioTrack, channels: usize, output_rate: u32) -> Self {
        let step = if output_rate == 0 {
            1.0
        } else {
            track.sample_rate() as f64 / output_rate as f64
        };
        Self {
            track,
            channels: channels.max(1),
            position: 0.0,
            step,
        }
    }

    fn fill(&mut self, data: &mut [f32]) {
        for frame in data.chunks_mut(self.channels) {
            let index = self.position as usize;
            for (channel, sample) in frame.iter_mut().enumerate() {
                *sample = self.track.sample(index, channel);
            }
            self.position += self.step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_mono_into_every_output_channel() {
        let track = AudioTrack::new(vec![0.1, 0.2, 0.3], 1, 48_000);
        let mut cursor = PlaybackCursor::new(track, 2, 48_000);

        let mut out = [0.0; 8];
        cursor.fill(&mut out);
        assert_eq!(out, [0.1, 0.1, 0.2, 0.2, 0.3, 0.3, 0.0, 0.0]);
    }

    #[test]
    fn steps_through_the_track_at_the_rate_ratio() {
        let track = AudioTrack::new(vec![0.0, 1.0, 2.0, 3.0], 1, 24_000);
        let mut cursor = PlaybackCursor::new(track, 1, 48_000);

        let mut out = [0.0; 6];
        cursor.fill(&mut out);
        assert_eq!(out, [0.0, 0.0, 1.0, 1.0, 2.0, 2.0]);
    }
}
