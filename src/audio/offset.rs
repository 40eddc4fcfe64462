use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{AudioRenderer, AudioTrack, OnsetDetector};
use crate::error::AudioRenderError;

/// What to do when the score cannot be rendered to audio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderFailurePolicy {
    /// The session fails and can only be quit.
    #[default]
    Abort,
    /// Play the visuals without audio, using an offset of zero.
    ZeroOffset,
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub audio: Option<AudioTrack>,
    /// Seconds to add to every timeline event before comparing it with
    /// elapsed playback time.
    pub offset: f64,
    pub audio_onset: f64,
    pub midi_onset: f64,
    /// Why the session runs without audio, if it does.
    pub degraded: Option<String>,
}

pub fn compute_offset(audio_onset: f64, midi_onset: f64) -> f64 {
    audio_onset - midi_onset
}

/// Renders `midi_path`, finds the first onset in the result and aligns it
/// with `midi_onset`, the time of the first note-on in the timeline.
pub fn resolve(
    renderer: &dyn AudioRenderer,
    detector: &dyn OnsetDetector,
    midi_path: &Path,
    midi_onset: f64,
    policy: RenderFailurePolicy,
) -> Result<Resolved, AudioRenderError> {
    info!("Converting MIDI to audio...");
    let rendered = renderer
        .render(midi_path)
        .and_then(|wav| Ok(AudioTrack::open(&wav)?));

    let audio = match (rendered, policy) {
        (Ok(audio), _) => audio,
        (Err(err), RenderFailurePolicy::Abort) => return Err(err),
        (Err(err), RenderFailurePolicy::ZeroOffset) => {
            warn!("Continuing without audio: {}", err);
            return Ok(Resolved {
                audio: None,
                offset: 0.0,
                audio_onset: 0.0,
                midi_onset,
                degraded: Some(err.to_string()),
            });
        }
    };

    info!("Calculating audio/MIDI offset...");
    let onsets = detector.detect(&audio.mono(), audio.sample_rate());
    let audio_onset = onsets.first().copied().unwrap_or(0.0);
    let offset = compute_offset(audio_onset, midi_onset);
    info!("Audio/MIDI offset: {:.3}s", offset);

    Ok(Resolved {
        audio: Some(audio),
        offset,
        audio_onset,
        midi_onset,
        degraded: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct WavFixture(PathBuf);

    impl AudioRenderer for WavFixture {
        fn render(&self, _midi: &Path) -> Result<PathBuf, AudioRenderError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl AudioRenderer for Broken {
        fn render(&self, midi: &Path) -> Result<PathBuf, AudioRenderError> {
            Err(AudioRenderError::MissingOutput(midi.with_extension("wav")))
        }
    }

    struct FixedOnsets(Vec<f64>);

    impl OnsetDetector for FixedOnsets {
        fn detect(&self, _samples: &[f32], _sample_rate: u32) -> Vec<f64> {
            self.0.clone()
        }
    }

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..800 {
            writer.write_sample(0.0f32).unwrap();
        }
        writer.finalize().unwrap();
        (dir, path)
    }

    #[test]
    fn offset_is_audio_onset_minus_midi_onset() {
        let (_dir, wav) = fixture();
        let resolved = resolve(
            &WavFixture(wav),
            &FixedOnsets(vec![0.5, 0.9]),
            Path::new("score.mid"),
            0.2,
            RenderFailurePolicy::Abort,
        )
        .unwrap();

        assert!((resolved.offset - 0.3).abs() < 1e-9);
        assert_eq!(resolved.audio_onset, 0.5);
        assert!(resolved.audio.is_some());
        assert!(resolved.degraded.is_none());
    }

    #[test]
    fn missing_onset_counts_as_zero() {
        let (_dir, wav) = fixture();
        let resolved = resolve(
            &WavFixture(wav),
            &FixedOnsets(vec![]),
            Path::new("score.mid"),
            1.25,
            RenderFailurePolicy::Abort,
        )
        .unwrap();

        assert_eq!(resolved.audio_onset, 0.0);
        assert_eq!(resolved.offset, -1.25);
    }

    #[test]
    fn render_failure_aborts_by_default() {
        let result = resolve(
            &Broken,
            &FixedOnsets(vec![0.5]),
            Path::new("score.mid"),
            0.0,
            RenderFailurePolicy::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn render_failure_can_degrade_to_zero_offset() {
        let resolved = resolve(
            &Broken,
            &FixedOnsets(vec![0.5]),
            Path::new("score.mid"),
            0.4,
            RenderFailurePolicy::ZeroOffset,
        )
        .unwrap();

        assert_eq!(resolved.offset, 0.0);
        assert!(resolved.audio.is_none());
        assert!(resolved.degraded.is_some());
    }

    #[test]
    fn undecodable_output_is_a_render_failure() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.wav");
        std::fs::write(&bogus, b"RIFF? no").unwrap();

        let err = resolve(
            &WavFixture(bogus),
            &FixedOnsets(vec![]),
            Path::new("score.mid"),
            0.0,
            RenderFailurePolicy::Abort,
        )
        .unwrap_err();
        assert!(matches!(err, AudioRenderError::Decode(_)));
    }
}
