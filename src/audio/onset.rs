use serde::{Deserialize, Serialize};

/// Finds note attacks in a mono waveform.
pub trait OnsetDetector: Send {
    /// Onset times in seconds, ascending. Empty when nothing is found.
    fn detect(&self, samples: &[f32], sample_rate: u32) -> Vec<f64>;
}

/// Onsets from rises in frame energy, picked the way librosa's
/// `onset_detect` picks peaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyOnsetDetector {
    pub frame_length: usize,
    pub hop_length: usize,
    /// Energies more than this many dB under the loudest frame are floored.
    pub top_db: f32,
    /// Peak picking windows, in seconds.
    pub pre_max: f64,
    pub post_max: f64,
    pub pre_avg: f64,
    pub post_avg: f64,
    pub wait: f64,
    /// How far above the local mean a peak must rise.
    pub delta: f32,
}

impl Default for EnergyOnsetDetector {
    fn default() -> Self {
        Self {
            frame_length: 2048,
            hop_length: 512,
            top_db: 80.0,
            pre_max: 0.03,
            post_max: 0.0,
            pre_avg: 0.1,
            post_avg: 0.1,
            wait: 0.03,
            delta: 0.07,
        }
    }
}

impl EnergyOnsetDetector {
    /// Positive energy flux per hop, normalized to `[0, 1]`.
    pub fn envelope(&self, samples: &[f32]) -> Vec<f32> {
        if samples.is_empty() || self.hop_length == 0 {
            return Vec::new();
        }

        let half = self.frame_length / 2;
        let frames = samples.len() / self.hop_length + 1;
        let mut energies: Vec<f32> = (0..frames)
            .map(|i| {
                let center = i * self.hop_length;
                let lo = center.saturating_sub(half);
                let hi = (center + half).min(samples.len());
                let power: f32 = samples[lo.min(hi)..hi].iter().map(|s| s * s).sum();
                let mean = power / self.frame_length.max(1) as f32;
                10.0 * (mean + 1e-10).log10()
            })
            .collect();

        let peak = energies.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let floor = peak - self.top_db;
        for energy in &mut energies {
            *energy = energy.max(floor);
        }

        // The first frame has nothing to rise from.
        let mut previous = energies[0];
        let mut flux: Vec<f32> = energies
            .iter()
            .map(|&energy| {
                let rise = (energy - previous).max(0.0);
                previous = energy;
                rise
            })
            .collect();

        let min = flux.iter().copied().fold(f32::INFINITY, f32::min);
        let max = flux.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let range = max - min;
        for value in &mut flux {
            *value = if range > f32::EPSILON {
                (*value - min) / range
            } else {
                0.0
            };
        }
        flux
    }

    fn peaks(&self, envelope: &[f32], frames_per_second: f64) -> Vec<usize> {
        let frames = |seconds: f64| (seconds * frames_per_second) as usize;
        let pre_max = frames(self.pre_max);
        let post_max = frames(self.post_max) + 1;
        let pre_avg = frames(self.pre_avg);
        let post_avg = frames(self.post_avg) + 1;
        let wait = frames(self.wait);

        let n = envelope.len();
        let mut peaks = Vec::new();
        let mut last: Option<usize> = None;

        for (i, &value) in envelope.iter().enumerate() {
            let local_max = envelope[i.saturating_sub(pre_max)..(i + post_max).min(n)]
                .iter()
                .copied()
                .fold(f32::NEG_INFINITY, f32::max);
            if value < local_max {
                continue;
            }

            let window = &envelope[i.saturating_sub(pre_avg)..(i + post_avg).min(n)];
            let mean = window.iter().sum::<f32>() / window.len() as f32;
            if value < mean + self.delta {
                continue;
            }

            if last.is_none_or(|last| i > last + wait) {
                peaks.push(i);
                last = Some(i);
            }
        }
        peaks
    }
}

impl OnsetDetector for EnergyOnsetDetector {
    fn detect(&self, samples: &[f32], sample_rate: u32) -> Vec<f64> {
        if sample_rate == 0 || self.hop_length == 0 {
            return Vec::new();
        }

        let frames_per_second = sample_rate as f64 / self.hop_length as f64;
        let envelope = self.envelope(samples);
        self.peaks(&envelope, frames_per_second)
            .into_iter()
            .map(|frame| frame as f64 / frames_per_second)
            .collect()
    }
}
