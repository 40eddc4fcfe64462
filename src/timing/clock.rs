use std::time::{Duration, Instant};

/// Monotonic time source read once per frame.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Elapsed playback time measured from the moment playback started.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaybackClock {
    anchor: Option<Duration>,
}

impl PlaybackClock {
    /// Sets the zero point. Later calls are ignored.
    pub fn anchor(&mut self, now: Duration) {
        if self.anchor.is_none() {
            self.anchor = Some(now);
        }
    }

    pub fn elapsed(&self, now: Duration) -> Option<f64> {
        self.anchor
            .map(|anchor| now.saturating_sub(anchor).as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_measured_from_the_first_anchor() {
        let mut clock = PlaybackClock::default();
        assert_eq!(clock.elapsed(Duration::from_secs(3)), None);

        clock.anchor(Duration::from_millis(1500));
        clock.anchor(Duration::from_millis(9000));

        assert_eq!(clock.elapsed(Duration::from_millis(2000)), Some(0.5));
        assert_eq!(clock.elapsed(Duration::from_millis(1000)), Some(0.0));
    }
}
