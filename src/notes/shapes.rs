use serde::{Deserialize, Serialize};

/// Growth of a held bloom, in `log10(size)` units per second (0.2 per
/// frame at 60 fps).
const GROWTH_PER_SECOND: f32 = 12.0;
/// Opacity lost per second after release.
const FADE_PER_SECOND: f32 = 50.0 / 255.0;
const REFERENCE_FRAME_RATE: f32 = 60.0;

/// What a note looks like over its lifetime. The registry drives notes
/// only through this interface.
pub trait NoteShape {
    /// Recomputes the shape for `elapsed` seconds of playback.
    /// `released_at` is set once the note has received its note-off.
    fn update(&mut self, elapsed: f64, released_at: Option<f64>);
    fn is_finished(&self) -> bool;
    /// Size in reference pixels (1080 rows).
    fn magnitude(&self) -> f32;
    /// 0.0 (invisible) to 1.0.
    fn opacity(&self) -> f32;
}

impl<S: NoteShape + ?Sized> NoteShape for Box<S> {
    fn update(&mut self, elapsed: f64, released_at: Option<f64>) {
        (**self).update(elapsed, released_at)
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }

    fn magnitude(&self) -> f32 {
        (**self).magnitude()
    }

    fn opacity(&self) -> f32 {
        (**self).opacity()
    }
}

/// Everything known about a note at the moment it starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteStart {
    pub pitch: u8,
    pub velocity: u8,
    pub channel: u8,
    pub track: Option<usize>,
    pub at: f64,
}

pub trait ShapeFactory {
    type Shape: NoteShape;

    fn spawn(&self, start: &NoteStart) -> Self::Shape;
}

/// A circle that swells while held, then shrinks and fades out.
#[derive(Debug, Clone)]
pub struct Bloom {
    size: f32,
    opacity: f32,
    shrink: f32,
    last_update: f64,
    release_size: Option<f32>,
    finished: bool,
}

impl Bloom {
    pub fn new(size: f32, started_at: f64, circle_scale: f32) -> Self {
        Self {
            size,
            opacity: 1.0,
            shrink: circle_scale * 5.0 * REFERENCE_FRAME_RATE,
            last_update: started_at,
            release_size: None,
            finished: false,
        }
    }
}

impl NoteShape for Bloom {
    fn update(&mut self, elapsed: f64, released_at: Option<f64>) {
        if self.finished {
            return;
        }

        match released_at {
            None => {
                let dt = (elapsed - self.last_update).max(0.0) as f32;
                self.size += self.size.max(1.0).log10() * GROWTH_PER_SECOND * dt;
            }
            Some(end) => {
                let base = *self.release_size.get_or_insert(self.size);
                let t = (elapsed - end).max(0.0) as f32;
                self.size = (base - 0.5 * self.shrink * t * t).max(0.0);
                self.opacity = (1.0 - FADE_PER_SECOND * t).max(0.0);

                if self.size <= 0.0 || self.opacity <= 0.0 {
                    self.size = 0.0;
                    self.opacity = 0.0;
                    self.finished = true;
                }
            }
        }

        self.last_update = elapsed;
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn magnitude(&self) -> f32 {
        self.size
    }

    fn opacity(&self) -> f32 {
        self.opacity
    }
}

/// A fixed-size dot that disappears the moment its note ends.
#[derive(Debug, Clone)]
pub struct Pulse {
    size: f32,
    finished: bool,
}

impl Pulse {
    pub fn new(size: f32) -> Self {
        Self {
            size,
            finished: false,
        }
    }
}

impl NoteShape for Pulse {
    fn update(&mut self, _elapsed: f64, released_at: Option<f64>) {
        if released_at.is_some() {
            self.finished = true;
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn magnitude(&self) -> f32 {
        if self.finished { 0.0 } else { self.size }
    }

    fn opacity(&self) -> f32 {
        if self.finished { 0.0 } else { 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    /// Bloom sized linearly by pitch, low notes largest.
    PitchBloom,
    /// Bloom sized along a sigmoid of pitch.
    SigmoidBloom,
    /// Pulse sized by velocity.
    VelocityPulse,
}

#[derive(Debug, Clone, Copy)]
pub struct ShapeStyle {
    pub kind: ShapeKind,
    pub min_note: u8,
    pub max_note: u8,
    pub circle_scale: f32,
}

impl ShapeFactory for ShapeStyle {
    type Shape = Box<dyn NoteShape + Send>;

    fn spawn(&self, start: &NoteStart) -> Self::Shape {
        let (lo, hi) = (self.min_note as f32, self.max_note as f32);
        let pitch = start.pitch as f32;

        match self.kind {
            ShapeKind::PitchBloom => Box::new(Bloom::new(
                remap(pitch, lo, hi, 50.0, 5.0) * self.circle_scale,
                start.at,
                self.circle_scale,
            )),
            ShapeKind::SigmoidBloom => Box::new(Bloom::new(
                sigmoid_remap(pitch, lo, hi, self.circle_scale * 50.0, 10.0),
                start.at,
                self.circle_scale,
            )),
            ShapeKind::VelocityPulse => Box::new(Pulse::new(remap(
                start.velocity as f32,
                0.0,
                127.0,
                10.0,
                50.0,
            ))),
        }
    }
}

pub fn remap(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    let span = in_max - in_min;
    if span == 0.0 {
        return out_min;
    }
    out_min + (value - in_min) / span * (out_max - out_min)
}

/// Like [`remap`] but eased through a logistic curve centred on the
/// middle of the input range.
pub fn sigmoid_remap(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    let normalized = remap(value, in_min, in_max, 0.0, 1.0);
    let sigmoid = 1.0 / (1.0 + (-(normalized - 0.5) * 10.0).exp());
    out_min + sigmoid * (out_max - out_min)
}
