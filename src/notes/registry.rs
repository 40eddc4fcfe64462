use super::shapes::{NoteShape, NoteStart};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    Releasing,
    Finished,
}

/// Scope a note-off is matched within, besides its pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKey {
    Channel(u8),
    /// `None` when the note-off's track of origin is unknown; it then
    /// matches on pitch alone.
    Track(Option<usize>),
}

#[derive(Debug, Clone)]
pub struct ActiveNote<S> {
    pitch: u8,
    channel: u8,
    track: Option<usize>,
    start_time: f64,
    end_time: Option<f64>,
    state: Lifecycle,
    shape: S,
}

impl<S> ActiveNote<S> {
    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn track(&self) -> Option<usize> {
        self.track
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn shape(&self) -> &S {
        &self.shape
    }

    fn matches(&self, pitch: u8, key: MatchKey) -> bool {
        if self.state != Lifecycle::Active || self.pitch != pitch {
            return false;
        }
        match key {
            MatchKey::Channel(channel) => self.channel == channel,
            MatchKey::Track(Some(track)) => self.track == Some(track),
            MatchKey::Track(None) => true,
        }
    }
}

/// Owns every note that is sounding or fading, in insertion order.
#[derive(Debug)]
pub struct NoteRegistry<S> {
    notes: Vec<ActiveNote<S>>,
}

impl<S> Default for NoteRegistry<S> {
    fn default() -> Self {
        Self { notes: Vec::new() }
    }
}

impl<S: NoteShape> NoteRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new active note. Notes of the same pitch are never merged.
    pub fn begin(&mut self, start: NoteStart, shape: S) -> &ActiveNote<S> {
        self.notes.push(ActiveNote {
            pitch: start.pitch,
            channel: start.channel,
            track: start.track,
            start_time: start.at,
            end_time: None,
            state: Lifecycle::Active,
            shape,
        });
        &self.notes[self.notes.len() - 1]
    }

    /// Releases the oldest active note matching `pitch` within `key`.
    /// Returns `false`, touching nothing, when there is no such note.
    pub fn end(&mut self, pitch: u8, key: MatchKey, at: f64) -> bool {
        match self.notes.iter_mut().find(|n| n.matches(pitch, key)) {
            Some(note) => {
                note.state = Lifecycle::Releasing;
                note.end_time = Some(at);
                true
            }
            None => false,
        }
    }

    pub fn advance(&mut self, elapsed: f64) {
        for note in &mut self.notes {
            if note.state == Lifecycle::Finished {
                continue;
            }
            note.shape.update(elapsed, note.end_time);
            if note.state == Lifecycle::Releasing && note.shape.is_finished() {
                note.state = Lifecycle::Finished;
            }
        }
    }

    /// Drops finished notes. Call only once the frame that saw them
    /// finish has been presented.
    pub fn sweep(&mut self) -> usize {
        let before = self.notes.len();
        self.notes.retain(|n| n.state != Lifecycle::Finished);
        before - self.notes.len()
    }

    pub fn notes(&self) -> &[ActiveNote<S>] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
