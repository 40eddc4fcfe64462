use crate::events::TimelineEvent;

/// Walks a timeline in order, handing out every event whose effective
/// time has been reached.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    events: Vec<TimelineEvent>,
    cursor: usize,
    offset: f64,
}

impl Dispatcher {
    pub fn new(events: Vec<TimelineEvent>) -> Self {
        Self {
            events,
            cursor: 0,
            offset: 0.0,
        }
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub(crate) fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    /// Dispatches all events due at `elapsed`, oldest first, and returns
    /// how many were dispatched. The cursor never moves backwards.
    pub fn drain<F>(&mut self, elapsed: f64, mut sink: F) -> usize
    where
        F: FnMut(&TimelineEvent),
    {
        let start = self.cursor;
        while let Some(event) = self.events.get(self.cursor) {
            if event.time + self.offset > elapsed {
                break;
            }
            sink(event);
            self.cursor += 1;
        }
        self.cursor - start
    }

    pub fn remaining(&self) -> usize {
        self.events.len() - self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.events.len()
    }
}
