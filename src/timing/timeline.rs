use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::score::{Score, ScoreTrack, TrackMessage};
use crate::error::MalformedTimelineError;
use crate::events::{MessageKind, NoteMessage, TimelineEvent};

/// Which field scopes note-off matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Partition {
    Channel,
    Track,
}

/// The absolute-time event stream a session plays back.
#[derive(Debug, Clone)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
    channel_count: usize,
    track_names: Vec<Option<String>>,
    partition: Partition,
}

impl Timeline {
    pub fn load(path: &Path, partition: Partition) -> Result<Self, MalformedTimelineError> {
        let bytes = fs::read(path).map_err(|source| MalformedTimelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loading {}", path.display());
        Self::from_bytes(&bytes, partition)
    }

    pub fn from_bytes(bytes: &[u8], partition: Partition) -> Result<Self, MalformedTimelineError> {
        let score = Score::parse(bytes)?;
        Self::build(&score, partition)
    }

    pub fn build(score: &Score, partition: Partition) -> Result<Self, MalformedTimelineError> {
        let mut origins = match partition {
            Partition::Track => Some(TrackIndex::new(&score.tracks)),
            Partition::Channel => None,
        };

        let mut events = Vec::new();
        let mut max_channel = 0u8;
        let mut time = 0.0;

        for (index, raw) in score.messages.iter().enumerate() {
            if !raw.delta.is_finite() || raw.delta < 0.0 {
                return Err(MalformedTimelineError::InvalidDelta {
                    index,
                    delta: raw.delta,
                });
            }
            time += raw.delta;

            let Some((channel, message)) = raw.kind.normalize() else {
                continue;
            };
            let track = origins
                .as_mut()
                .and_then(|origins| origins.claim(raw.tick, &raw.kind));

            max_channel = max_channel.max(channel);
            events.push(TimelineEvent {
                time,
                channel,
                track,
                message,
            });
        }

        let track_names: Vec<Option<String>> =
            score.tracks.iter().map(|t| t.name.clone()).collect();
        for (index, name) in track_names.iter().enumerate() {
            info!("Track {}: {}", index, name.as_deref().unwrap_or("<unnamed>"));
        }

        let channel_count = max_channel as usize + 1;
        info!(
            "Loaded {} events across {} channel(s)",
            events.len(),
            channel_count
        );

        Ok(Self {
            events,
            channel_count,
            track_names,
            partition,
        })
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<TimelineEvent> {
        self.events
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn track_count(&self) -> usize {
        self.track_names.len()
    }

    /// Declared track names, indexed like `TimelineEvent::track`.
    pub fn track_names(&self) -> &[Option<String>] {
        &self.track_names
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn first_note_on(&self) -> Option<f64> {
        self.events
            .iter()
            .find(|e| matches!(e.message, NoteMessage::NoteOn { .. }))
            .map(|e| e.time)
    }

    pub fn duration(&self) -> f64 {
        self.events.last().map_or(0.0, |e| e.time)
    }
}

/// Unmerged per-track message lists, consumed as merged messages are
/// matched back to the track they came from.
struct TrackIndex {
    tracks: Vec<Vec<Option<TrackMessage>>>,
    cursors: Vec<usize>,
}

impl TrackIndex {
    fn new(tracks: &[ScoreTrack]) -> Self {
        Self {
            tracks: tracks
                .iter()
                .map(|t| t.messages.iter().copied().map(Some).collect())
                .collect(),
            cursors: vec![0; tracks.len()],
        }
    }

    /// Takes the first unconsumed message identical to `kind` at `tick`,
    /// searching tracks in file order.
    fn claim(&mut self, tick: u64, kind: &MessageKind) -> Option<usize> {
        for (track, messages) in self.tracks.iter_mut().enumerate() {
            let cursor = &mut self.cursors[track];
            // Merged ticks never decrease, so anything earlier is unreachable.
            while *cursor < messages.len()
                && messages[*cursor].is_none_or(|m| m.tick < tick)
            {
                *cursor += 1;
            }

            let mut position = *cursor;
            while position < messages.len() {
                match messages[position] {
                    Some(m) if m.tick > tick => break,
                    Some(m) if m.kind == *kind => {
                        messages[position] = None;
                        return Some(track);
                    }
                    _ => position += 1,
                }
            }
        }

        debug!("No track of origin for {:?} at tick {}", kind, tick);
        None
    }
}
