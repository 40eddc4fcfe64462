use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use crate::error::MalformedTimelineError;
use crate::events::{MessageKind, RawMidiMessage};

/// Microseconds per quarter note until the file says otherwise (120 BPM).
const DEFAULT_TEMPO: f64 = 500_000.0;

/// A recognized message in its original, unmerged track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackMessage {
    pub tick: u64,
    pub kind: MessageKind,
}

#[derive(Debug, Clone, Default)]
pub struct ScoreTrack {
    pub name: Option<String>,
    pub messages: Vec<TrackMessage>,
}

/// A parsed MIDI file: every track merged onto one clock, plus the
/// per-track lists needed to recover where a merged message came from.
#[derive(Debug, Clone, Default)]
pub struct Score {
    pub messages: Vec<RawMidiMessage>,
    pub tracks: Vec<ScoreTrack>,
}

enum TickRate {
    Metrical { ppq: f64 },
    Timecode { seconds_per_tick: f64 },
}

enum Entry {
    Message(MessageKind),
    Tempo(u32),
}

struct Stamped {
    tick: u64,
    entry: Entry,
}

impl Score {
    pub fn parse(bytes: &[u8]) -> Result<Self, MalformedTimelineError> {
        let smf = Smf::parse(bytes)?;
        // Format 2 tracks are independent sequences with no shared clock.
        if smf.header.format == Format::Sequential {
            return Err(MalformedTimelineError::Sequential);
        }
        Ok(Self::from_smf(&smf))
    }

    pub fn from_smf(smf: &Smf<'_>) -> Self {
        let rate = match smf.header.timing {
            Timing::Metrical(ppq) => TickRate::Metrical {
                ppq: ppq.as_int().max(1) as f64,
            },
            Timing::Timecode(fps, subframes) => TickRate::Timecode {
                seconds_per_tick: 1.0 / (fps.as_f32() as f64 * subframes.max(1) as f64),
            },
        };

        let mut stamped = Vec::new();
        let mut tracks = Vec::with_capacity(smf.tracks.len());

        for track in &smf.tracks {
            let mut tick = 0u64;
            let mut score_track = ScoreTrack::default();

            for event in track {
                tick += event.delta.as_int() as u64;

                let entry = match event.kind {
                    TrackEventKind::Midi { channel, message } => {
                        Entry::Message(convert(channel.as_int(), message))
                    }
                    TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => Entry::Tempo(tempo.as_int()),
                    TrackEventKind::Meta(MetaMessage::TrackName(raw)) => {
                        if score_track.name.is_none() {
                            score_track.name = Some(String::from_utf8_lossy(raw).into_owned());
                        }
                        Entry::Message(MessageKind::Other)
                    }
                    _ => Entry::Message(MessageKind::Other),
                };

                if let Entry::Message(kind) = entry {
                    if kind.is_recognized() {
                        score_track.messages.push(TrackMessage { tick, kind });
                    }
                }
                stamped.push(Stamped { tick, entry });
            }

            tracks.push(score_track);
        }

        // Stable: equal ticks keep track order, then in-track order.
        stamped.sort_by_key(|s| s.tick);

        let mut tempo = DEFAULT_TEMPO;
        let mut previous = 0u64;
        let mut messages = Vec::with_capacity(stamped.len());

        for s in stamped {
            let ticks = (s.tick - previous) as f64;
            previous = s.tick;

            let delta = match rate {
                TickRate::Metrical { ppq } => ticks * tempo / 1_000_000.0 / ppq,
                TickRate::Timecode { seconds_per_tick } => ticks * seconds_per_tick,
            };

            let kind = match s.entry {
                Entry::Tempo(value) => {
                    tempo = value as f64;
                    MessageKind::Other
                }
                Entry::Message(kind) => kind,
            };

            messages.push(RawMidiMessage {
                delta,
                tick: s.tick,
                kind,
            });
        }

        Self { messages, tracks }
    }

    pub fn recognized_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.kind.is_recognized())
            .count()
    }
}

fn convert(channel: u8, message: MidiMessage) -> MessageKind {
    match message {
        MidiMessage::NoteOn { key, vel } => MessageKind::NoteOn {
            channel,
            pitch: key.as_int(),
            velocity: vel.as_int(),
        },
        MidiMessage::NoteOff { key, vel } => MessageKind::NoteOff {
            channel,
            pitch: key.as_int(),
            velocity: vel.as_int(),
        },
        MidiMessage::ProgramChange { program } => MessageKind::ProgramChange {
            channel,
            program: program.as_int(),
        },
        _ => MessageKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::{Format, Header, TrackEvent};

    fn note_on(delta: u32, channel: u8, key: u8, vel: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::NoteOn {
                    key: key.into(),
                    vel: vel.into(),
                },
            },
        }
    }

    fn tempo(delta: u32, micros: u32) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(micros.into())),
        }
    }

    fn smf(tracks: Vec<Vec<TrackEvent<'static>>>) -> Smf<'static> {
        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(480u16.into())));
        smf.tracks = tracks;
        smf
    }

    #[test]
    fn rejects_sequential_files() {
        let mut file = Smf::new(Header::new(Format::Sequential, Timing::Metrical(480u16.into())));
        file.tracks = vec![vec![note_on(0, 0, 60, 90)], vec![note_on(0, 0, 62, 90)]];
        let mut bytes = Vec::new();
        file.write_std(&mut bytes).unwrap();

        assert!(matches!(
            Score::parse(&bytes),
            Err(MalformedTimelineError::Sequential)
        ));
    }

    #[test]
    fn merges_tracks_onto_one_clock() {
        let score = Score::from_smf(&smf(vec![
            vec![note_on(0, 0, 60, 90), note_on(960, 0, 62, 90)],
            vec![note_on(480, 1, 40, 90)],
        ]));

        let ticks: Vec<u64> = score.messages.iter().map(|m| m.tick).collect();
        assert_eq!(ticks, vec![0, 480, 960]);

        let deltas: Vec<f64> = score.messages.iter().map(|m| m.delta).collect();
        assert_eq!(deltas, vec![0.0, 0.5, 0.5]);
    }

    #[test]
    fn equal_ticks_keep_track_order() {
        let score = Score::from_smf(&smf(vec![
            vec![note_on(100, 0, 60, 90)],
            vec![note_on(100, 1, 61, 90)],
        ]));

        let pitches: Vec<MessageKind> = score.messages.iter().map(|m| m.kind).collect();
        assert_eq!(
            pitches,
            vec![
                MessageKind::NoteOn {
                    channel: 0,
                    pitch: 60,
                    velocity: 90
                },
                MessageKind::NoteOn {
                    channel: 1,
                    pitch: 61,
                    velocity: 90
                },
            ]
        );
    }

    #[test]
    fn tempo_change_applies_after_its_own_delta() {
        // 480 ticks at 120 BPM, tempo switches to 60 BPM, then 480 more ticks.
        let score = Score::from_smf(&smf(vec![vec![
            tempo(480, 1_000_000),
            note_on(480, 0, 60, 90),
        ]]));

        let total: f64 = score.messages.iter().map(|m| m.delta).sum();
        assert!((total - 1.5).abs() < 1e-9);
        assert_eq!(score.recognized_count(), 1);
    }

    #[test]
    fn keeps_track_names_and_recognized_messages() {
        let score = Score::from_smf(&smf(vec![vec![
            TrackEvent {
                delta: 0u32.into(),
                kind: TrackEventKind::Meta(MetaMessage::TrackName(b"Piano")),
            },
            note_on(0, 0, 60, 90),
        ]]));

        assert_eq!(score.tracks[0].name.as_deref(), Some("Piano"));
        assert_eq!(score.tracks[0].messages.len(), 1);
        assert_eq!(score.messages.len(), 2);
    }
}
