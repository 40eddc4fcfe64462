/// A message as it appears in the merged stream of a MIDI file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawMidiMessage {
    /// Seconds since the previous message in merge order.
    pub delta: f64,
    /// Absolute tick position, used as positional identity.
    pub tick: u64,
    pub kind: MessageKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8, velocity: u8 },
    ProgramChange { channel: u8, program: u8 },
    Other,
}

impl MessageKind {
    pub fn is_recognized(&self) -> bool {
        !matches!(self, MessageKind::Other)
    }

    /// Collapses the kind into the single representation stored on the
    /// timeline. A note-on with velocity 0 becomes a note-off.
    pub fn normalize(&self) -> Option<(u8, NoteMessage)> {
        match *self {
            MessageKind::NoteOn {
                channel,
                pitch,
                velocity: 0,
            } => Some((channel, NoteMessage::NoteOff { pitch })),
            MessageKind::NoteOn {
                channel,
                pitch,
                velocity,
            } => Some((channel, NoteMessage::NoteOn { pitch, velocity })),
            MessageKind::NoteOff { channel, pitch, .. } => {
                Some((channel, NoteMessage::NoteOff { pitch }))
            }
            MessageKind::ProgramChange { channel, program } => {
                Some((channel, NoteMessage::ProgramChange { program }))
            }
            MessageKind::Other => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteMessage {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8 },
    ProgramChange { program: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineEvent {
    /// Seconds from the start of the score.
    pub time: f64,
    pub channel: u8,
    /// Track of origin, only resolved in track-partitioned mode.
    pub track: Option<usize>,
    pub message: NoteMessage,
}
