use std::path::PathBuf;
use std::time::Duration;

use crossbeam::channel::{Receiver, TryRecvError};
use tracing::{debug, error, info};

use crate::audio::{self, AudioRenderer, AudioTrack, OnsetDetector, RenderFailurePolicy, Resolved};
use crate::events::{NoteMessage, TimelineEvent};
use crate::notes::{ActiveNote, MatchKey, NoteRegistry, NoteStart, ShapeFactory};
use crate::timing::{Dispatcher, Partition, PlaybackClock, Timeline};

/// The single message the loader thread sends when it is done.
#[derive(Debug)]
pub enum LoadOutcome {
    Ready(Resolved),
    Failed(String),
}

pub struct LoaderJob {
    pub midi_path: PathBuf,
    /// Time of the first note-on in the loaded timeline.
    pub midi_onset: f64,
    pub policy: RenderFailurePolicy,
    pub renderer: Box<dyn AudioRenderer>,
    pub detector: Box<dyn OnsetDetector>,
}

/// Renders and aligns the audio on a background thread. The returned
/// channel yields exactly one [`LoadOutcome`], sent after all work is done.
pub fn spawn_loader(job: LoaderJob) -> Receiver<LoadOutcome> {
    let (outcome_tx, outcome_rx) = crossbeam::channel::bounded(1);

    std::thread::spawn(move || {
        let outcome = run_loader(job);
        let _ = outcome_tx.send(outcome);
    });

    outcome_rx
}

fn run_loader(job: LoaderJob) -> LoadOutcome {
    match audio::resolve(
        job.renderer.as_ref(),
        job.detector.as_ref(),
        &job.midi_path,
        job.midi_onset,
        job.policy,
    ) {
        Ok(resolved) => LoadOutcome::Ready(resolved),
        Err(e) => {
            error!("Failed to prepare audio: {}", e);
            LoadOutcome::Failed(format!("Failed to prepare audio: {}", e))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Ready,
    Playing,
    /// The loader reported a fatal error; only quitting is possible.
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Playback time of this frame, once playing.
    pub elapsed: Option<f64>,
    pub dispatched: usize,
    /// Notes removed because they finished in the previous frame.
    pub swept: usize,
    /// `(channel, program)` changes dispatched this frame.
    pub program_changes: Vec<(u8, u8)>,
}

/// One playback of one score: phase, clock, timeline cursor and live notes.
pub struct Session<F: ShapeFactory> {
    phase: Phase,
    dispatcher: Dispatcher,
    registry: NoteRegistry<F::Shape>,
    factory: F,
    partition: Partition,
    channel_count: usize,
    track_names: Vec<Option<String>>,
    duration: f64,
    clock: PlaybackClock,
    loader: Option<Receiver<LoadOutcome>>,
    audio: Option<AudioTrack>,
    failure: Option<String>,
    degraded: Option<String>,
    programs: [Option<u8>; 16],
}

impl<F: ShapeFactory> Session<F> {
    pub fn new(timeline: Timeline, factory: F, loader: Receiver<LoadOutcome>) -> Self {
        let partition = timeline.partition();
        let channel_count = timeline.channel_count();
        let track_names = timeline.track_names().to_vec();
        let duration = timeline.duration();

        Self {
            phase: Phase::Loading,
            dispatcher: Dispatcher::new(timeline.into_events()),
            registry: NoteRegistry::new(),
            factory,
            partition,
            channel_count,
            track_names,
            duration,
            clock: PlaybackClock::default(),
            loader: Some(loader),
            audio: None,
            failure: None,
            degraded: None,
            programs: [None; 16],
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn offset(&self) -> f64 {
        self.dispatcher.offset()
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn degraded(&self) -> Option<&str> {
        self.degraded.as_deref()
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn track_count(&self) -> usize {
        self.track_names.len()
    }

    pub fn track_names(&self) -> &[Option<String>] {
        &self.track_names
    }

    /// Time of the last event, in seconds from the start of the score.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Current program per channel, as set by dispatched program changes.
    pub fn programs(&self) -> &[Option<u8>; 16] {
        &self.programs
    }

    pub fn notes(&self) -> &[ActiveNote<F::Shape>] {
        self.registry.notes()
    }

    /// Whether every event has been dispatched and every note has faded.
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Playing && self.dispatcher.is_finished() && self.registry.is_empty()
    }

    /// Hands over the rendered audio, once. Call right before [`start`].
    ///
    /// [`start`]: Session::start
    pub fn take_audio(&mut self) -> Option<AudioTrack> {
        self.audio.take()
    }

    /// Moves from `Ready` to `Playing`, anchoring the playback clock at
    /// `now`. Does nothing in any other phase.
    pub fn start(&mut self, now: Duration) -> bool {
        if self.phase != Phase::Ready {
            return false;
        }
        self.clock.anchor(now);
        self.phase = Phase::Playing;
        info!("Playback started");
        true
    }

    fn poll_loader(&mut self) {
        if self.phase != Phase::Loading {
            return;
        }
        let Some(loader) = &self.loader else {
            return;
        };

        let outcome = match loader.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                LoadOutcome::Failed("Loader stopped without a result".into())
            }
        };
        self.loader = None;

        match outcome {
            LoadOutcome::Ready(resolved) => {
                self.dispatcher.set_offset(resolved.offset);
                self.audio = resolved.audio;
                self.degraded = resolved.degraded;
                self.phase = Phase::Ready;
                info!("Ready, offset {:.3}s", resolved.offset);
            }
            LoadOutcome::Failed(message) => {
                self.failure = Some(message);
                self.phase = Phase::Failed;
            }
        }
    }

    /// Runs one frame: picks up the loader result, drops notes that
    /// finished last frame, dispatches everything now due and advances the
    /// remaining notes. The returned snapshot stays valid until the next
    /// call.
    pub fn tick(&mut self, now: Duration) -> FrameReport {
        self.poll_loader();

        let mut report = FrameReport {
            swept: self.registry.sweep(),
            ..FrameReport::default()
        };

        if self.phase != Phase::Playing {
            return report;
        }
        let Some(elapsed) = self.clock.elapsed(now) else {
            return report;
        };

        let offset = self.dispatcher.offset();
        let partition = self.partition;
        let registry = &mut self.registry;
        let factory = &self.factory;
        let programs = &mut self.programs;
        let changes = &mut report.program_changes;

        report.dispatched = self.dispatcher.drain(elapsed, |event| {
            apply(event, offset, partition, registry, factory, programs, changes);
        });

        self.registry.advance(elapsed);
        report.elapsed = Some(elapsed);
        report
    }
}

fn apply<F: ShapeFactory>(
    event: &TimelineEvent,
    offset: f64,
    partition: Partition,
    registry: &mut NoteRegistry<F::Shape>,
    factory: &F,
    programs: &mut [Option<u8>; 16],
    changes: &mut Vec<(u8, u8)>,
) {
    let at = event.time + offset;

    match event.message {
        NoteMessage::NoteOn { pitch, velocity } => {
            let start = NoteStart {
                pitch,
                velocity,
                channel: event.channel,
                track: event.track,
                at,
            };
            let shape = factory.spawn(&start);
            registry.begin(start, shape);
        }
        NoteMessage::NoteOff { pitch } => {
            let key = match partition {
                Partition::Channel => MatchKey::Channel(event.channel),
                Partition::Track => MatchKey::Track(event.track),
            };
            if !registry.end(pitch, key, at) {
                debug!("Unmatched note-off {} on {:?}", pitch, key);
            }
        }
        NoteMessage::ProgramChange { program } => {
            debug!("Channel {} program {}", event.channel, program);
            programs[(event.channel & 0x0f) as usize] = Some(program);
            changes.push((event.channel, program));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MessageKind, RawMidiMessage};
    use crate::notes::{Lifecycle, Pulse};
    use crate::timing::Score;
    use crossbeam::channel::Sender;
    use std::path::Path;

    struct Dots;

    impl ShapeFactory for Dots {
        type Shape = Pulse;

        fn spawn(&self, _start: &NoteStart) -> Pulse {
            Pulse::new(10.0)
        }
    }

    fn raw(delta: f64, kind: MessageKind) -> RawMidiMessage {
        RawMidiMessage {
            delta,
            tick: 0,
            kind,
        }
    }

    fn on(pitch: u8) -> MessageKind {
        MessageKind::NoteOn {
            channel: 0,
            pitch,
            velocity: 100,
        }
    }

    fn off(pitch: u8) -> MessageKind {
        MessageKind::NoteOff {
            channel: 0,
            pitch,
            velocity: 0,
        }
    }

    fn session(messages: Vec<RawMidiMessage>) -> (Session<Dots>, Sender<LoadOutcome>) {
        let timeline = Timeline::build(
            &Score {
                messages,
                tracks: vec![],
            },
            Partition::Channel,
        )
        .unwrap();
        let (tx, rx) = crossbeam::channel::bounded(1);
        (Session::new(timeline, Dots, rx), tx)
    }

    fn ready(offset: f64) -> LoadOutcome {
        LoadOutcome::Ready(Resolved {
            audio: None,
            offset,
            audio_onset: 0.0,
            midi_onset: 0.0,
            degraded: None,
        })
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn moves_through_loading_ready_playing() {
        let (mut session, tx) = session(vec![raw(0.0, on(60))]);

        assert_eq!(session.tick(ms(0)).dispatched, 0);
        assert_eq!(session.phase(), Phase::Loading);
        assert!(!session.start(ms(0)));

        tx.send(ready(0.0)).unwrap();
        session.tick(ms(16));
        assert_eq!(session.phase(), Phase::Ready);
        assert_eq!(session.tick(ms(32)).dispatched, 0);

        assert!(session.start(ms(1000)));
        assert_eq!(session.phase(), Phase::Playing);
        assert!(!session.start(ms(2000)));

        let report = session.tick(ms(1000));
        assert_eq!(report.elapsed, Some(0.0));
        assert_eq!(report.dispatched, 1);
    }

    #[test]
    fn loader_failure_is_terminal() {
        let (mut session, tx) = session(vec![raw(0.0, on(60))]);
        tx.send(LoadOutcome::Failed("no synth".into())).unwrap();

        session.tick(ms(0));
        assert_eq!(session.phase(), Phase::Failed);
        assert_eq!(session.failure(), Some("no synth"));
        assert!(!session.start(ms(0)));
    }

    #[test]
    fn vanished_loader_fails_the_session() {
        let (mut session, tx) = session(vec![]);
        drop(tx);

        session.tick(ms(0));
        assert_eq!(session.phase(), Phase::Failed);
    }

    #[test]
    fn offset_shifts_dispatch_time() {
        let (mut session, tx) = session(vec![raw(1.0, on(60))]);
        tx.send(ready(0.3)).unwrap();
        session.tick(ms(0));
        session.start(ms(0));

        assert_eq!(session.tick(ms(1299)).dispatched, 0);
        assert_eq!(session.tick(ms(1300)).dispatched, 1);
        assert_eq!(session.notes()[0].start_time(), 1.3);
    }

    #[test]
    fn finished_note_is_presented_once_more() {
        let (mut session, tx) = session(vec![raw(0.0, on(60)), raw(0.1, off(60))]);
        tx.send(ready(0.0)).unwrap();
        session.tick(ms(0));
        session.start(ms(0));

        session.tick(ms(50));
        assert_eq!(session.notes()[0].state(), Lifecycle::Active);

        let report = session.tick(ms(120));
        assert_eq!(report.swept, 0);
        assert_eq!(session.notes().len(), 1);
        assert_eq!(session.notes()[0].state(), Lifecycle::Finished);

        let report = session.tick(ms(136));
        assert_eq!(report.swept, 1);
        assert!(session.notes().is_empty());
        assert!(session.is_finished());
    }

    #[test]
    fn program_changes_only_reach_the_side_channel() {
        let (mut session, tx) = session(vec![raw(
            0.0,
            MessageKind::ProgramChange {
                channel: 2,
                program: 40,
            },
        )]);
        tx.send(ready(0.0)).unwrap();
        session.tick(ms(0));
        session.start(ms(0));

        let report = session.tick(ms(10));
        assert_eq!(report.program_changes, vec![(2, 40)]);
        assert_eq!(session.programs()[2], Some(40));
        assert!(session.notes().is_empty());
    }

    #[test]
    fn loader_thread_publishes_its_result() {
        struct Fails;
        impl AudioRenderer for Fails {
            fn render(&self, midi: &Path) -> Result<PathBuf, crate::error::AudioRenderError> {
                Err(crate::error::AudioRenderError::MissingOutput(midi.to_path_buf()))
            }
        }
        struct Never;
        impl OnsetDetector for Never {
            fn detect(&self, _samples: &[f32], _sample_rate: u32) -> Vec<f64> {
                Vec::new()
            }
        }

        let rx = spawn_loader(LoaderJob {
            midi_path: PathBuf::from("score.mid"),
            midi_onset: 0.2,
            policy: RenderFailurePolicy::ZeroOffset,
            renderer: Box::new(Fails),
            detector: Box::new(Never),
        });

        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            LoadOutcome::Ready(resolved) => {
                assert_eq!(resolved.offset, 0.0);
                assert!(resolved.degraded.is_some());
            }
            LoadOutcome::Failed(message) => panic!("unexpected failure: {message}"),
        }
    }
}
