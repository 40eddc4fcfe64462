mod clock;
mod dispatcher;
mod score;
mod timeline;

pub use clock::{MonotonicClock, PlaybackClock};
pub use dispatcher::Dispatcher;
pub use score::{Score, ScoreTrack, TrackMessage};
pub use timeline::{Partition, Timeline};
