pub mod audio;
pub mod engine;
pub mod error;
pub mod events;
pub mod gm;
pub mod notes;
pub mod settings;
pub mod timing;
pub mod ui;

pub use engine::{LoadOutcome, LoaderJob, Phase, Session, spawn_loader};
pub use settings::{Layout, Settings};
pub use timing::{Partition, Timeline};
pub use ui::SyncApp;
