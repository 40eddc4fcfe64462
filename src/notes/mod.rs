mod registry;
mod shapes;

pub use registry::{ActiveNote, Lifecycle, MatchKey, NoteRegistry};
pub use shapes::{
    Bloom, NoteShape, NoteStart, Pulse, ShapeFactory, ShapeKind, ShapeStyle, remap,
    sigmoid_remap,
};
