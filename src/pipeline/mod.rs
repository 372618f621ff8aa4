pub mod pattern_store;
pub mod persistence;
pub mod project;
pub mod song;

pub use pattern_store::PatternStore;
pub use project::{Pattern, ProjectState, Track, TrackPatch};
pub use song::{ArrangerState, BarOutcome, SongArranger, SongChain};
