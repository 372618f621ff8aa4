pub mod audio;
pub mod audio_api;
pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod middle;
pub mod pipeline;
pub mod sequencer;
pub mod shared;
pub mod tui;

pub use error::{EngineError, LoadError};
pub use sequencer::Engine;
