pub mod cache;
pub mod sample_loader;

pub use cache::{SampleCache, SampleLookup, SampleStatus};
pub use sample_loader::{SampleSource, WavDirSource};
