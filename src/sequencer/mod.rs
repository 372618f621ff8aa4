pub mod engine;
pub mod transport;
pub mod trigger;

pub use engine::Engine;
pub use transport::{StepTick, Transport, TransportSettings};
pub use trigger::{evaluate_step, Hit, RandomSource};
