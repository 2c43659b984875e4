//! Client-side prediction, interpolation and world view

pub mod interpolation;
pub mod prediction;
pub mod state;

pub use interpolation::SnapshotBuffer;
pub use prediction::Predictor;
pub use state::{ClientGame, SharedClient};
