pub mod audio;
pub mod presets;

pub use audio::engine::{ToneConfig, TonePlayer, ToneRequest, ToneTopology};
pub use audio::error::AudioInitError;
