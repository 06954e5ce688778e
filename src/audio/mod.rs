//! Tone synthesis engine for brainwave entrainment playback
//!
//! Provides real-time audio output with:
//! - Binaural beat pairs (explicit or derived carriers)
//! - Isochronic amplitude-gated tones
//! - Plain fixed-frequency tones (Solfeggio, Schumann, etc.)
//! - Looping pink-noise bed
//! - Click-free crossfade transitions and ramped volume control

pub mod device;
pub mod engine;
pub mod error;
pub mod noise;
pub mod param;
pub mod scheduler;
pub mod voice;
