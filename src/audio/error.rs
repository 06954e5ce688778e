//! Errors surfaced while acquiring the audio output path

use thiserror::Error;

/// Failure to bring up the audio context.
///
/// Raised once, by the first `play` that has to open the output device.
/// All other engine operations are infallible by design.
#[derive(Debug, Error)]
pub enum AudioInitError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("audio output device '{0}' not found")]
    DeviceNotFound(String),

    #[error("failed to enumerate audio devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query device configuration: {0}")]
    DeviceConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to query supported stream configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    StartStream(#[from] cpal::PlayStreamError),
}
