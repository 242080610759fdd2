//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while opening or driving an output device
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio devices available
    #[error("No audio output devices found")]
    NoDevices,

    /// Failed to get default device
    #[error("Failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    /// Device not found
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to query device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Sample rate of zero in the configuration
    #[error("Invalid sample rate: {0}Hz")]
    InvalidSampleRate(u32),

    /// Device cannot play mono 16-bit at the engine rate
    #[error("Audio device cannot play {sample_rate}Hz mono output")]
    UnsupportedConfig { sample_rate: u32 },

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Backend was not compiled into this build
    #[error("Audio backend '{0}' is not available in this build")]
    BackendUnavailable(&'static str),

    /// Render thread could not be started
    #[error("Failed to spawn render thread: {0}")]
    ThreadSpawn(String),

    /// Render thread exited before reporting whether the device opened
    #[error("Render thread exited during startup")]
    RenderThreadLost,
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;

/// Outcome of writing one period to a device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// Device ran dry since the last write; this period was not queued
    #[error("Buffer underrun")]
    Underrun,

    /// Device did not accept the whole period within one period's time
    #[error("Device write timed out ({dropped} samples dropped)")]
    Timeout { dropped: usize },

    /// Device failed in a way re-priming alone cannot fix
    #[error("Device failure: {0}")]
    Fatal(String),
}

impl WriteError {
    /// Whether re-priming the device is expected to fix this
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, WriteError::Fatal(_))
    }
}
