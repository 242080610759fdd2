//! Error types for the music bridge

use thiserror::Error;

/// Failure reported by a synthesizer or score converter backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Errors that can occur during music operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MusicError {
    /// Synthesizer failed to start
    #[error("Failed to initialize music synthesizer at {sample_rate}Hz: {source}")]
    InitFailed {
        sample_rate: u32,
        #[source]
        source: BackendError,
    },

    /// Native score could not be converted (malformed input)
    #[error("Failed to convert score: {0}")]
    ConversionFailed(#[source] BackendError),

    /// Synthesizer rejected the converted score
    #[error("Failed to register score with synthesizer: {0}")]
    RegistrationFailed(#[source] BackendError),

    /// Music operation before init or after shutdown
    #[error("Music synthesizer is not initialized")]
    NotInitialized,
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MusicError::InitFailed {
            sample_rate: 22050,
            source: BackendError::new("no OPL chip"),
        };
        assert!(err.to_string().contains("22050Hz"));
        assert!(err.to_string().contains("no OPL chip"));

        let err = MusicError::ConversionFailed(BackendError::new("bad header"));
        assert!(err.to_string().contains("bad header"));
    }
}
