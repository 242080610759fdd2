//! Channel pool error types

use thiserror::Error;

use crate::types::NUM_CHANNELS;

/// Errors reported to callers of channel operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Channel index outside the fixed pool
    #[error("Channel index {0} out of range (0..{max})", max = NUM_CHANNELS)]
    InvalidIndex(usize),

    /// No sample data left to play (e.g. only a header)
    #[error("Sample data is empty")]
    EmptySample,
}

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;
