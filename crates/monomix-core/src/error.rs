//! Errors returned by the sound system command surface

use thiserror::Error;

use crate::audio::AudioError;
use crate::engine::ChannelError;
use crate::music::MusicError;

#[derive(Error, Debug)]
pub enum SoundError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Music(#[from] MusicError),

    /// No lump with this (prefixed) name in the sample cache
    #[error("Sound effect not found in cache: {0}")]
    SampleNotFound(String),
}

pub type SoundResult<T> = Result<T, SoundError>;
