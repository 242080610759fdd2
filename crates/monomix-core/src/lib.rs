//! Monomix Core - real-time mono mixer for sound effects over synthesized music
//!
//! A render thread produces one period of 16-bit mono audio at a time: the
//! music synthesizer's output (downmixed, gain applied) with up to
//! [`NUM_CHANNELS`] sampled effects added on top, then written to the output
//! device. Callers drive everything through [`SoundSystem`].

pub mod audio;
pub mod cache;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod music;
pub mod system;
pub mod types;

pub use cache::{MemoryCache, SampleCache};
pub use error::{SoundError, SoundResult};
pub use system::SoundSystem;
pub use types::*;
