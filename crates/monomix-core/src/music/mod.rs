//! Music - bridge to an external synthesizer
//!
//! - [`MusicSynth`] / [`ScoreConverter`]: contracts the embedding application
//!   implements for its synthesizer and native score format
//! - [`MusicBridge`]: play state, registered scores and gain, rendered to mono
//!   once per period by the mixer
//! - [`SilentSynth`] / [`PassthroughConverter`]: headless stand-ins

mod bridge;
mod error;
mod null;
mod synth;

pub use bridge::{volume_to_gain, MusicBridge, DEFAULT_GAIN};
pub use error::{BackendError, MusicError, MusicResult};
pub use null::{PassthroughConverter, SilentSynth};
pub use synth::{MusicSynth, ScoreConverter, ScoreHandle};
