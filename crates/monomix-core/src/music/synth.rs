//! Music backend contracts
//!
//! The synthesizer and the score converter are supplied by the embedding
//! application. The bridge only drives them through these traits.

use super::error::BackendError;

/// Opaque handle to a score registered with a synthesizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScoreHandle(u64);

impl ScoreHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A music synthesizer producing interleaved stereo 16-bit frames
///
/// Every method is called with the bridge's lock held, from either a
/// command thread or the render thread, never both at once.
pub trait MusicSynth: Send {
    /// Start the synthesizer at the given output rate
    fn init(&mut self, sample_rate: u32) -> Result<(), BackendError>;

    /// Release everything the synthesizer holds
    fn shutdown(&mut self);

    /// Load a converted event score
    fn register_score(&mut self, score: &[u8]) -> Result<ScoreHandle, BackendError>;

    fn unregister_score(&mut self, handle: ScoreHandle);

    fn play(&mut self, handle: ScoreHandle, looping: bool);

    fn stop(&mut self);

    fn pause(&mut self);

    fn resume(&mut self);

    /// Whether a score is still sounding (false once a one-shot score ends)
    fn is_playing(&self) -> bool;

    /// Fill `out` with interleaved `[L, R, L, R, ...]` frames
    ///
    /// `out.len()` is always twice the number of frames requested.
    fn render_stereo(&mut self, out: &mut [i16]);
}

/// Converts the engine's native score format into what the synthesizer reads
pub trait ScoreConverter: Send {
    /// Malformed input is reported as an error, never a panic
    fn convert(&self, native: &[u8]) -> Result<Vec<u8>, BackendError>;
}
