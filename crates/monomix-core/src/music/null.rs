//! Headless music backends
//!
//! `SilentSynth` accepts every score and never makes a sound; with
//! `PassthroughConverter` it lets the subsystem run where no synthesizer
//! is available.

use super::error::BackendError;
use super::synth::{MusicSynth, ScoreConverter, ScoreHandle};

/// Synthesizer that registers scores but never plays them
#[derive(Debug, Default)]
pub struct SilentSynth {
    next_handle: u64,
}

impl SilentSynth {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MusicSynth for SilentSynth {
    fn init(&mut self, sample_rate: u32) -> Result<(), BackendError> {
        log::debug!("Silent synth initialized at {}Hz", sample_rate);
        Ok(())
    }

    fn shutdown(&mut self) {}

    fn register_score(&mut self, _score: &[u8]) -> Result<ScoreHandle, BackendError> {
        self.next_handle += 1;
        Ok(ScoreHandle::new(self.next_handle))
    }

    fn unregister_score(&mut self, _handle: ScoreHandle) {}

    fn play(&mut self, _handle: ScoreHandle, _looping: bool) {}

    fn stop(&mut self) {}

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn is_playing(&self) -> bool {
        false
    }

    fn render_stereo(&mut self, out: &mut [i16]) {
        out.fill(0);
    }
}

/// Converter for synthesizers that read the native score directly
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughConverter;

impl ScoreConverter for PassthroughConverter {
    fn convert(&self, native: &[u8]) -> Result<Vec<u8>, BackendError> {
        if native.is_empty() {
            return Err(BackendError::new("empty score"));
        }
        Ok(native.to_vec())
    }
}
