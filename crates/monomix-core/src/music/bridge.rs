//! Music bridge - adapter between the render loop and the synthesizer
//!
//! Owns the play/pause/stop state, the registered scores and the music gain.
//! The render thread pulls one block per period through [`MusicBridge::render_block`],
//! which downmixes the synthesizer's stereo output to mono and applies the gain.
//!
//! `playing` and `gain` are atomics so the render loop can skip music without
//! taking the lock; the synthesizer itself sits behind a mutex shared by the
//! command path and the render path.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::types::{Sample, StereoFrame, MAX_MUSIC_VOLUME, PERIOD_FRAMES};

use super::error::{MusicError, MusicResult};
use super::synth::{MusicSynth, ScoreConverter, ScoreHandle};

/// Gain before the first volume change (percent)
pub const DEFAULT_GAIN: u8 = 50;

/// Map a 0-15 music volume to a 0-100 gain percentage (truncating)
#[inline]
pub fn volume_to_gain(volume: u8) -> u8 {
    let volume = volume.min(MAX_MUSIC_VOLUME) as u32;
    (volume * 100 / MAX_MUSIC_VOLUME as u32) as u8
}

struct MusicState {
    synth: Box<dyn MusicSynth>,
    converter: Box<dyn ScoreConverter>,
    initialized: bool,
    /// Most recently registered score
    current: Option<ScoreHandle>,
    /// Every score registered and not yet released
    registered: Vec<ScoreHandle>,
    /// Pre-allocated stereo scratch for one period
    stereo: Vec<StereoFrame>,
}

/// Music state shared between command callers and the render thread
pub struct MusicBridge {
    state: Mutex<MusicState>,
    playing: AtomicBool,
    gain: AtomicU8,
}

impl MusicBridge {
    /// Wrap a synthesizer and its score converter
    ///
    /// Nothing is started until [`MusicBridge::init`].
    pub fn new(synth: Box<dyn MusicSynth>, converter: Box<dyn ScoreConverter>) -> Self {
        Self {
            state: Mutex::new(MusicState {
                synth,
                converter,
                initialized: false,
                current: None,
                registered: Vec::new(),
                stereo: vec![StereoFrame::default(); PERIOD_FRAMES],
            }),
            playing: AtomicBool::new(false),
            gain: AtomicU8::new(DEFAULT_GAIN),
        }
    }

    fn state(&self) -> MutexGuard<'_, MusicState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start the synthesizer at the engine sample rate
    pub fn init(&self, sample_rate: u32) -> MusicResult<()> {
        let mut state = self.state();
        if state.initialized {
            log::debug!("Music already initialized");
            return Ok(());
        }

        state
            .synth
            .init(sample_rate)
            .map_err(|source| MusicError::InitFailed { sample_rate, source })?;
        state.initialized = true;

        log::info!("Music synthesizer initialized at {}Hz", sample_rate);
        Ok(())
    }

    /// Stop playback, release every registered score and shut the synth down
    pub fn shutdown(&self) {
        self.playing.store(false, Ordering::SeqCst);

        let mut state = self.state();
        if !state.initialized {
            return;
        }

        let registered = std::mem::take(&mut state.registered);
        for handle in registered {
            state.synth.unregister_score(handle);
        }
        state.current = None;
        state.synth.shutdown();
        state.initialized = false;

        log::info!("Music synthesizer shut down");
    }

    pub fn is_initialized(&self) -> bool {
        self.state().initialized
    }

    /// Set music volume (0-15, higher values clamp to 15)
    pub fn set_volume(&self, volume: u8) {
        self.gain.store(volume_to_gain(volume), Ordering::Relaxed);
    }

    /// Current gain percentage (0-100)
    pub fn gain(&self) -> u8 {
        self.gain.load(Ordering::Relaxed)
    }

    pub fn pause(&self) {
        let mut state = self.state();
        if state.initialized {
            state.synth.pause();
        }
        self.playing.store(false, Ordering::SeqCst);
    }

    /// Resume playback
    ///
    /// Marks music as playing even when nothing is registered; the render
    /// loop then pulls silence from the synthesizer.
    pub fn resume(&self) {
        let mut state = self.state();
        if state.initialized {
            state.synth.resume();
        }
        self.playing.store(true, Ordering::SeqCst);
    }

    /// Convert a native score and register it with the synthesizer
    ///
    /// Registering does not stop or start playback. The converted blob only
    /// lives for the duration of this call.
    pub fn register(&self, native: &[u8]) -> MusicResult<ScoreHandle> {
        let mut state = self.state();
        if !state.initialized {
            return Err(MusicError::NotInitialized);
        }

        let score = state
            .converter
            .convert(native)
            .map_err(MusicError::ConversionFailed)?;
        let handle = state
            .synth
            .register_score(&score)
            .map_err(MusicError::RegistrationFailed)?;

        state.registered.push(handle);
        state.current = Some(handle);

        log::debug!(
            "Registered score {:?} ({} bytes native, {} converted)",
            handle,
            native.len(),
            score.len()
        );
        Ok(handle)
    }

    /// Release a registered score
    ///
    /// Handles that are unknown or already released are ignored.
    pub fn unregister(&self, handle: ScoreHandle) {
        let mut state = self.state();
        let Some(pos) = state.registered.iter().position(|&h| h == handle) else {
            log::debug!("Ignoring unregister of unknown score {:?}", handle);
            return;
        };

        state.registered.swap_remove(pos);
        if state.current == Some(handle) {
            state.current = None;
        }
        state.synth.unregister_score(handle);
    }

    /// The most recently registered score, if still registered
    pub fn current(&self) -> Option<ScoreHandle> {
        self.state().current
    }

    pub fn play(&self, handle: ScoreHandle, looping: bool) {
        let mut state = self.state();
        if state.initialized {
            state.synth.play(handle, looping);
        }
        self.playing.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        let mut state = self.state();
        if state.initialized {
            state.synth.stop();
        }
        self.playing.store(false, Ordering::SeqCst);
    }

    /// Whether the render loop should pull music this period
    #[inline]
    pub fn playing_flag(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    /// Whether music is audible
    ///
    /// Both the bridge and the synthesizer must agree, so a one-shot score
    /// that ended on its own reads as stopped.
    pub fn is_playing(&self) -> bool {
        if !self.playing.load(Ordering::SeqCst) {
            return false;
        }
        let state = self.state();
        state.initialized && state.synth.is_playing()
    }

    /// Render `out.len()` mono samples of music
    ///
    /// Writes silence when music is not playing. Otherwise each stereo frame
    /// is downmixed as `(L + R) / 2` and scaled by `gain / 100`, both with
    /// truncating integer arithmetic. Replaces the content of `out`.
    pub fn render_block(&self, out: &mut [Sample]) {
        if !self.playing.load(Ordering::Relaxed) {
            out.fill(0);
            return;
        }

        let mut state = self.state();
        if !state.initialized {
            out.fill(0);
            return;
        }

        let frames = out.len();
        if state.stereo.len() < frames {
            state.stereo.resize(frames, StereoFrame::default());
        }

        let MusicState { synth, stereo, .. } = &mut *state;
        let stereo = &mut stereo[..frames];
        synth.render_stereo(bytemuck::cast_slice_mut(&mut *stereo));

        let gain = self.gain.load(Ordering::Relaxed) as i32;
        for (dst, frame) in out.iter_mut().zip(stereo.iter()) {
            *dst = (frame.downmix() * gain / 100) as Sample;
        }
    }
}
