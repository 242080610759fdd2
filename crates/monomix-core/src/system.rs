//! SoundSystem - the public command surface
//!
//! Owns the channel pool, the music bridge and the render thread. Every
//! command takes `&self`, so a `SoundSystem` can be shared between threads;
//! commands return as soon as shared state is updated and are heard when the
//! render loop next reads it.
//!
//! ```ignore
//! let sound = SoundSystem::new(config, Box::new(cache), Box::new(SilentSynth::new()), Box::new(PassthroughConverter));
//! sound.init()?;
//! sound.start_sound("pistol", 0, 127)?;
//! sound.shutdown();
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use crate::audio::{open_device, AudioError};
use crate::cache::SampleCache;
use crate::config::SoundConfig;
use crate::convert::strip_header;
use crate::engine::{ChannelError, ChannelPool, Mixer, MixerState, MixerStats};
use crate::error::{SoundError, SoundResult};
use crate::music::{MusicBridge, MusicSynth, ScoreConverter, ScoreHandle};
use crate::types::ChannelId;

pub struct SoundSystem {
    config: SoundConfig,
    cache: Box<dyn SampleCache>,
    channels: Arc<ChannelPool>,
    music: Arc<MusicBridge>,
    mixer: Mutex<Option<Mixer>>,
}

impl SoundSystem {
    /// Assemble a sound system; no thread runs until [`SoundSystem::init`]
    pub fn new(
        config: SoundConfig,
        cache: Box<dyn SampleCache>,
        synth: Box<dyn MusicSynth>,
        converter: Box<dyn ScoreConverter>,
    ) -> Self {
        Self {
            config,
            cache,
            channels: Arc::new(ChannelPool::new()),
            music: Arc::new(MusicBridge::new(synth, converter)),
            mixer: Mutex::new(None),
        }
    }

    fn mixer(&self) -> MutexGuard<'_, Option<Mixer>> {
        self.mixer.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> &SoundConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Open the output device and start the render thread
    ///
    /// Fails when the device cannot be opened; nothing is left running in
    /// that case. Calling `init` while running does nothing.
    pub fn init(&self) -> SoundResult<()> {
        let mut mixer = self.mixer();
        if mixer.is_some() {
            log::debug!("Sound system already running");
            return Ok(());
        }

        let audio = self.config.audio.clone();
        if audio.sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate(audio.sample_rate).into());
        }
        log::info!(
            "Initializing sound: {:?} output, mono, {}Hz",
            audio.backend,
            audio.sample_rate
        );

        self.channels.clear();
        let started = Mixer::start(Arc::clone(&self.channels), Arc::clone(&self.music), move || {
            open_device(&audio)
        })?;
        *mixer = Some(started);
        Ok(())
    }

    /// Stop the render thread, close the device, release every channel and
    /// shut the music synthesizer down along with its registered songs
    ///
    /// Blocks until the render thread has exited. Safe to call when not
    /// running.
    pub fn shutdown(&self) {
        let running = self.mixer().take();
        if let Some(mixer) = running {
            mixer.shutdown();
        }
        self.channels.clear();
        self.music.shutdown();
    }

    pub fn state(&self) -> MixerState {
        self.mixer()
            .as_ref()
            .map_or(MixerState::Stopped, Mixer::state)
    }

    /// Render counters of the running mixer
    pub fn stats(&self) -> Option<Arc<MixerStats>> {
        self.mixer().as_ref().map(Mixer::stats)
    }

    /// Periodic hook kept for symmetry with other subsystems
    ///
    /// Does nothing: the render thread drives all audio.
    pub fn update(&self) {}

    // ─────────────────────────────────────────────────────────────────────
    // Sound effects
    // ─────────────────────────────────────────────────────────────────────

    /// Cache name for the effect `name`
    pub fn lump_name(&self, name: &str) -> String {
        self.config.lump_name(name)
    }

    /// Start the effect `name` on `channel`, replacing what it was playing
    ///
    /// Returns the channel index, which doubles as the handle for the other
    /// effect commands.
    pub fn start_sound(&self, name: &str, channel: usize, volume: u8) -> SoundResult<usize> {
        ChannelId::new(channel).ok_or(ChannelError::InvalidIndex(channel))?;

        let lump = self.lump_name(name);
        let raw = self
            .cache
            .lookup(&lump)
            .ok_or_else(|| SoundError::SampleNotFound(lump.clone()))?;

        let handle = self.channels.start(channel, strip_header(raw), volume)?;
        log::debug!("Started '{}' on channel {}", lump, handle);
        Ok(handle)
    }

    pub fn stop_sound(&self, handle: usize) {
        self.channels.stop(handle);
    }

    pub fn sound_is_playing(&self, handle: usize) -> bool {
        self.channels.is_playing(handle)
    }

    /// Change the volume of a channel (0-127, clamped)
    pub fn set_sound_volume(&self, handle: usize, volume: u8) {
        self.channels.set_volume(handle, volume);
    }

    /// Update volume and stereo separation of a playing effect
    ///
    /// Output is mono, so `separation` is ignored.
    pub fn update_sound_params(&self, handle: usize, volume: u8, _separation: u8) {
        self.channels.set_volume(handle, volume);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Music
    // ─────────────────────────────────────────────────────────────────────

    /// Start the music synthesizer at the output rate
    pub fn init_music(&self) -> SoundResult<()> {
        self.music.init(self.config.audio.sample_rate)?;
        if let Some(volume) = self.config.music_volume {
            self.music.set_volume(volume);
        }
        Ok(())
    }

    pub fn shutdown_music(&self) {
        self.music.shutdown();
    }

    /// Set music volume (0-15, clamped)
    pub fn set_music_volume(&self, volume: u8) {
        self.music.set_volume(volume);
    }

    pub fn pause_music(&self) {
        self.music.pause();
    }

    pub fn resume_music(&self) {
        self.music.resume();
    }

    /// Convert and register a song in the engine's native score format
    pub fn register_song(&self, data: &[u8]) -> SoundResult<ScoreHandle> {
        Ok(self.music.register(data)?)
    }

    pub fn unregister_song(&self, handle: ScoreHandle) {
        self.music.unregister(handle);
    }

    pub fn play_song(&self, handle: ScoreHandle, looping: bool) {
        self.music.play(handle, looping);
    }

    pub fn stop_song(&self) {
        self.music.stop();
    }

    pub fn music_is_playing(&self) -> bool {
        self.music.is_playing()
    }

    /// The shared channel pool, for inspection
    pub fn channels(&self) -> &ChannelPool {
        &self.channels
    }

    /// The shared music bridge, for inspection
    pub fn music(&self) -> &MusicBridge {
        &self.music
    }
}

impl Drop for SoundSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioConfig;
    use crate::cache::MemoryCache;
    use crate::music::{
        BackendError, MusicError, MusicSynth, PassthroughConverter, ScoreHandle, SilentSynth,
        DEFAULT_GAIN,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct SynthCalls {
        unregistered: AtomicUsize,
        shutdowns: AtomicUsize,
    }

    /// Silent synth that counts releases
    struct CountingSynth {
        calls: Arc<SynthCalls>,
        next: u64,
    }

    impl MusicSynth for CountingSynth {
        fn init(&mut self, _sample_rate: u32) -> Result<(), BackendError> {
            Ok(())
        }
        fn shutdown(&mut self) {
            self.calls.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
        fn register_score(&mut self, _score: &[u8]) -> Result<ScoreHandle, BackendError> {
            self.next += 1;
            Ok(ScoreHandle::new(self.next))
        }
        fn unregister_score(&mut self, _handle: ScoreHandle) {
            self.calls.unregistered.fetch_add(1, Ordering::SeqCst);
        }
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

    const HEADER: [u8; 8] = [3, 0, 0x11, 0x2b, 3, 0, 0, 0];

    fn lump(pcm: &[u8]) -> Vec<u8> {
        let mut data = HEADER.to_vec();
        data.extend_from_slice(pcm);
        data
    }

    fn system_with(config: SoundConfig, cache: MemoryCache) -> SoundSystem {
        SoundSystem::new(
            config,
            Box::new(cache),
            Box::new(SilentSynth::new()),
            Box::new(PassthroughConverter),
        )
    }

    fn test_cache() -> MemoryCache {
        let mut cache = MemoryCache::new();
        cache.insert("dspistol", lump(&[128, 255, 0]));
        cache.insert("dstiny", vec![128, 128, 128, 128, 128]);
        cache
    }

    #[test]
    fn test_start_sound_resolves_prefix_and_strips_header() {
        let sound = system_with(SoundConfig::default(), test_cache());
        assert_eq!(sound.lump_name("pistol"), "dspistol");

        assert_eq!(sound.start_sound("pistol", 2, 100).unwrap(), 2);
        assert!(sound.sound_is_playing(2));

        let snapshot = sound.channels().snapshot(2).unwrap();
        assert_eq!(snapshot.length, 3);
        assert_eq!(snapshot.position, 0);
        assert_eq!(snapshot.volume, 100);
    }

    #[test]
    fn test_short_lump_keeps_all_bytes() {
        let sound = system_with(SoundConfig::default(), test_cache());
        sound.start_sound("tiny", 0, 127).unwrap();
        assert_eq!(sound.channels().snapshot(0).unwrap().length, 5);
    }

    #[test]
    fn test_custom_prefix() {
        let mut cache = MemoryCache::new();
        cache.insert("fxdoor", lump(&[200; 4]));
        let config = SoundConfig {
            sfx_prefix: "fx".to_string(),
            ..Default::default()
        };

        let sound = system_with(config, cache);
        assert!(sound.start_sound("door", 1, 64).is_ok());
    }

    #[test]
    fn test_start_sound_errors() {
        let sound = system_with(SoundConfig::default(), test_cache());

        match sound.start_sound("nope", 0, 127) {
            Err(SoundError::SampleNotFound(name)) => assert_eq!(name, "dsnope"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            sound.start_sound("pistol", 16, 127),
            Err(SoundError::Channel(ChannelError::InvalidIndex(16)))
        ));
        assert_eq!(sound.channels().active_count(), 0);
    }

    #[test]
    fn test_effect_commands() {
        let sound = system_with(SoundConfig::default(), test_cache());
        sound.start_sound("pistol", 4, 127).unwrap();

        sound.update_sound_params(4, 200, 128);
        assert_eq!(sound.channels().snapshot(4).unwrap().volume, 127);
        sound.set_sound_volume(4, 10);
        assert_eq!(sound.channels().snapshot(4).unwrap().volume, 10);

        sound.update();
        sound.stop_sound(4);
        assert!(!sound.sound_is_playing(4));

        // Out of range handles are ignored
        sound.stop_sound(99);
        sound.set_sound_volume(99, 1);
        assert!(!sound.sound_is_playing(99));
    }

    #[test]
    fn test_lifecycle_with_null_device() {
        let sound = system_with(SoundConfig::default(), test_cache());
        assert_eq!(sound.state(), MixerState::Stopped);
        assert!(sound.stats().is_none());

        sound.init().unwrap();
        sound.init().unwrap();
        assert_eq!(sound.state(), MixerState::Running);

        sound.start_sound("pistol", 0, 127).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while sound.sound_is_playing(0) {
            assert!(Instant::now() < deadline, "effect never finished");
            std::thread::sleep(Duration::from_millis(5));
        }

        let stats = sound.stats().unwrap();
        sound.shutdown();
        assert_eq!(sound.state(), MixerState::Stopped);
        assert!(stats.periods() >= 1);
        assert_eq!(stats.device_errors(), 0);

        // Restartable after shutdown
        sound.init().unwrap();
        assert_eq!(sound.state(), MixerState::Running);
    }

    #[cfg(not(feature = "cpal-backend"))]
    #[test]
    fn test_init_fails_without_backend() {
        let config = SoundConfig {
            audio: AudioConfig::cpal(),
            ..Default::default()
        };
        let sound = system_with(config, MemoryCache::new());
        assert!(matches!(
            sound.init(),
            Err(SoundError::Audio(AudioError::BackendUnavailable(_)))
        ));
        assert_eq!(sound.state(), MixerState::Stopped);
    }

    #[test]
    fn test_music_commands() {
        let config = SoundConfig {
            audio: AudioConfig::null(),
            music_volume: Some(15),
            ..Default::default()
        };
        let sound = system_with(config, MemoryCache::new());

        assert!(matches!(
            sound.register_song(b"MUS\x1a"),
            Err(SoundError::Music(MusicError::NotInitialized))
        ));
        assert_eq!(sound.music().gain(), DEFAULT_GAIN);

        sound.init_music().unwrap();
        assert_eq!(sound.music().gain(), 100);

        let song = sound.register_song(b"MUS\x1a").unwrap();
        sound.play_song(song, true);
        assert!(sound.music().playing_flag());
        // The silent synth never sounds
        assert!(!sound.music_is_playing());

        sound.set_music_volume(3);
        assert_eq!(sound.music().gain(), 20);
        sound.pause_music();
        assert!(!sound.music().playing_flag());
        sound.resume_music();
        assert!(sound.music().playing_flag());
        sound.stop_song();
        assert!(!sound.music().playing_flag());

        sound.unregister_song(song);
        sound.shutdown_music();
        assert!(!sound.music().is_initialized());
    }

    #[test]
    fn test_shutdown_releases_music() {
        let calls = Arc::new(SynthCalls::default());
        let sound = SoundSystem::new(
            SoundConfig::default(),
            Box::new(MemoryCache::new()),
            Box::new(CountingSynth {
                calls: Arc::clone(&calls),
                next: 0,
            }),
            Box::new(PassthroughConverter),
        );

        sound.init().unwrap();
        sound.init_music().unwrap();
        let song = sound.register_song(b"MUS\x1a").unwrap();
        sound.play_song(song, true);

        sound.shutdown();
        assert_eq!(calls.unregistered.load(Ordering::SeqCst), 1);
        assert_eq!(calls.shutdowns.load(Ordering::SeqCst), 1);
        assert!(!sound.music().is_initialized());
        assert!(!sound.music().playing_flag());

        // Drop shuts down again without releasing anything twice
        drop(sound);
        assert_eq!(calls.unregistered.load(Ordering::SeqCst), 1);
        assert_eq!(calls.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases_music() {
        let calls = Arc::new(SynthCalls::default());
        let sound = SoundSystem::new(
            SoundConfig::default(),
            Box::new(MemoryCache::new()),
            Box::new(CountingSynth {
                calls: Arc::clone(&calls),
                next: 0,
            }),
            Box::new(PassthroughConverter),
        );
        sound.init_music().unwrap();
        sound.register_song(b"MUS\x1a").unwrap();

        drop(sound);
        assert_eq!(calls.unregistered.load(Ordering::SeqCst), 1);
        assert_eq!(calls.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let config = SoundConfig {
            audio: AudioConfig::null().with_sample_rate(0),
            ..Default::default()
        };
        let sound = system_with(config, MemoryCache::new());
        assert!(matches!(
            sound.init(),
            Err(SoundError::Audio(AudioError::InvalidSampleRate(0)))
        ));
        assert_eq!(sound.state(), MixerState::Stopped);
    }

    #[test]
    fn test_music_volume_default_leaves_gain() {
        let sound = system_with(SoundConfig::default(), MemoryCache::new());
        sound.init_music().unwrap();
        assert_eq!(sound.music().gain(), DEFAULT_GAIN);
    }
}
