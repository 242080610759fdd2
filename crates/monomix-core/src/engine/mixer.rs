//! Mixer - the render loop
//!
//! A dedicated thread renders one period at a time: clear the mix buffer,
//! copy the music block into it, add every active effect channel, then hand
//! the buffer to the device. Device failures are counted, logged (rate
//! limited) and recovered from; nothing a device does stops the loop.
//!
//! Commands never wait for the loop. They mutate the [`ChannelPool`] and the
//! [`MusicBridge`] directly and take effect whenever the loop next reads them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use crate::audio::{AudioError, AudioResult, PcmDevice, WriteError};
use crate::music::MusicBridge;
use crate::types::{period_duration, MixBuffer, Sample};

use super::channel::ChannelPool;

/// Repeated device errors are logged once per this many occurrences
pub const ERROR_LOG_INTERVAL: u64 = 100;

/// Render one period into `out`
///
/// Music (when playing) replaces the buffer content, then each active
/// channel is added with per-addition clamping. With nothing playing the
/// result is silence.
pub fn render_period(music: &MusicBridge, channels: &ChannelPool, out: &mut [Sample]) {
    if music.playing_flag() {
        music.render_block(out);
    } else {
        out.fill(0);
    }
    channels.render_into(out);
}

/// Lock-free render counters, readable from any thread
#[derive(Debug, Default)]
pub struct MixerStats {
    periods: AtomicU64,
    underruns: AtomicU64,
    device_errors: AtomicU64,
    failed_recoveries: AtomicU64,
}

impl MixerStats {
    /// Periods rendered (including ones the device rejected)
    pub fn periods(&self) -> u64 {
        self.periods.load(Ordering::Relaxed)
    }

    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Failed writes of any kind
    pub fn device_errors(&self) -> u64 {
        self.device_errors.load(Ordering::Relaxed)
    }

    pub fn failed_recoveries(&self) -> u64 {
        self.failed_recoveries.load(Ordering::Relaxed)
    }

    /// Count a failed write, returning the running error total
    fn record_error(&self, error: &WriteError) -> u64 {
        if matches!(error, WriteError::Underrun) {
            self.underruns.fetch_add(1, Ordering::Relaxed);
        }
        self.device_errors.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[inline]
fn should_log(occurrence: u64) -> bool {
    occurrence == 1 || occurrence % ERROR_LOG_INTERVAL == 0
}

/// Lifecycle state of the render loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerState {
    Stopped,
    Running,
}

/// Handle to a running render thread
///
/// Dropping the handle stops the thread the same way [`Mixer::shutdown`] does.
pub struct Mixer {
    running: Arc<AtomicBool>,
    stats: Arc<MixerStats>,
    thread: Option<JoinHandle<()>>,
}

impl Mixer {
    /// Spawn the render thread
    ///
    /// `open` runs on the render thread, since some devices cannot be moved
    /// between threads once opened. This call waits for it: when the device
    /// fails to open the thread exits and the error is returned here.
    pub fn start<F>(channels: Arc<ChannelPool>, music: Arc<MusicBridge>, open: F) -> AudioResult<Self>
    where
        F: FnOnce() -> AudioResult<Box<dyn PcmDevice>> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(MixerStats::default());
        let (tx, rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("monomix-render".to_string())
            .spawn({
                let running = Arc::clone(&running);
                let stats = Arc::clone(&stats);
                move || {
                    let device = match open() {
                        Ok(device) => {
                            let _ = tx.send(Ok(device.sample_rate()));
                            device
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            return;
                        }
                    };
                    render_loop(device, &channels, &music, &running, &stats);
                }
            })
            .map_err(|e| AudioError::ThreadSpawn(e.to_string()))?;

        match rx.recv() {
            Ok(Ok(sample_rate)) => {
                log::info!("Render thread started ({}Hz)", sample_rate);
                Ok(Self {
                    running,
                    stats,
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioError::RenderThreadLost)
            }
        }
    }

    /// `Stopped` after shutdown, and also when the render thread died
    pub fn state(&self) -> MixerState {
        let alive = self.thread.as_ref().is_some_and(|t| !t.is_finished());
        if alive && self.running.load(Ordering::Acquire) {
            MixerState::Running
        } else {
            MixerState::Stopped
        }
    }

    pub fn stats(&self) -> Arc<MixerStats> {
        Arc::clone(&self.stats)
    }

    /// Stop the render thread and wait for it to close the device
    ///
    /// A period already being rendered is finished first.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Render thread panicked");
            } else {
                log::info!("Render thread stopped");
            }
        }
    }
}

impl Drop for Mixer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn render_loop(
    mut device: Box<dyn PcmDevice>,
    channels: &ChannelPool,
    music: &MusicBridge,
    running: &AtomicBool,
    stats: &MixerStats,
) {
    let mut buffer = MixBuffer::silence();
    let period = period_duration(device.sample_rate());

    while running.load(Ordering::Acquire) {
        render_period(music, channels, buffer.as_mut_slice());
        stats.periods.fetch_add(1, Ordering::Relaxed);

        let Err(error) = device.write(buffer.as_slice()) else {
            continue;
        };

        let occurrence = stats.record_error(&error);
        if should_log(occurrence) {
            log::warn!("Audio write failed: {} ({} so far)", error, occurrence);
        }

        if let Err(e) = device.recover(&error) {
            let failed = stats.failed_recoveries.fetch_add(1, Ordering::Relaxed) + 1;
            if should_log(failed) {
                log::error!("Audio device recovery failed: {} ({} so far)", e, failed);
            }
        }

        // A broken device returns immediately; keep the loop at period pace
        if !error.is_recoverable() {
            thread::sleep(period);
        }
    }

    device.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::{BackendError, MusicSynth, PassthroughConverter, ScoreHandle, SilentSynth};
    use crate::types::PERIOD_FRAMES;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    /// Synth that outputs a constant stereo frame
    struct ToneSynth {
        left: i16,
        right: i16,
    }

    impl MusicSynth for ToneSynth {
        fn init(&mut self, _sample_rate: u32) -> Result<(), BackendError> {
            Ok(())
        }
        fn shutdown(&mut self) {}
        fn register_score(&mut self, _score: &[u8]) -> Result<ScoreHandle, BackendError> {
            Ok(ScoreHandle::new(1))
        }
        fn unregister_score(&mut self, _handle: ScoreHandle) {}
        fn play(&mut self, _handle: ScoreHandle, _looping: bool) {}
        fn stop(&mut self) {}
        fn pause(&mut self) {}
        fn resume(&mut self) {}
        fn is_playing(&self) -> bool {
            true
        }
        fn render_stereo(&mut self, out: &mut [i16]) {
            for frame in out.chunks_mut(2) {
                frame[0] = self.left;
                frame[1] = self.right;
            }
        }
    }

    fn silent_music() -> MusicBridge {
        MusicBridge::new(Box::new(SilentSynth::new()), Box::new(PassthroughConverter))
    }

    fn tone_music(left: i16, right: i16) -> MusicBridge {
        let music = MusicBridge::new(Box::new(ToneSynth { left, right }), Box::new(PassthroughConverter));
        music.init(22050).unwrap();
        let handle = music.register(b"score").unwrap();
        music.play(handle, true);
        music
    }

    #[derive(Default)]
    struct Counters {
        writes: AtomicUsize,
        recovers: AtomicUsize,
        closes: AtomicUsize,
    }

    /// Device that forwards every period and fails according to a script
    struct TestDevice {
        tx: Option<mpsc::Sender<Vec<Sample>>>,
        counters: Arc<Counters>,
        /// Write number (1-based) that reports an underrun
        underrun_on: Option<usize>,
        always_fatal: bool,
        panic_on_write: bool,
    }

    impl TestDevice {
        fn new(counters: Arc<Counters>) -> Self {
            Self {
                tx: None,
                counters,
                underrun_on: None,
                always_fatal: false,
                panic_on_write: false,
            }
        }
    }

    impl PcmDevice for TestDevice {
        fn sample_rate(&self) -> u32 {
            22050
        }

        fn write(&mut self, period: &[Sample]) -> Result<(), WriteError> {
            let n = self.counters.writes.fetch_add(1, Ordering::SeqCst) + 1;
            if self.panic_on_write {
                panic!("device driver crashed");
            }
            if self.always_fatal {
                return Err(WriteError::Fatal("unplugged".into()));
            }
            if self.underrun_on == Some(n) {
                return Err(WriteError::Underrun);
            }
            if let Some(tx) = &self.tx {
                let _ = tx.send(period.to_vec());
            }
            thread::sleep(Duration::from_millis(1));
            Ok(())
        }

        fn recover(&mut self, _error: &WriteError) -> AudioResult<()> {
            self.counters.recovers.fetch_add(1, Ordering::SeqCst);
            if self.always_fatal {
                return Err(AudioError::StreamPlayError("still unplugged".into()));
            }
            Ok(())
        }

        fn drain(&mut self) {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn wait_for(what: &str, cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_render_period_silence_when_idle() {
        let mut out = MixBuffer::silence();
        out.as_mut_slice().fill(1234);
        render_period(&silent_music(), &ChannelPool::new(), out.as_mut_slice());
        assert!(out.as_slice().iter().all(|&s| s == 0));
    }

    #[test]
    fn test_render_period_single_channel() {
        let pool = ChannelPool::new();
        pool.start_samples(0, vec![100, -100, 50], 127).unwrap();

        let mut out = MixBuffer::silence();
        render_period(&silent_music(), &pool, out.as_mut_slice());

        assert_eq!(&out.as_slice()[..3], &[100, -100, 50]);
        assert!(out.as_slice()[3..].iter().all(|&s| s == 0));
        assert!(!pool.is_playing(0));
    }

    #[test]
    fn test_render_period_saturates() {
        let pool = ChannelPool::new();
        pool.start_samples(0, vec![20000; 16], 127).unwrap();
        pool.start_samples(1, vec![20000; 16], 127).unwrap();

        let mut out = MixBuffer::silence();
        render_period(&silent_music(), &pool, out.as_mut_slice());

        assert!(out.as_slice()[..16].iter().all(|&s| s == i16::MAX));
    }

    #[test]
    fn test_render_period_music_under_effects() {
        // Downmix (1000 + 3000) / 2 = 2000, at the default 50% gain = 1000
        let music = tone_music(1000, 3000);
        let pool = ChannelPool::new();
        pool.start_samples(3, vec![100; 4], 127).unwrap();

        let mut out = MixBuffer::silence();
        render_period(&music, &pool, out.as_mut_slice());

        assert_eq!(&out.as_slice()[..5], &[1100, 1100, 1100, 1100, 1000]);
        assert_eq!(out.as_slice()[PERIOD_FRAMES - 1], 1000);
    }

    #[test]
    fn test_render_period_skips_paused_music() {
        let music = tone_music(1000, 1000);
        music.pause();

        let mut out = MixBuffer::silence();
        render_period(&music, &ChannelPool::new(), out.as_mut_slice());
        assert!(out.as_slice().iter().all(|&s| s == 0));
    }

    #[test]
    fn test_mixer_plays_started_channel_and_closes_once() {
        let pool = Arc::new(ChannelPool::new());
        let counters = Arc::new(Counters::default());
        let (tx, rx) = mpsc::channel();

        let mixer = Mixer::start(Arc::clone(&pool), Arc::new(silent_music()), {
            let counters = Arc::clone(&counters);
            move || {
                let mut device = TestDevice::new(counters);
                device.tx = Some(tx);
                Ok(Box::new(device) as Box<dyn PcmDevice>)
            }
        })
        .unwrap();
        assert_eq!(mixer.state(), MixerState::Running);

        pool.start_samples(5, vec![100, -100, 50], 127).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let found = loop {
            let period = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            if period[0] != 0 {
                break period;
            }
            assert!(Instant::now() < deadline, "channel never reached the device");
        };
        assert_eq!(&found[..3], &[100, -100, 50]);
        assert!(found[3..].iter().all(|&s| s == 0));

        let stats = mixer.stats();
        mixer.shutdown();
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert!(stats.periods() >= 1);
        assert_eq!(stats.device_errors(), 0);
    }

    #[test]
    fn test_mixer_recovers_from_underrun() {
        let counters = Arc::new(Counters::default());
        let mixer = Mixer::start(Arc::new(ChannelPool::new()), Arc::new(silent_music()), {
            let counters = Arc::clone(&counters);
            move || {
                let mut device = TestDevice::new(counters);
                device.underrun_on = Some(2);
                Ok(Box::new(device) as Box<dyn PcmDevice>)
            }
        })
        .unwrap();

        let stats = mixer.stats();
        wait_for("writes after the underrun", || {
            counters.writes.load(Ordering::SeqCst) >= 5
        });
        assert_eq!(stats.underruns(), 1);
        assert_eq!(counters.recovers.load(Ordering::SeqCst), 1);
        assert_eq!(mixer.state(), MixerState::Running);

        mixer.shutdown();
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mixer_survives_failing_device() {
        let counters = Arc::new(Counters::default());
        let mixer = Mixer::start(Arc::new(ChannelPool::new()), Arc::new(silent_music()), {
            let counters = Arc::clone(&counters);
            move || {
                let mut device = TestDevice::new(counters);
                device.always_fatal = true;
                Ok(Box::new(device) as Box<dyn PcmDevice>)
            }
        })
        .unwrap();

        let stats = mixer.stats();
        wait_for("repeated failed recoveries", || stats.failed_recoveries() >= 3);
        assert!(stats.device_errors() >= 3);
        assert_eq!(stats.underruns(), 0);
        assert_eq!(mixer.state(), MixerState::Running);

        mixer.shutdown();
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dead_render_thread_reports_stopped() {
        let counters = Arc::new(Counters::default());
        let mixer = Mixer::start(Arc::new(ChannelPool::new()), Arc::new(silent_music()), {
            let counters = Arc::clone(&counters);
            move || {
                let mut device = TestDevice::new(counters);
                device.panic_on_write = true;
                Ok(Box::new(device) as Box<dyn PcmDevice>)
            }
        })
        .unwrap();

        wait_for("render thread to die", || mixer.state() == MixerState::Stopped);
        assert_eq!(counters.writes.load(Ordering::SeqCst), 1);

        // Joining the panicked thread must not propagate the panic
        mixer.shutdown();
    }

    #[test]
    fn test_open_failure_aborts_start() {
        let result = Mixer::start(Arc::new(ChannelPool::new()), Arc::new(silent_music()), || {
            Err(AudioError::NoDevices)
        });
        assert!(matches!(result, Err(AudioError::NoDevices)));
    }

    #[test]
    fn test_error_log_rate_limit() {
        assert!(should_log(1));
        assert!(!should_log(2));
        assert!(!should_log(ERROR_LOG_INTERVAL - 1));
        assert!(should_log(ERROR_LOG_INTERVAL));
        assert!(should_log(ERROR_LOG_INTERVAL * 3));
    }
}
