//! CPAL output device
//!
//! The render thread pushes mono periods into an rtrb ring; the CPAL callback
//! pops them and replicates each sample to every output channel. The ring
//! holds a few periods so the callback and the render loop can run at slightly
//! different cadences.
//!
//! Underruns are detected by the callback (ring empty after the first write)
//! and reported on the next write, which drops that period. Stream errors are
//! reported as [`WriteError::Fatal`]; recovery restarts the stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, Stream, StreamConfig};

use crate::types::{period_duration, Sample, PERIOD_FRAMES};

use super::backend::PcmDevice;
use super::config::AudioConfig;
use super::device::{find_device_by_id, get_default_device};
use super::error::{AudioError, AudioResult, WriteError};

/// Ring capacity in periods
const RING_PERIODS: usize = 4;

/// How long `write` sleeps between checks for ring space
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Flags shared between the render thread and the stream callbacks
#[derive(Default)]
struct StreamShared {
    /// Set once real audio has been queued; cleared when the ring runs dry
    primed: AtomicBool,
    underrun: AtomicBool,
    failure: Mutex<Option<String>>,
}

impl StreamShared {
    fn take_failure(&self) -> Option<String> {
        self.failure.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

pub struct CpalDevice {
    stream: Stream,
    producer: rtrb::Producer<Sample>,
    shared: Arc<StreamShared>,
    sample_rate: u32,
    period: Duration,
}

impl CpalDevice {
    /// Open the configured device (or the system default) for mono output
    pub fn open(config: &AudioConfig) -> AudioResult<Self> {
        let device = match &config.device {
            Some(id) => find_device_by_id(id)?,
            None => get_default_device()?,
        };
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = select_output_config(&device, config.sample_rate)?;
        let sample_format = supported.sample_format();
        let mut stream_config: StreamConfig = supported.into();
        stream_config.buffer_size = BufferSize::Fixed(PERIOD_FRAMES as u32);

        let shared = Arc::new(StreamShared::default());
        let (stream, producer) =
            match build_stream(&device, &stream_config, sample_format, &shared) {
                Ok(built) => built,
                Err(e) => {
                    log::warn!(
                        "Fixed {}-frame buffer rejected ({}), using device default",
                        PERIOD_FRAMES,
                        e
                    );
                    stream_config.buffer_size = BufferSize::Default;
                    build_stream(&device, &stream_config, sample_format, &shared)
                        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?
                }
            };

        stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

        log::info!(
            "Audio output on '{}': {}Hz, {} channel(s), {:?}",
            name,
            config.sample_rate,
            stream_config.channels,
            sample_format
        );

        Ok(Self {
            stream,
            producer,
            shared,
            sample_rate: config.sample_rate,
            period: period_duration(config.sample_rate),
        })
    }

    fn capacity(&self) -> usize {
        self.producer.buffer().capacity()
    }
}

impl PcmDevice for CpalDevice {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, period: &[Sample]) -> Result<(), WriteError> {
        if let Some(message) = self.shared.take_failure() {
            return Err(WriteError::Fatal(message));
        }
        if self.shared.underrun.swap(false, Ordering::AcqRel) {
            return Err(WriteError::Underrun);
        }

        let deadline = Instant::now() + self.period;
        let mut pending = period;
        while !pending.is_empty() {
            let n = self.producer.slots().min(pending.len());
            if n > 0 {
                for &sample in &pending[..n] {
                    // Cannot fail, `n` slots are free
                    let _ = self.producer.push(sample);
                }
                pending = &pending[n..];
                continue;
            }
            if Instant::now() >= deadline {
                return Err(WriteError::Timeout {
                    dropped: pending.len(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }

        self.shared.primed.store(true, Ordering::Release);
        Ok(())
    }

    fn recover(&mut self, error: &WriteError) -> AudioResult<()> {
        match error {
            WriteError::Underrun => {
                // Re-prime with a period of silence so the callback has
                // something to play while the next period renders
                let n = self.producer.slots().min(PERIOD_FRAMES);
                for _ in 0..n {
                    let _ = self.producer.push(0);
                }
                self.shared.primed.store(true, Ordering::Release);
                Ok(())
            }
            WriteError::Timeout { .. } => Ok(()),
            WriteError::Fatal(_) => self
                .stream
                .play()
                .map_err(|e| AudioError::StreamPlayError(e.to_string())),
        }
    }

    fn drain(&mut self) {
        // Wait for queued samples to play out, bounded by the ring length
        let limit = Instant::now() + self.period * (RING_PERIODS as u32 + 1);
        while self.producer.slots() < self.capacity() && Instant::now() < limit {
            if self.producer.is_abandoned() {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        if let Err(e) = self.stream.pause() {
            log::debug!("Failed to pause stream on close: {}", e);
        }
        log::info!("Audio output closed");
    }
}

/// Pick a supported config that runs at exactly `sample_rate`
///
/// Prefers i16, then f32, then u16, and the fewest channels within a format.
fn select_output_config(
    device: &cpal::Device,
    sample_rate: u32,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let format_rank = |format: SampleFormat| match format {
        SampleFormat::I16 => Some(0),
        SampleFormat::F32 => Some(1),
        SampleFormat::U16 => Some(2),
        _ => None,
    };

    configs
        .iter()
        .filter(|c| sample_rate >= c.min_sample_rate().0 && sample_rate <= c.max_sample_rate().0)
        .filter_map(|c| format_rank(c.sample_format()).map(|rank| (rank, c)))
        .min_by_key(|(rank, c)| (*rank, c.channels()))
        .map(|(_, c)| c.clone().with_sample_rate(cpal::SampleRate(sample_rate)))
        .ok_or(AudioError::UnsupportedConfig { sample_rate })
}

/// Build a stream for `format` fed by a fresh ring
///
/// A new ring is made per attempt since a failed build consumes the callback.
fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    format: SampleFormat,
    shared: &Arc<StreamShared>,
) -> Result<(Stream, rtrb::Producer<Sample>), cpal::BuildStreamError> {
    let (producer, consumer) = rtrb::RingBuffer::<Sample>::new(PERIOD_FRAMES * RING_PERIODS);
    let stream = match format {
        SampleFormat::I16 => build_typed(device, config, consumer, shared, |s| s),
        SampleFormat::F32 => build_typed(device, config, consumer, shared, |s| s as f32 / 32768.0),
        SampleFormat::U16 => {
            build_typed(device, config, consumer, shared, |s| (s as i32 + 32768) as u16)
        }
        _ => Err(cpal::BuildStreamError::StreamConfigNotSupported),
    }?;
    Ok((stream, producer))
}

fn build_typed<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut consumer: rtrb::Consumer<Sample>,
    shared: &Arc<StreamShared>,
    convert: fn(Sample) -> T,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + Send + 'static,
{
    let channels = config.channels as usize;
    let data_shared = Arc::clone(shared);
    let err_shared = Arc::clone(shared);
    let silence = convert(0);

    device.build_output_stream(
        config,
        move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                let value = match consumer.pop() {
                    Ok(sample) => convert(sample),
                    Err(_) => {
                        if data_shared.primed.swap(false, Ordering::AcqRel) {
                            data_shared.underrun.store(true, Ordering::Release);
                        }
                        silence
                    }
                };
                frame.fill(value);
            }
        },
        move |err| {
            log::error!("Audio stream error: {}", err);
            *err_shared.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(err.to_string());
        },
        None,
    )
}
