//! Effect channel pool
//!
//! A fixed arena of [`NUM_CHANNELS`] playback slots. The slot index is the
//! channel's identity; nothing is allocated or freed per slot after startup
//! apart from the sample buffers themselves.
//!
//! # Synchronization
//!
//! Commands arrive from arbitrary threads while the render thread advances
//! every active cursor once per period. Each slot sits behind its own mutex
//! and both sides take it for the whole field set, so the render thread can
//! never see a new buffer paired with an old length or position. Locks are
//! held for at most one period's worth of one channel.
//!
//! Sample conversion and the release of a replaced buffer happen outside the
//! lock, on the commanding thread.

use std::sync::{Mutex, MutexGuard};

use crate::convert::convert_u8_pcm;
use crate::types::{ChannelId, Sample, MAX_CHANNEL_VOLUME, NUM_CHANNELS};

use super::error::{ChannelError, ChannelResult};

/// One playback slot
#[derive(Debug, Default)]
struct Channel {
    /// Converted samples, owned by this channel
    samples: Box<[Sample]>,
    /// Next sample to play, `0 <= position <= samples.len()`
    position: usize,
    /// 0-127
    volume: u8,
    active: bool,
}

impl Channel {
    /// Mix this channel into `out`, clamping after every addition
    fn render_into(&mut self, out: &mut [Sample]) {
        let volume = self.volume as i32;
        let remaining = &self.samples[self.position..];
        let count = remaining.len().min(out.len());

        for (dst, &src) in out.iter_mut().zip(remaining.iter()) {
            let scaled = scale_sample(src, volume);
            *dst = (*dst as i32 + scaled).clamp(i16::MIN as i32, i16::MAX as i32) as Sample;
        }

        self.position += count;
        if self.position >= self.samples.len() {
            self.active = false;
        }
    }
}

/// Apply a 0-127 channel volume, truncating toward zero
#[inline]
pub fn scale_sample(sample: Sample, volume: i32) -> i32 {
    sample as i32 * volume / MAX_CHANNEL_VOLUME as i32
}

/// Read-only copy of a channel's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub length: usize,
    pub position: usize,
    pub volume: u8,
    pub active: bool,
}

/// Fixed-capacity pool of effect channels
pub struct ChannelPool {
    slots: [Mutex<Channel>; NUM_CHANNELS],
}

impl ChannelPool {
    /// Create a pool with every channel inactive and empty
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Mutex::new(Channel::default())),
        }
    }

    /// Lock a slot, recovering from poisoning
    ///
    /// A panic on a command thread must not silence the render thread.
    fn slot(&self, id: ChannelId) -> MutexGuard<'_, Channel> {
        self.slots[id.index()]
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Start playing unsigned 8-bit PCM on a channel
    ///
    /// Replaces whatever the channel was playing: the old buffer is released
    /// and the converted one installed with the cursor at zero. On error the
    /// channel is left exactly as it was.
    ///
    /// Volume above 127 is clamped.
    pub fn start(&self, index: usize, pcm: &[u8], volume: u8) -> ChannelResult<usize> {
        ChannelId::new(index).ok_or(ChannelError::InvalidIndex(index))?;
        if pcm.is_empty() {
            return Err(ChannelError::EmptySample);
        }
        self.start_samples(index, convert_u8_pcm(pcm), volume)
    }

    /// Start playing already-converted signed 16-bit samples on a channel
    ///
    /// Same replacement semantics as [`ChannelPool::start`].
    pub fn start_samples(&self, index: usize, samples: Vec<Sample>, volume: u8) -> ChannelResult<usize> {
        let id = ChannelId::new(index).ok_or(ChannelError::InvalidIndex(index))?;
        if samples.is_empty() {
            return Err(ChannelError::EmptySample);
        }

        let samples = samples.into_boxed_slice();
        let length = samples.len();
        let volume = volume.min(MAX_CHANNEL_VOLUME);
        let replaced = {
            let mut channel = self.slot(id);
            channel.active = false;
            let old = std::mem::replace(&mut channel.samples, samples);
            channel.position = 0;
            channel.volume = volume;
            channel.active = true;
            old
        };
        drop(replaced);

        log::trace!("Channel {} started ({} samples, volume {})", index, length, volume);
        Ok(index)
    }

    /// Stop a channel
    ///
    /// Stopping an inactive channel changes nothing. An out-of-range index is
    /// rejected and ignored.
    pub fn stop(&self, index: usize) {
        match ChannelId::new(index) {
            Some(id) => self.slot(id).active = false,
            None => log::debug!("Ignoring stop for out-of-range channel {}", index),
        }
    }

    /// Set a channel's volume, clamped to 0-127
    ///
    /// Applies whether or not the channel is playing.
    pub fn set_volume(&self, index: usize, volume: u8) {
        match ChannelId::new(index) {
            Some(id) => self.slot(id).volume = volume.min(MAX_CHANNEL_VOLUME),
            None => log::debug!("Ignoring volume change for out-of-range channel {}", index),
        }
    }

    /// Whether the channel still has samples to play
    pub fn is_playing(&self, index: usize) -> bool {
        ChannelId::new(index).is_some_and(|id| self.slot(id).active)
    }

    /// Copy of a channel's state, `None` for out-of-range indices
    pub fn snapshot(&self, index: usize) -> Option<ChannelSnapshot> {
        let id = ChannelId::new(index)?;
        let channel = self.slot(id);
        Some(ChannelSnapshot {
            length: channel.samples.len(),
            position: channel.position,
            volume: channel.volume,
            active: channel.active,
        })
    }

    /// Number of channels currently playing
    pub fn active_count(&self) -> usize {
        (0..NUM_CHANNELS).filter(|&i| self.is_playing(i)).count()
    }

    /// Add every active channel into `out`
    ///
    /// Each sample is volume-scaled and added on top of what `out` already
    /// holds (music, earlier channels), and the running sum is clamped to the
    /// i16 range after every addition. Because of that progressive clamp the
    /// result only depends on channel order once a slot saturates.
    ///
    /// Channels that run out of samples are deactivated.
    pub fn render_into(&self, out: &mut [Sample]) {
        for slot in &self.slots {
            let mut channel = slot.lock().unwrap_or_else(|e| e.into_inner());
            if channel.active {
                channel.render_into(out);
            }
        }
    }

    /// Deactivate every channel and release all sample buffers
    pub fn clear(&self) {
        for slot in &self.slots {
            let old = {
                let mut channel = slot.lock().unwrap_or_else(|e| e.into_inner());
                std::mem::take(&mut *channel)
            };
            drop(old);
        }
    }
}

impl Default for ChannelPool {
    fn default() -> Self {
        Self::new()
    }
}
