//! Common types for monomix
//!
//! Fixed engine dimensions, the stereo frame produced by music backends and
//! the per-period mono mix buffer handed to the output device.

/// Output sample rate of the engine (Hz)
pub const SAMPLE_RATE: u32 = 22050;

/// Number of independently triggerable effect channels
pub const NUM_CHANNELS: usize = 16;

/// Frames rendered and written per device period
///
/// Fixed for the lifetime of the engine; the render loop and every device
/// backend size their buffers from it.
pub const PERIOD_FRAMES: usize = 1024;

/// Highest channel volume (effects use a 0-127 scale)
pub const MAX_CHANNEL_VOLUME: u8 = 127;

/// Highest music volume (music uses a 0-15 scale)
pub const MAX_MUSIC_VOLUME: u8 = 15;

/// Output sample type (signed 16-bit, native endian in memory)
pub type Sample = i16;

/// Channel identifier (index into the fixed channel pool)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(usize);

impl ChannelId {
    /// Create a channel ID, or `None` if out of range
    pub fn new(index: usize) -> Option<Self> {
        (index < NUM_CHANNELS).then_some(Self(index))
    }

    /// Pool index of this channel
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A single interleaved stereo frame as produced by the music synthesizer
///
/// `#[repr(C)]` keeps the layout `[left, right]`, so `&[StereoFrame]` can be
/// viewed as interleaved `&[i16]` through bytemuck without copying.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoFrame {
    pub left: Sample,
    pub right: Sample,
}

impl StereoFrame {
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Mono downmix: `(left + right) / 2`, truncating toward zero
    #[inline]
    pub fn downmix(&self) -> i32 {
        (self.left as i32 + self.right as i32) / 2
    }
}

/// One period of mono output
///
/// Always exactly [`PERIOD_FRAMES`] long. Overwritten every period; carries
/// nothing from one period to the next.
#[derive(Debug, Clone)]
pub struct MixBuffer {
    samples: Box<[Sample; PERIOD_FRAMES]>,
}

impl MixBuffer {
    /// Create a buffer filled with silence
    pub fn silence() -> Self {
        Self {
            samples: Box::new([0; PERIOD_FRAMES]),
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[Sample] {
        &self.samples[..]
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Sample] {
        &mut self.samples[..]
    }
}

/// Duration of one period at the given sample rate
pub fn period_duration(sample_rate: u32) -> std::time::Duration {
    std::time::Duration::from_secs_f64(PERIOD_FRAMES as f64 / sample_rate.max(1) as f64)
}
