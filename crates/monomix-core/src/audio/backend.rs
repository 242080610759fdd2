//! Output device abstraction
//!
//! The render loop talks to every backend through [`PcmDevice`]: one blocking
//! write per period, a recovery hook after a failed write, and a drain-and-close
//! at shutdown. [`open_device`] picks the implementation from [`AudioConfig`].

use crate::types::Sample;

use super::config::{AudioConfig, OutputBackend};
use super::error::{AudioResult, WriteError};
use super::null::NullDevice;

/// A mono 16-bit PCM sink driven by the render thread
///
/// Devices are opened on the render thread and never leave it, so the trait
/// does not require `Send`.
pub trait PcmDevice {
    /// Rate the device was opened at
    fn sample_rate(&self) -> u32;

    /// Queue one period of mono samples
    ///
    /// Blocks until the device has room for the period, or about one period
    /// at most before reporting [`WriteError::Timeout`].
    fn write(&mut self, period: &[Sample]) -> Result<(), WriteError>;

    /// Bring the device back into a writable state after a failed write
    fn recover(&mut self, error: &WriteError) -> AudioResult<()>;

    /// Let queued samples play out
    fn drain(&mut self);

    /// Drain and release the device
    fn close(mut self: Box<Self>) {
        self.drain();
    }
}

/// Open the output device selected by `config`
pub fn open_device(config: &AudioConfig) -> AudioResult<Box<dyn PcmDevice>> {
    match config.backend {
        OutputBackend::Null => {
            log::info!("Opening null audio output at {}Hz", config.sample_rate);
            Ok(Box::new(NullDevice::new(config.sample_rate)))
        }
        #[cfg(feature = "cpal-backend")]
        OutputBackend::Cpal => {
            let device = super::cpal_backend::CpalDevice::open(config)?;
            Ok(Box::new(device))
        }
        #[cfg(not(feature = "cpal-backend"))]
        OutputBackend::Cpal => Err(super::error::AudioError::BackendUnavailable("cpal")),
    }
}
