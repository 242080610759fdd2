//! Audio output devices
//!
//! The render thread writes fixed-size mono periods to a [`PcmDevice`]:
//!
//! - [`NullDevice`]: discards output at real-time pace, always available
//! - `CpalDevice`: hardware output, behind the `cpal-backend` feature
//!
//! Devices are opened on the render thread through [`open_device`].

mod backend;
mod config;
#[cfg(feature = "cpal-backend")]
mod cpal_backend;
#[cfg(feature = "cpal-backend")]
mod device;
mod error;
mod null;

pub use backend::{open_device, PcmDevice};
pub use config::{AudioConfig, DeviceId, OutputBackend};
pub use error::{AudioError, AudioResult, WriteError};
pub use null::NullDevice;

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::CpalDevice;
#[cfg(feature = "cpal-backend")]
pub use device::{find_device_by_id, get_default_device, get_output_devices, OutputDevice};
