//! Audio backend configuration
//!
//! Selects which device backend the render thread writes to and at what
//! rate. The period length is fixed at [`PERIOD_FRAMES`](crate::types::PERIOD_FRAMES)
//! and deliberately not configurable.

use serde::{Deserialize, Serialize};

use crate::types::SAMPLE_RATE;

/// Which output backend to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputBackend {
    /// Discard output, paced to real time (headless runs, CI)
    #[default]
    Null,
    /// Hardware output through CPAL (requires the `cpal-backend` feature)
    Cpal,
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (ALSA, JACK, ...)
/// so a device can be picked from a specific host on systems with several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier (e.g., "ALSA", "CoreAudio")
    /// If None, every available host is searched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Get a display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the output device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output backend
    pub backend: OutputBackend,

    /// Output device (None = system default). Only used by the CPAL backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceId>,

    /// Output sample rate in Hz. Effects and music are rendered at this rate
    /// without conversion, so it should match the source material
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            backend: OutputBackend::default(),
            device: None,
            sample_rate: SAMPLE_RATE,
        }
    }
}

impl AudioConfig {
    /// Headless output
    pub fn null() -> Self {
        Self::default()
    }

    /// Hardware output on the default device
    pub fn cpal() -> Self {
        Self {
            backend: OutputBackend::Cpal,
            ..Default::default()
        }
    }

    /// Set the output device
    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    /// Set the output sample rate
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }
}
