//! Sound system configuration

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;

/// Prefix prepended to effect names when looking them up in the sample cache
pub const DEFAULT_SFX_PREFIX: &str = "ds";

/// Top-level configuration for [`SoundSystem`](crate::SoundSystem)
///
/// ```yaml
/// audio:
///   backend: Cpal
///   sample_rate: 22050
/// sfx_prefix: ds
/// music_volume: 8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    /// Output device settings
    pub audio: AudioConfig,

    /// Cache name prefix for sound effects
    pub sfx_prefix: String,

    /// Music volume (0-15) applied when music is initialized
    ///
    /// None leaves music at its default 50% gain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_volume: Option<u8>,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            sfx_prefix: DEFAULT_SFX_PREFIX.to_string(),
            music_volume: None,
        }
    }
}

impl SoundConfig {
    /// Cache name of the effect `name`
    pub fn lump_name(&self, name: &str) -> String {
        format!("{}{}", self.sfx_prefix, name)
    }
}
