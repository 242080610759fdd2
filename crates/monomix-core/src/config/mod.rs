//! Configuration for the sound system
//!
//! ```ignore
//! use monomix_core::config::{default_config_path, load_config, SoundConfig};
//!
//! let path = default_config_path("sound.yaml");
//! let config: SoundConfig = load_config(&path);
//! ```

mod io;
mod paths;
mod sound;

pub use io::{load_config, save_config};
pub use paths::{default_config_dir, default_config_path};
pub use sound::{SoundConfig, DEFAULT_SFX_PREFIX};
