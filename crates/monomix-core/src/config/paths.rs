//! Standard locations for monomix configuration files

use std::path::PathBuf;

/// Directory holding monomix configuration
///
/// Returns `<user config dir>/monomix`, or `./monomix` when the platform
/// has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("monomix")
}

/// Path of a config file inside [`default_config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}
