//! Monomix Player - plays a short effect sequence through the sound system
//!
//! Loads the sound config, opens the configured output, triggers a few
//! generated effects on separate channels over a silent music stream and
//! shuts down once they have played out.
//!
//! ## Command line flags
//!
//! - `--config <path>`: config file (default: `<config dir>/monomix/sound.yaml`)
//! - `--write-config`: save the effective config back to that path
//! - `--list-devices`: print output devices and exit (cpal-backend builds)

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use monomix_core::config::{default_config_path, load_config, save_config, SoundConfig};
use monomix_core::music::{PassthroughConverter, SilentSynth};
use monomix_core::{MemoryCache, SoundSystem};

const CONFIG_FILE: &str = "sound.yaml";

/// Longest the player waits for effects to finish
const PLAY_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--list-devices") {
        return list_devices();
    }

    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| default_config_path(CONFIG_FILE));
    let config: SoundConfig = load_config(&config_path);

    if args.iter().any(|arg| arg == "--write-config") {
        save_config(&config, &config_path)?;
    }

    log::info!("monomix-player starting ({:?} output)", config.audio.backend);

    let cache = build_cache(&config);
    let sound = SoundSystem::new(
        config,
        Box::new(cache),
        Box::new(SilentSynth::new()),
        Box::new(PassthroughConverter),
    );

    sound.init().context("Failed to start sound output")?;
    sound.init_music().context("Failed to start music")?;

    let song = sound.register_song(b"MUS\x1a")?;
    sound.play_song(song, true);

    sound.start_sound("tone", 0, 96)?;
    thread::sleep(Duration::from_millis(150));
    sound.start_sound("click", 1, 127)?;
    sound.update_sound_params(0, 64, 128);

    let started = Instant::now();
    while (sound.sound_is_playing(0) || sound.sound_is_playing(1)) && started.elapsed() < PLAY_TIMEOUT {
        sound.update();
        thread::sleep(Duration::from_millis(10));
    }

    if let Some(stats) = sound.stats() {
        log::info!(
            "Rendered {} periods ({} underruns, {} device errors, {} failed recoveries)",
            stats.periods(),
            stats.underruns(),
            stats.device_errors(),
            stats.failed_recoveries()
        );
    }

    sound.stop_song();
    sound.unregister_song(song);
    sound.shutdown_music();
    sound.shutdown();

    log::info!("monomix-player finished");
    Ok(())
}

/// Effects generated in memory, stored the way a game's lump cache would
fn build_cache(config: &SoundConfig) -> MemoryCache {
    let rate = config.audio.sample_rate as usize;
    let mut cache = MemoryCache::new();

    // 0.4s sawtooth at 440Hz
    let tone: Vec<u8> = (0..rate * 2 / 5).map(|i| ((i * 440 * 256 / rate) % 256) as u8).collect();
    cache.insert(config.lump_name("tone"), with_header(&tone, config.audio.sample_rate));

    // 20ms decaying square burst
    let click: Vec<u8> = (0..rate / 50)
        .map(|i| {
            let amplitude = 127 - (i * 127 / (rate / 50)) as i32;
            let value = if (i / 8) % 2 == 0 { amplitude } else { -amplitude };
            (128 + value) as u8
        })
        .collect();
    cache.insert(config.lump_name("click"), with_header(&click, config.audio.sample_rate));

    cache
}

/// Prefix PCM with the 8-byte sample header (format, rate, length)
fn with_header(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(pcm.len() + 8);
    data.extend_from_slice(&3u16.to_le_bytes());
    data.extend_from_slice(&(sample_rate as u16).to_le_bytes());
    data.extend_from_slice(&(pcm.len() as u32).to_le_bytes());
    data.extend_from_slice(pcm);
    data
}

#[cfg(feature = "cpal-backend")]
fn list_devices() -> Result<()> {
    let rate = monomix_core::SAMPLE_RATE;
    for device in monomix_core::audio::get_output_devices(rate)? {
        let default_marker = if device.is_default { " (default)" } else { "" };
        let rate_marker = if device.supports_rate { "" } else { " [no 22050Hz]" };
        println!("{}{}{}", device, default_marker, rate_marker);
    }
    Ok(())
}

#[cfg(not(feature = "cpal-backend"))]
fn list_devices() -> Result<()> {
    anyhow::bail!("Built without the cpal-backend feature, only the null device is available")
}
