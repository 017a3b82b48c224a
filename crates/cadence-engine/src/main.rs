//! # Cadence
//!
//! Plays sound files through the Cadence scheduler.
//!
//! ```text
//! cadence [--config FILE] SOUND...
//! ```
//!
//! Each file gets its own sound. The host loop runs the frame phases until
//! every sound has finished, then shuts the scheduler down.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use cadence_audio::{AudioDevice, AudioManager, RodioDevice, VirtualDevice};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cadence_engine::config::{DeviceKind, EngineConfig, CONFIG_FILE};
use cadence_engine::driver::FrameDriver;
use cadence_engine::timing::FrameTiming;

/// Play sound files through the Cadence scheduler
#[derive(Debug, Parser)]
#[command(name = "cadence")]
#[command(version, about)]
struct Args {
    /// Configuration file
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Sound files to play, one sound each
    #[arg(required = true)]
    sounds: Vec<String>,
}

/// Main entry point.
fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("cadence=info".parse()?))
        .init();

    info!("Cadence {}", env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::load_from(&args.config);
    match config.device {
        DeviceKind::Rodio => run(RodioDevice::new()?, &config, &args.sounds),
        DeviceKind::Virtual => run(VirtualDevice::new(), &config, &args.sounds),
    }
}

fn run<D: AudioDevice>(device: D, config: &EngineConfig, files: &[String]) -> Result<()> {
    let audio = AudioManager::with_config(device, config.audio.clone())
        .context("failed to configure audio")?;
    let mut driver = FrameDriver::new(audio);

    let mut remaining: HashSet<_> = driver.play_files(files).into_iter().collect();
    if remaining.is_empty() {
        bail!("none of the given files could be loaded");
    }

    let mut timing = FrameTiming::new(config.target_fps);
    let limit = Duration::from_secs_f64(config.max_runtime_secs);

    while !remaining.is_empty() {
        let dt = config.fixed_dt.unwrap_or_else(|| timing.delta_time());
        for event in driver.tick(dt) {
            if event.is_terminal() {
                remaining.remove(&event.sound());
            }
        }

        if timing.elapsed() >= limit {
            warn!(
                "Stopping after {:.0}s with {} sounds still playing",
                limit.as_secs_f64(),
                remaining.len()
            );
            break;
        }
        timing.sleep_remainder();
    }

    info!("Average {:.1} fps", timing.current_fps());
    driver.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["cadence", "a.wav", "--config", "x.toml", "b.wav"])
            .expect("parse");
        assert_eq!(args.config, PathBuf::from("x.toml"));
        assert_eq!(args.sounds, vec!["a.wav".to_string(), "b.wav".to_string()]);

        let args = Args::try_parse_from(["cadence", "a.wav"]).expect("parse");
        assert_eq!(args.config, PathBuf::from(CONFIG_FILE));

        assert!(Args::try_parse_from(["cadence"]).is_err());
        assert!(Args::try_parse_from(["cadence", "a.wav", "--config"]).is_err());
    }

    /// 16-bit mono PCM WAV of `frames` silent samples.
    fn silent_wav(sample_rate: u32, frames: u32) -> Vec<u8> {
        let data_len = frames * 2;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.resize(out.len() + data_len as usize, 0);
        out
    }

    fn virtual_config() -> EngineConfig {
        EngineConfig {
            device: DeviceKind::Virtual,
            fixed_dt: Some(0.05),
            max_runtime_secs: 5.0,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_run_plays_files_to_completion() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blip.wav");
        std::fs::write(&path, silent_wav(8000, 800)).expect("write");

        let files = vec![path.display().to_string()];
        run(VirtualDevice::new(), &virtual_config(), &files).expect("run");
    }

    #[test]
    fn test_run_rejects_unloadable_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let files = vec![dir.path().join("missing.wav").display().to_string()];
        assert!(run(VirtualDevice::new(), &virtual_config(), &files).is_err());
    }
}
